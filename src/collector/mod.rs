//! Remote scrape-job collection
//!
//! Raw video records come from an asynchronous scraping provider: a job is
//! triggered, polled until it reaches a terminal state, and its snapshot is
//! downloaded. [`JobApi`] is the seam between the polling logic and the HTTP
//! transport ([`JobClient`]), so the lifecycle can be driven by an in-process
//! fake in tests.

mod client;
mod response;

pub use client::JobClient;
pub use response::{parse_dump, parse_results_body};

use crate::config::CollectorConfig;
use crate::error::{Result, VidsiftError};
use crate::record::record_id;
use ahash::AHashSet;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

const TAG_URL_PREFIX: &str = "https://www.tiktok.com/tag/";

/// Handle of a triggered job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
}

/// Lifecycle state reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown(String),
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "pending" | "starting" => Self::Pending,
            "running" | "collecting" => Self::Running,
            "completed" | "ready" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One status poll
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Provider error detail, present on failure
    pub error: Option<String>,
}

/// Scraping provider job lifecycle
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Start a URL-driven scrape job
    async fn trigger_job(
        &self,
        urls: &[String],
        country: &str,
        params: &Map<String, Value>,
    ) -> Result<JobHandle>;

    /// Start a keyword-search job: one entry per keyword
    async fn trigger_keyword_job(
        &self,
        keywords: &[String],
        country: &str,
        posts_per_keyword: u32,
    ) -> Result<JobHandle>;

    async fn poll_status(&self, job_id: &str) -> Result<StatusReport>;

    /// Download the records of a completed job
    async fn fetch_results(&self, job_id: &str) -> Result<Vec<Value>>;
}

/// Poll `job_id` every `poll_interval` until it completes, fails, or
/// `max_wait` elapses.
///
/// Poll errors and unknown statuses are logged and retried until the
/// deadline; only terminal states and the deadline end the loop.
pub async fn wait_for_completion<A: JobApi + ?Sized>(
    api: &A,
    job_id: &str,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<Vec<Value>> {
    let start = Instant::now();

    while start.elapsed() < max_wait {
        match api.poll_status(job_id).await {
            Ok(report) => match report.status {
                JobStatus::Completed => {
                    tracing::info!(job_id, "Job completed, fetching results");
                    return api.fetch_results(job_id).await;
                }
                JobStatus::Failed => {
                    return Err(VidsiftError::UpstreamJob {
                        job_id: job_id.to_string(),
                        message: report.error.unwrap_or_else(|| "Unknown error".to_string()),
                    });
                }
                JobStatus::Pending | JobStatus::Running => {
                    tracing::debug!(job_id, status = ?report.status, "Job in progress");
                }
                JobStatus::Unknown(status) => {
                    tracing::warn!(job_id, status = %status, "Unknown job status");
                }
            },
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Status poll failed, retrying");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }

    Err(VidsiftError::Timeout {
        job_id: job_id.to_string(),
        waited_secs: max_wait.as_secs(),
    })
}

/// Where collected videos come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CollectionMethod {
    /// Discover and trending pages
    Discover,
    /// Popular hashtag pages
    Hashtags,
    /// Both, de-duplicated by video id
    Hybrid,
    /// Keyword search
    Keywords,
}

impl fmt::Display for CollectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "discover",
            Self::Hashtags => "hashtags",
            Self::Hybrid => "hybrid",
            Self::Keywords => "keywords",
        };
        f.write_str(name)
    }
}

/// Runs collection jobs against a [`JobApi`]
pub struct Collector<A> {
    api: A,
    country: String,
    discover_urls: Vec<String>,
    hashtags: Vec<String>,
    keywords: Vec<String>,
    posts_per_keyword: u32,
    max_wait: Duration,
    poll_interval: Duration,
}

impl<A: JobApi> Collector<A> {
    pub fn new(api: A, config: &CollectorConfig, country: impl Into<String>) -> Self {
        Self {
            api,
            country: country.into(),
            discover_urls: config.discover_urls.clone(),
            hashtags: config.hashtags.clone(),
            keywords: config.keywords.clone(),
            posts_per_keyword: config.posts_per_keyword,
            max_wait: Duration::from_secs(config.max_wait_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Override the polling deadline and interval
    pub fn with_polling(mut self, max_wait: Duration, poll_interval: Duration) -> Self {
        self.max_wait = max_wait;
        self.poll_interval = poll_interval;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn collect(&self, method: CollectionMethod) -> Result<Vec<Value>> {
        tracing::info!(%method, country = %self.country, "Collecting videos");

        match method {
            CollectionMethod::Discover => self.collect_discover().await,
            CollectionMethod::Hashtags => self.collect_hashtags().await,
            CollectionMethod::Keywords => self.collect_keywords().await,
            CollectionMethod::Hybrid => {
                let discovered = self.collect_discover().await?;
                let tagged = self.collect_hashtags().await?;
                let (from_discover, from_hashtags) = (discovered.len(), tagged.len());

                let unique = dedupe_by_id(discovered.into_iter().chain(tagged));
                tracing::info!(
                    from_discover,
                    from_hashtags,
                    unique = unique.len(),
                    "Hybrid collection merged"
                );
                Ok(unique)
            }
        }
    }

    pub async fn collect_discover(&self) -> Result<Vec<Value>> {
        let params = params(json!({ "include_posts": true, "max_posts_per_page": 100 }));
        self.run_job(&self.discover_urls, &params).await
    }

    pub async fn collect_hashtags(&self) -> Result<Vec<Value>> {
        let urls: Vec<String> = self
            .hashtags
            .iter()
            .map(|tag| format!("{}{}", TAG_URL_PREFIX, tag.trim().trim_start_matches('#')))
            .collect();
        let params = params(json!({ "include_posts": true, "max_posts_per_hashtag": 50 }));
        self.run_job(&urls, &params).await
    }

    pub async fn collect_keywords(&self) -> Result<Vec<Value>> {
        if self.keywords.is_empty() {
            return Err(VidsiftError::Config(
                "collector.keywords is empty; nothing to search for".to_string(),
            ));
        }

        let handle = self
            .api
            .trigger_keyword_job(&self.keywords, &self.country, self.posts_per_keyword)
            .await?;
        tracing::info!(
            job_id = %handle.job_id,
            keywords = self.keywords.len(),
            "Keyword job triggered"
        );
        self.await_job(handle).await
    }

    async fn run_job(&self, urls: &[String], params: &Map<String, Value>) -> Result<Vec<Value>> {
        let handle = self.api.trigger_job(urls, &self.country, params).await?;
        tracing::info!(job_id = %handle.job_id, urls = urls.len(), "Job triggered");
        self.await_job(handle).await
    }

    async fn await_job(&self, handle: JobHandle) -> Result<Vec<Value>> {
        let records =
            wait_for_completion(&self.api, &handle.job_id, self.max_wait, self.poll_interval)
                .await?;
        tracing::info!(job_id = %handle.job_id, records = records.len(), "Job results received");
        Ok(records)
    }
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Keep the first record per video id; records without an id are dropped
pub fn dedupe_by_id(records: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = AHashSet::new();
    records
        .into_iter()
        .filter(|record| match record_id(record) {
            Some(id) => seen.insert(id),
            None => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(JobStatus::parse("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::parse(" Running "), JobStatus::Running);
        assert_eq!(JobStatus::parse("failed"), JobStatus::Failed);
        assert_eq!(
            JobStatus::parse("paused"),
            JobStatus::Unknown("paused".to_string())
        );
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let records = vec![
            json!({ "id": "a", "n": 1 }),
            json!({ "video_id": "b" }),
            json!({ "aweme_id": "a", "n": 2 }),
            json!({ "description": "no id" }),
            json!({ "id": "b" }),
        ];

        let unique = dedupe_by_id(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0]["n"], 1);
        assert_eq!(unique[1]["video_id"], "b");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(CollectionMethod::Hybrid.to_string(), "hybrid");
    }
}
