// HTTP transport for the scraping provider's dataset API
use super::{parse_results_body, JobApi, JobHandle, JobStatus, StatusReport};
use crate::config::CollectorConfig;
use crate::error::{Result, VidsiftError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("vidsift/", env!("CARGO_PKG_VERSION"));

/// Dataset API client authenticated with a bearer token
pub struct JobClient {
    http: reqwest::Client,
    base_url: String,
    dataset_id: String,
}

impl JobClient {
    pub fn new(api_key: &str, config: &CollectorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| VidsiftError::Config("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| upstream("client setup", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dataset_id: config.dataset_id.clone(),
        })
    }

    /// Build a client with the key read from the configured environment variable
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        Self::new(&config.api_key()?, config)
    }

    async fn trigger(&self, extra_query: &[(&str, &str)], body: Value) -> Result<JobHandle> {
        let mut query = vec![
            ("dataset_id", self.dataset_id.as_str()),
            ("include_errors", "true"),
        ];
        query.extend_from_slice(extra_query);

        let response = self
            .http
            .post(format!("{}/trigger", self.base_url))
            .query(&query)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("trigger", e))?;

        let value: Value = response.json().await.map_err(|e| upstream("trigger", e))?;
        let job_id = value
            .get("snapshot_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VidsiftError::UpstreamRequest {
                context: "trigger".to_string(),
                message: "Response did not include a snapshot_id".to_string(),
            })?;

        Ok(JobHandle {
            job_id: job_id.to_string(),
        })
    }

    fn snapshot_url(&self, job_id: &str) -> String {
        format!("{}/snapshot/{}", self.base_url, job_id)
    }
}

#[async_trait]
impl JobApi for JobClient {
    async fn trigger_job(
        &self,
        urls: &[String],
        country: &str,
        params: &Map<String, Value>,
    ) -> Result<JobHandle> {
        let body: Vec<Value> = urls
            .iter()
            .map(|url| {
                let mut entry = params.clone();
                entry.insert("url".to_string(), Value::String(url.clone()));
                entry.insert("country".to_string(), Value::String(country.to_string()));
                Value::Object(entry)
            })
            .collect();

        self.trigger(&[], Value::Array(body)).await
    }

    async fn trigger_keyword_job(
        &self,
        keywords: &[String],
        country: &str,
        posts_per_keyword: u32,
    ) -> Result<JobHandle> {
        let body: Vec<Value> = keywords
            .iter()
            .map(|keyword| {
                json!({
                    "search_keyword": keyword,
                    "country": country,
                    "num_of_posts": posts_per_keyword,
                })
            })
            .collect();

        tracing::info!(keywords = keywords.len(), country, "Triggering keyword job");
        self.trigger(
            &[("type", "discover_new"), ("discover_by", "keyword")],
            Value::Array(body),
        )
        .await
    }

    async fn poll_status(&self, job_id: &str) -> Result<StatusReport> {
        let value: Value = self
            .http
            .get(self.snapshot_url(job_id))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("status", e))?
            .json()
            .await
            .map_err(|e| upstream("status", e))?;

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let error = value.get("error").and_then(|e| match e {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Ok(StatusReport {
            status: JobStatus::parse(status),
            error,
        })
    }

    async fn fetch_results(&self, job_id: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(self.snapshot_url(job_id))
            .query(&[("format", "json")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("results", e))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.map_err(|e| upstream("results", e))?;

        parse_results_body(&content_type, &body)
    }
}

fn upstream(context: &str, e: reqwest::Error) -> VidsiftError {
    VidsiftError::UpstreamRequest {
        context: context.to_string(),
        message: e.to_string(),
    }
}
