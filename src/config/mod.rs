//! Configuration management for Vidsift
//!
//! Loads the TOML configuration, applies `VIDSIFT_*` environment overrides and
//! validates the result before any collection or filtering starts.

use crate::error::{Result, VidsiftError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub collector: CollectorConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    pub sink: SinkConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Scraping provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub base_url: String,
    pub dataset_id: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    pub max_wait_secs: u64,
    pub poll_interval_secs: u64,
    pub posts_per_keyword: u32,
    pub discover_urls: Vec<String>,
    pub hashtags: Vec<String>,
    /// Search terms for keyword-triggered jobs
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CollectorConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(VidsiftError::Config(format!(
                "API key environment variable {} is not set",
                self.api_key_env
            ))),
        }
    }
}

/// Selection criteria, immutable for the lifetime of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_views: u64,
    pub time_range_hours: i64,
    pub exclude_verified: bool,
    pub target_languages: Vec<String>,
    pub target_region: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_views: 500_000,
            time_range_hours: 24,
            exclude_verified: true,
            target_languages: vec!["ja".to_string(), "jp".to_string()],
            target_region: "JP".to_string(),
        }
    }
}

/// Thresholds and weights used by the authenticity and quality gates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub script_ratio_threshold: f64,
    pub keyword_density_threshold: f64,
    pub script_weight: f64,
    pub keyword_weight: f64,
    pub regular_user_bonus: f64,
    pub established_user_bonus: f64,
    pub regular_user_max_followers: u64,
    pub authenticity_threshold: f64,
    pub min_description_chars: usize,
    pub min_engagement_rate: f64,
    pub min_detection_chars: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            script_ratio_threshold: 0.3,
            keyword_density_threshold: 0.2,
            script_weight: 0.4,
            keyword_weight: 0.3,
            regular_user_bonus: 0.3,
            established_user_bonus: 0.1,
            regular_user_max_followers: 100_000,
            authenticity_threshold: 0.4,
            min_description_chars: 5,
            min_engagement_rate: 0.001,
            min_detection_chars: 10,
        }
    }
}

/// Tabular sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub workbook_dir: PathBuf,
    pub sheet_name: String,
    pub summary_sheet_name: String,
    #[serde(default)]
    pub clear_existing: bool,
}

/// Local snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub json_output: bool,
    pub csv_output: bool,
    pub file_prefix: String,
}

/// Optional lexicon override
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VidsiftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| VidsiftError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| VidsiftError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: VIDSIFT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("VIDSIFT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "COLLECTOR__DATASET_ID" => {
                self.collector.dataset_id = value.to_string();
            }
            "COLLECTOR__BASE_URL" => {
                self.collector.base_url = value.to_string();
            }
            "FILTER__MIN_VIEWS" => {
                self.filter.min_views = parse_env(path, value)?;
            }
            "FILTER__TIME_RANGE_HOURS" => {
                self.filter.time_range_hours = parse_env(path, value)?;
            }
            "FILTER__EXCLUDE_VERIFIED" => {
                self.filter.exclude_verified = parse_env(path, value)?;
            }
            "FILTER__TARGET_REGION" => {
                self.filter.target_region = value.to_string();
            }
            "LOGGING__LEVEL" => {
                self.logging.level = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| VidsiftError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("vidsift").join("config.toml"))
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| VidsiftError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.vidsift");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            collector: CollectorConfig {
                base_url: "https://api.brightdata.com/datasets/v3".to_string(),
                dataset_id: "gd_l7q7dkf244hwjntr0".to_string(),
                api_key_env: "BRIGHT_DATA_API_KEY".to_string(),
                request_timeout_secs: 300,
                max_wait_secs: 1800,
                poll_interval_secs: 30,
                posts_per_keyword: 200,
                discover_urls: [
                    "https://www.tiktok.com/discover",
                    "https://www.tiktok.com/trending",
                    "https://www.tiktok.com/foryou",
                    "https://www.tiktok.com/explore",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                hashtags: [
                    "fyp", "foryou", "viral", "trending", "おすすめ", "バズ", "話題", "人気",
                    "トレンド", "日本", "東京", "大阪", "グルメ", "ファッション", "音楽",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                keywords: ["日本", "東京", "今日", "おすすめ", "バズ"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            filter: FilterConfig::default(),
            scoring: ScoringConfig::default(),
            sink: SinkConfig {
                workbook_dir: data_dir.join("workbook"),
                sheet_name: "viral_videos".to_string(),
                summary_sheet_name: "summary".to_string(),
                clear_existing: false,
            },
            output: OutputConfig {
                output_dir: data_dir.join("snapshots"),
                json_output: true,
                csv_output: true,
                file_prefix: "viral_videos".to_string(),
            },
            patterns: PatternsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
