use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Vidsift
#[derive(Error, Debug)]
pub enum VidsiftError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Transport or HTTP failure talking to the scraping provider
    #[error("Upstream request failed ({context}): {message}")]
    UpstreamRequest { context: String, message: String },

    /// The scraping provider reported the job as failed
    #[error("Upstream job {job_id} failed: {message}")]
    UpstreamJob { job_id: String, message: String },

    /// Job did not reach a terminal state before the deadline
    #[error("Job {job_id} did not complete within {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },

    /// Malformed count, timestamp or response body
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Tabular sink failure
    #[error("Sink error: {0}")]
    Sink(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Vidsift operations
pub type Result<T> = std::result::Result<T, VidsiftError>;
