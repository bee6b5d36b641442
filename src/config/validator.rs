use crate::config::Config;
use crate::error::{Result, ValidationError, VidsiftError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_collector(config, &mut errors);
        Self::validate_filter(config, &mut errors);
        Self::validate_scoring(config, &mut errors);
        Self::validate_sink(config, &mut errors);
        Self::validate_output(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VidsiftError::ConfigValidation { errors })
        }
    }

    /// Validate the keys a remote collection run cannot start without
    pub fn validate_for_collection(config: &Config) -> Result<()> {
        Self::validate(config)?;

        let mut errors = Vec::new();

        if config.collector.dataset_id.trim().is_empty() {
            errors.push(ValidationError::new(
                "collector.dataset_id",
                "Dataset id cannot be empty",
            ));
        }

        let env_var = &config.collector.api_key_env;
        match std::env::var(env_var) {
            Ok(key) if key.trim().is_empty() => errors.push(ValidationError::new(
                "collector.api_key_env",
                format!("Environment variable {} is empty", env_var),
            )),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new(
                "collector.api_key_env",
                format!("Environment variable {} is not set", env_var),
            )),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VidsiftError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_collector(config: &Config, errors: &mut Vec<ValidationError>) {
        let collector = &config.collector;

        if !collector.base_url.starts_with("http://") && !collector.base_url.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "collector.base_url",
                format!("Base URL must be http(s), got '{}'", collector.base_url),
            ));
        }

        if collector.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "collector.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if collector.poll_interval_secs == 0 {
            errors.push(ValidationError::new(
                "collector.poll_interval_secs",
                "Poll interval must be greater than 0",
            ));
        }

        if collector.max_wait_secs < collector.poll_interval_secs {
            errors.push(ValidationError::new(
                "collector.max_wait_secs",
                "Max wait must be at least one poll interval",
            ));
        }
    }

    fn validate_filter(config: &Config, errors: &mut Vec<ValidationError>) {
        let filter = &config.filter;

        if filter.time_range_hours <= 0 {
            errors.push(ValidationError::new(
                "filter.time_range_hours",
                "Time range must be greater than 0",
            ));
        }

        if filter.target_region.trim().is_empty() {
            errors.push(ValidationError::new(
                "filter.target_region",
                "Target region cannot be empty",
            ));
        }

        if filter.target_languages.is_empty() {
            errors.push(ValidationError::new(
                "filter.target_languages",
                "At least one target language is required",
            ));
        }
    }

    fn validate_scoring(config: &Config, errors: &mut Vec<ValidationError>) {
        let scoring = &config.scoring;
        let unit_values = [
            ("scoring.script_ratio_threshold", scoring.script_ratio_threshold),
            ("scoring.keyword_density_threshold", scoring.keyword_density_threshold),
            ("scoring.script_weight", scoring.script_weight),
            ("scoring.keyword_weight", scoring.keyword_weight),
            ("scoring.regular_user_bonus", scoring.regular_user_bonus),
            ("scoring.established_user_bonus", scoring.established_user_bonus),
            ("scoring.authenticity_threshold", scoring.authenticity_threshold),
            ("scoring.min_engagement_rate", scoring.min_engagement_rate),
        ];

        for (path, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    path,
                    format!("Value must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }
    }

    fn validate_sink(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.sink.workbook_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "sink.workbook_dir",
                "Workbook directory cannot be empty",
            ));
        }

        if config.sink.sheet_name.trim().is_empty() {
            errors.push(ValidationError::new(
                "sink.sheet_name",
                "Sheet name cannot be empty",
            ));
        }

        if config.sink.sheet_name == config.sink.summary_sheet_name {
            errors.push(ValidationError::new(
                "sink.summary_sheet_name",
                "Summary sheet must differ from the data sheet",
            ));
        }
    }

    fn validate_output(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.output.file_prefix.is_empty() {
            errors.push(ValidationError::new(
                "output.file_prefix",
                "File prefix cannot be empty",
            ));
        }
    }
}
