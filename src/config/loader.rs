//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Defaults are the
//! bottom layer, then the base TOML file, then the environment-specific TOML
//! file, then `SUBMISSION__*` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::SubmissionConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_NAME: &str = "submission.toml";
const ENV_PREFIX: &str = "SUBMISSION";
const ENV_SEPARATOR: &str = "__";
const LIST_KEYS: [&str; 2] = ["scheduler.enabled_subjects", "scheduler.excluded_subjects"];

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: SubmissionConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from `./config`
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Missing files are skipped; the defaults layer is always present.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let builder = Self::defaults_layer(environment)?
            .add_source(File::from(config_directory.join(BASE_FILE_NAME)).required(false))
            .add_source(
                File::from(Self::environment_file(&config_directory, environment))
                    .required(false),
            )
            .add_source(Self::environment_layer());

        let config = Self::build(builder, environment)?;

        info!(
            environment = environment,
            config_directory = %config_directory.display(),
            submission_enabled = config.scheduler.submission_enabled,
            max_concurrent = config.scheduler.max_concurrent_submissions,
            max_retries = config.retry.max_retries,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Load configuration from an in-memory TOML document layered over the
    /// defaults. Environment variables are not consulted.
    pub fn from_str_toml(toml: &str, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        let builder =
            Self::defaults_layer(environment)?.add_source(File::from_str(toml, FileFormat::Toml));
        let config = Self::build(builder, environment)?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::new(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Path of the environment-specific override file
    pub fn environment_file(config_directory: &Path, environment: &str) -> PathBuf {
        config_directory.join(format!("submission.{environment}.toml"))
    }

    /// Detect current environment: SUBMISSION_ENV, then APP_ENV, then development
    pub fn detect_environment() -> String {
        env::var("SUBMISSION_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn defaults_layer(
        environment: &str,
    ) -> ConfigResult<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Config::try_from(&SubmissionConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;
        Ok(Config::builder().add_source(defaults))
    }

    fn environment_layer() -> Environment {
        let mut source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            source = source.with_list_parse_key(key);
        }
        source
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> ConfigResult<SubmissionConfig> {
        let config: SubmissionConfig = builder
            .build()
            .and_then(|merged| merged.try_deserialize())
            .map_err(|e| Self::map_config_error(e, environment))?;

        config.validate()?;
        Ok(config)
    }

    fn map_config_error(error: ConfigError, environment: &str) -> ConfigurationError {
        match error {
            ConfigError::FileParse { uri, cause } => ConfigurationError::InvalidToml {
                source_name: uri.unwrap_or_else(|| "<inline>".to_string()),
                error: cause.to_string(),
            },
            other => ConfigurationError::load_error(environment, other),
        }
    }
}
