mod file_config;

pub use file_config::{FileConfig, RecognitionConfig};

use crate::recognition::orchestrator::DEFAULT_PUBLIC_BASE_URL;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RECOGNITION_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_RECOGNITION_MODEL: &str = "gpt-4o-mini";

/// Settings for the recognition client and worker loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub idle_interval_ms: u64,
    /// Start the worker loop at boot.
    pub autostart: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_RECOGNITION_API_URL.to_string(),
            model: DEFAULT_RECOGNITION_MODEL.to_string(),
            api_key: None,
            api_key_command: None,
            request_timeout_secs: 60,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            idle_interval_ms: 1000,
            autostart: true,
        }
    }
}

impl RecognitionSettings {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub public_base_url: Option<String>,
    pub recognition_api_url: Option<String>,
    pub recognition_model: Option<String>,
    /// From the `RECOGNITION_API_KEY` environment variable.
    pub recognition_api_key: Option<String>,
    pub idle_interval_ms: Option<u64>,
    pub no_autostart: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub public_base_url: String,
    pub recognition: RecognitionSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());

        let defaults = RecognitionSettings::default();
        let rec_file = file.recognition.unwrap_or_default();
        let recognition = RecognitionSettings {
            api_url: rec_file
                .api_url
                .or_else(|| cli.recognition_api_url.clone())
                .unwrap_or(defaults.api_url),
            model: rec_file
                .model
                .or_else(|| cli.recognition_model.clone())
                .unwrap_or(defaults.model),
            api_key: rec_file.api_key.or_else(|| cli.recognition_api_key.clone()),
            api_key_command: rec_file.api_key_command,
            request_timeout_secs: rec_file
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            max_retries: rec_file.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff_ms: rec_file
                .initial_backoff_ms
                .unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: rec_file.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            backoff_multiplier: rec_file
                .backoff_multiplier
                .unwrap_or(defaults.backoff_multiplier),
            idle_interval_ms: rec_file
                .idle_interval_ms
                .or(cli.idle_interval_ms)
                .unwrap_or(defaults.idle_interval_ms),
            autostart: rec_file.autostart.unwrap_or(!cli.no_autostart),
        };

        if recognition.idle_interval_ms == 0 {
            bail!("recognition.idle_interval_ms must be greater than 0");
        }
        if recognition.backoff_multiplier < 1.0 {
            bail!(
                "recognition.backoff_multiplier must be at least 1.0, got {}",
                recognition.backoff_multiplier
            );
        }

        Ok(AppConfig {
            db_dir,
            port,
            metrics_port,
            logging_level,
            public_base_url,
            recognition,
        })
    }

    pub fn images_db_path(&self) -> PathBuf {
        self.db_dir.join("images.db")
    }

    pub fn species_db_path(&self) -> PathBuf {
        self.db_dir.join("species.db")
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
