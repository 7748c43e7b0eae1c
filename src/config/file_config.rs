use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    /// Base URL that relative image paths are resolved against.
    pub public_base_url: Option<String>,

    pub recognition: Option<RecognitionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RecognitionConfig {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub request_timeout_secs: Option<u64>,
    // Transport retries
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    // Worker loop
    pub idle_interval_ms: Option<u64>,
    pub autostart: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_dir = "/data"
port = 4000
metrics_port = 9200
logging_level = "headers"
public_base_url = "https://photos.example.org"

[recognition]
api_url = "https://openrouter.ai/api/v1"
model = "openai/gpt-4o-mini"
api_key_command = "pass show openrouter"
request_timeout_secs = 30
max_retries = 4
idle_interval_ms = 2500
autostart = false
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_dir.as_deref(), Some("/data"));
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.metrics_port, Some(9200));
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://photos.example.org")
        );

        let recognition = config.recognition.unwrap();
        assert_eq!(recognition.model.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(recognition.api_key, None);
        assert_eq!(
            recognition.api_key_command.as_deref(),
            Some("pass show openrouter")
        );
        assert_eq!(recognition.max_retries, Some(4));
        assert_eq!(recognition.idle_interval_ms, Some(2500));
        assert_eq!(recognition.autostart, Some(false));
    }

    #[test]
    fn test_load_empty_config() {
        let file = NamedTempFile::new().unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.db_dir.is_none());
        assert!(config.recognition.is_none());
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(FileConfig::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
