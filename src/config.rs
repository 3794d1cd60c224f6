use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub web_port: u16,
    pub log_level: String,
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    #[serde(default)]
    pub documentai_endpoint: Option<String>,
    #[serde(default)]
    pub access_token: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("RECEIPT").try_parsing(true))
            .build()?;

        s.try_deserialize()
    }

    /// Base URL of the Document AI API for the configured location.
    pub fn documentai_base_url(&self) -> String {
        self.documentai_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", self.location))
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        bind_address: "127.0.0.1".into(),
        web_port: 8080,
        log_level: "debug".into(),
        project_id: "demo-project".into(),
        location: "eu".into(),
        processor_id: "abc123".into(),
        documentai_endpoint: None,
        access_token: "token".into(),
        request_timeout_secs: 5,
        max_body_bytes: 1024 * 1024,
    }
}
