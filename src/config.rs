// src/config.rs
use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Default endpoint of the hosted generative-language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("설정에서 API 키를 입력해주세요!")]
    MissingApiKey,
    #[error("BACKEND_PORT must be a valid u16, got '{0}'")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory scanned for teaching material (.pdf / .docx / .txt).
    pub data_dir: PathBuf,
    pub api_key: String,
    pub base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let host = env::var("BACKEND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let raw_port = env::var("BACKEND_PORT").unwrap_or_else(|_| "3010".to_string());
        let port = raw_port
            .parse()
            .map_err(|_| ConfigError::InvalidPort(raw_port.clone()))?;
        let data_dir = env::var("DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into();
        let base_url = env::var("GEMINI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            host,
            port,
            data_dir,
            api_key,
            base_url,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
