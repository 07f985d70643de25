//! Configuration management for the survey API
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Newline-delimited JSON file accepted submissions are appended to
    pub log_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            log_path: env::var("SURVEY_LOG_PATH")
                .unwrap_or_else(|_| "./data/survey.ndjson".to_string())
                .into(),
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.log_path.as_os_str().is_empty() {
            anyhow::bail!("SURVEY_LOG_PATH must not be empty");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Ensure the log file's directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory: {}", parent.display())
            })?;
        }

        Ok(())
    }
}
