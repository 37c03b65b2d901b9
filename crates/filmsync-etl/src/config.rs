//! Configuration management

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ============================================================================
// ETL Configuration Constants
// ============================================================================

/// Default Elasticsearch endpoint for local development.
pub const DEFAULT_ELASTICSEARCH_URL: &str = "http://localhost:9200";

/// Default path of the watermark file.
pub const DEFAULT_STATE_PATH: &str = "./data/watermark.txt";

/// Default pause between sync runs in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default timeout for opening upstream connections in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Database URL used by [`Config::default`] for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/movies";

/// ETL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub etl: EtlConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Elasticsearch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub url: String,
}

/// Sync-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub state_path: PathBuf,
    pub poll_interval_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL is not set; expected a postgresql:// URL")?,
            },
            elasticsearch: ElasticsearchConfig {
                url: std::env::var("ELASTICSEARCH_URL")
                    .unwrap_or_else(|_| DEFAULT_ELASTICSEARCH_URL.to_string()),
            },
            etl: EtlConfig {
                state_path: std::env::var("ETL_STATE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH)),
                poll_interval_secs: std::env::var("ETL_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                connect_timeout_secs: std::env::var("ETL_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            anyhow::bail!(
                "Database URL must use the postgres:// or postgresql:// scheme, got '{}'",
                self.database.url
            );
        }

        // Validate Elasticsearch URL
        if !self.elasticsearch.url.starts_with("http://")
            && !self.elasticsearch.url.starts_with("https://")
        {
            anyhow::bail!(
                "Elasticsearch URL must use the http:// or https:// scheme, got '{}'",
                self.elasticsearch.url
            );
        }

        // Validate loop timings
        if self.etl.poll_interval_secs == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }

        if self.etl.connect_timeout_secs == 0 {
            anyhow::bail!("Connect timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
            },
            elasticsearch: ElasticsearchConfig {
                url: DEFAULT_ELASTICSEARCH_URL.to_string(),
            },
            etl: EtlConfig {
                state_path: PathBuf::from(DEFAULT_STATE_PATH),
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}
