//! ETL service configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use ingestion::PipelineSettings;
use scene_catalog::StacClientOptions;
use storage::PoolSettings;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub database: DatabaseConfig,

    /// STAC API root, or "earth-search"
    pub stac_api_url: String,

    /// Per-request timeout for catalog and imagery requests (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries on transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Full URL; overrides the individual fields when set
    #[serde(default)]
    pub url: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_min_connections() -> u32 {
    5
}

fn default_max_connections() -> u32 {
    20
}

impl EtlConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, after reading `.env`
    /// if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match var("POSTGRES_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("POSTGRES_PORT is not a port number: {}", port))?,
            None => default_port(),
        };

        let database = DatabaseConfig {
            host: var("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            user: var("POSTGRES_USER").unwrap_or_else(default_user),
            password: var("POSTGRES_PASSWORD").unwrap_or_default(),
            name: var("POSTGRES_DB").unwrap_or_else(|| "postgres".to_string()),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            url: var("DATABASE_URL"),
        };

        let mut pipeline = PipelineSettings::default();
        if let Some(collection) = var("STAC_COLLECTION") {
            pipeline.collection = collection;
        }

        Ok(Self {
            database,
            stac_api_url: var("STAC_API_URL").unwrap_or_else(|| "earth-search".to_string()),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            pipeline,
        })
    }

    pub fn database_url(&self) -> String {
        let db = &self.database;
        match &db.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                db.user, db.password, db.host, db.port, db.name
            ),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            min_connections: self.database.min_connections,
            max_connections: self.database.max_connections,
        }
    }

    pub fn client_options(&self) -> StacClientOptions {
        StacClientOptions {
            request_timeout: self.request_timeout(),
            max_retries: self.max_retries,
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
