use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::sap_query_generator::Dialect;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unsupported db dialect: {0}")]
    Dialect(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Server configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Pooled database connection used by the document listing
    #[validate(nested)]
    pub database: DatabaseConfig,
}

/// Connection settings for the long-lived Business One database handle.
/// The ad-hoc proxy does not use this; it gets credentials per request.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQL dialect of the pooled database (mssql or hana)
    #[serde(default)]
    pub dialect: Dialect,

    #[validate(length(min = 1, message = "DB server cannot be empty"))]
    pub server: String,

    #[validate(range(min = 1, max = 65535, message = "DB port must be between 1 and 65535"))]
    pub port: u16,

    #[validate(length(min = 1, message = "DB user cannot be empty"))]
    pub user: String,

    pub password: String,

    #[validate(length(min = 1, message = "DB database cannot be empty"))]
    pub database: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Mssql,
            server: "localhost".to_string(),
            port: 1433,
            user: "sa".to_string(),
            password: String::new(),
            database: "SBODEMO".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let dialect_raw = env::var("DB_DIALECT").unwrap_or_default();
        let dialect = Dialect::parse(&dialect_raw)
            .map_err(|_| ConfigError::Dialect(dialect_raw.trim().to_string()))?;

        let config = Self {
            http_host: env::var("SAPGATE_HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_env_var("SAPGATE_HTTP_PORT", "8080")?,
            database: DatabaseConfig {
                dialect,
                server: env::var("DB_SERVER").unwrap_or_else(|_| "localhost".to_string()),
                port: parse_env_var("DB_PORT", "1433")?,
                user: env::var("DB_USER").unwrap_or_else(|_| "sa".to_string()),
                password: env::var("DB_PASSWORD").unwrap_or_default(),
                database: env::var("DB_DATABASE").unwrap_or_else(|_| "SBODEMO".to_string()),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
