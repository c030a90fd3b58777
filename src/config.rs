use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

const ENV_PREFIX: &str = "TRANSACT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("{0} must be at least 1")]
    TooSmall(&'static str),
    #[error("invalid DATABASE_URL: {0}")]
    DatabaseUrl(#[source] sqlx::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: Option<String>,
    /// Maximum number of pooled connections
    pub capacity: u32,
    /// Full connection URL; wins over the discrete fields when set
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: None,
            capacity: 100,
            url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the optional `config` file and `TRANSACT_*`
    /// environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("_")
                .prefix_separator("_"),
        )?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }
        Ok(config)
    }

    fn load_from(environment: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(environment)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Fail fast on settings that have no default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port.is_none() {
            return Err(ConfigError::Missing("TRANSACT_SERVER_PORT"));
        }
        if self.database.url.is_none() && self.database.name.is_none() {
            return Err(ConfigError::Missing("TRANSACT_DATABASE_NAME"));
        }
        if self.database.capacity < 1 {
            return Err(ConfigError::TooSmall("TRANSACT_DATABASE_CAPACITY"));
        }
        Ok(())
    }

    pub fn server_address(&self) -> Result<String, ConfigError> {
        let port = self
            .server
            .port
            .ok_or(ConfigError::Missing("TRANSACT_SERVER_PORT"))?;
        Ok(format!("{}:{}", self.server.host, port))
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        let database = &self.database;
        if let Some(url) = &database.url {
            return PgConnectOptions::from_str(url).map_err(ConfigError::DatabaseUrl);
        }

        let name = database
            .name
            .as_deref()
            .ok_or(ConfigError::Missing("TRANSACT_DATABASE_NAME"))?;
        Ok(PgConnectOptions::new()
            .host(&database.host)
            .port(database.port)
            .username(&database.user)
            .password(&database.password)
            .database(name))
    }
}
