use serde::Deserialize;
use secrecy::SecretString;
use std::time::Duration;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Database setting '{0}' cannot be empty")]
    EmptyDatabaseSetting(&'static str),

    #[error("Database pool needs at least one connection")]
    EmptyPool,

    #[error("Timeout '{0}' must be greater than 0")]
    ZeroTimeout(&'static str),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

/// Connection parameters for the flight-reco database.
#[derive(Clone, Deserialize, Debug)]
pub struct Database {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    /// Upper bound of pooled connections shared by all requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Database {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::EmptyDatabaseSetting("host"));
        }
        if self.user.is_empty() {
            return Err(ValidationError::EmptyDatabaseSetting("user"));
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyDatabaseSetting("name"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.max_connections == 0 {
            return Err(ValidationError::EmptyPool);
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("acquire_timeout_secs"));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Health and readiness endpoints. Disabled when absent.
    pub admin_listener: Option<Listener>,
    pub database: Database,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// The browser frontend is served from another origin.
    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_query_timeout_secs() -> u64 {
    20
}

fn default_cors_permissive() -> bool {
    true
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin) = &self.admin_listener {
            admin.validate()?;
        }
        self.database.validate()?;

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("request_timeout_secs"));
        }
        if self.query_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("query_timeout_secs"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
