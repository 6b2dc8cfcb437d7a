use flights::config::Config as FlightsConfig;
use identity::config::Config as IdentityConfig;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs::File;
use std::path::Path;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    pub environment: Option<String>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub flights: FlightsConfig,
    pub identity: IdentityConfig,
}

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Port,
}

/// Environment variables that override a setting of the config file.
const ENV_OVERRIDES: &[(&str, &[&str], Kind)] = &[
    ("DB_NAME", &["flights", "database", "name"], Kind::Text),
    ("DB_USER", &["flights", "database", "user"], Kind::Text),
    ("DB_PASSWORD", &["flights", "database", "password"], Kind::Text),
    ("DB_HOST", &["flights", "database", "host"], Kind::Text),
    ("DB_PORT", &["flights", "database", "port"], Kind::Port),
    ("LISTENER_HOST", &["flights", "listener", "host"], Kind::Text),
    ("LISTENER_PORT", &["flights", "listener", "port"], Kind::Port),
    ("COGNITO_REGION", &["identity", "cognito", "region"], Kind::Text),
    ("COGNITO_DOMAIN", &["identity", "cognito", "domain"], Kind::Text),
    ("COGNITO_USER_POOL_ID", &["identity", "cognito", "user_pool_id"], Kind::Text),
    ("COGNITO_CLIENT_ID", &["identity", "cognito", "client_id"], Kind::Text),
    ("COGNITO_CLIENT_SECRET", &["identity", "cognito", "client_secret"], Kind::Text),
    ("COGNITO_REDIRECT_URL", &["identity", "cognito", "redirect_url"], Kind::Text),
    ("COGNITO_LOGOUT_URL", &["identity", "cognito", "logout_url"], Kind::Text),
    ("SECRET_KEY", &["identity", "session", "secret_key"], Kind::Text),
    ("USER_PAIRS_TABLE", &["identity", "user_store", "table_name"], Kind::Text),
];

impl Config {
    /// Reads the YAML file at `path` (if any) and applies the process
    /// environment on top of it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let document = match path {
            Some(path) => serde_yaml::from_reader(File::open(path)?)?,
            None => Value::Mapping(Mapping::new()),
        };
        Self::from_document(document, |name| std::env::var(name).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn from_document(
        mut document: Value,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // An empty file parses as null.
        if document.is_null() {
            document = Value::Mapping(Mapping::new());
        }

        for &(var, path, kind) in ENV_OVERRIDES {
            let Some(raw) = lookup(var) else {
                continue;
            };
            let value = match kind {
                Kind::Text => Value::String(raw),
                Kind::Port => match raw.parse::<u16>() {
                    Ok(port) => Value::from(port),
                    Err(_) => return Err(ConfigError::InvalidEnv { var, value: raw }),
                },
            };
            set_path(&mut document, path, value)?;
        }

        Ok(serde_yaml::from_value(document)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flights.validate()?;
        self.identity.validate()?;
        if let Some(metrics) = &self.common.metrics
            && metrics.statsd_port == 0
        {
            return Err(ConfigError::ZeroStatsdPort);
        }
        Ok(())
    }
}

fn set_path(document: &mut Value, path: &[&str], value: Value) -> Result<(), ConfigError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut node = document;
    for (depth, key) in parents.iter().enumerate() {
        let mapping = node
            .as_mapping_mut()
            .ok_or_else(|| ConfigError::NotAMapping(path[..depth].join(".")))?;
        if !mapping.contains_key(*key) {
            mapping.insert(Value::from(*key), Value::Mapping(Mapping::new()));
        }
        node = mapping
            .get_mut(*key)
            .ok_or_else(|| ConfigError::NotAMapping(path[..=depth].join(".")))?;
    }

    node.as_mapping_mut()
        .ok_or_else(|| ConfigError::NotAMapping(parents.join(".")))?
        .insert(Value::from(*last), value);
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("metrics.statsd_port cannot be 0")]
    ZeroStatsdPort,
    #[error("config section '{0}' must be a mapping")]
    NotAMapping(String),
    #[error("invalid flights config: {0}")]
    Flights(#[from] flights::config::ValidationError),
    #[error("invalid identity config: {0}")]
    Identity(#[from] identity::config::ValidationError),
}
