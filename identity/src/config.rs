use serde::Deserialize;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Signed session cookies need a reasonably long secret.
const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Identity setting '{0}' cannot be empty")]
    EmptySetting(&'static str),

    #[error("Session secret key must be at least 32 bytes")]
    WeakSecretKey,

    #[error("Session capacity must be greater than zero")]
    ZeroMaxSessions,

    #[error("Invalid identity provider domain: {0}")]
    InvalidDomain(String),

    #[error("Redirect target '{0}' must be a local path")]
    NonLocalRedirect(String),
}

/// Cognito user pool app client using the hosted UI.
#[derive(Clone, Deserialize, Debug)]
pub struct Cognito {
    pub region: String,
    /// Hosted UI domain, e.g. `flights.auth.eu-north-1.amazoncognito.com`.
    /// A full `http(s)://` base URL is accepted as well.
    pub domain: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Callback registered with the app client, served by `/postlogin`.
    pub redirect_url: Url,
    /// Sign-out URL registered with the app client, served by `/postlogout`.
    pub logout_url: Url,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".into(), "email".into(), "profile".into()]
}

fn default_username_claim() -> String {
    "username".into()
}

impl Cognito {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            Url::parse(&self.domain)
        } else {
            Url::parse(&format!("https://{}", self.domain))
        }
    }

    /// Issuer of tokens minted by the user pool.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("region", &self.region),
            ("domain", &self.domain),
            ("user_pool_id", &self.user_pool_id),
            ("client_id", &self.client_id),
            ("username_claim", &self.username_claim),
        ] {
            if value.is_empty() {
                return Err(ValidationError::EmptySetting(name));
            }
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ValidationError::EmptySetting("client_secret"));
        }
        self.base_url()
            .map_err(|e| ValidationError::InvalidDomain(format!("{}: {e}", self.domain)))?;
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Session {
    pub secret_key: SecretString,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Set the `Secure` attribute on the session and token cookies.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Live sessions kept in memory. The least recently used are dropped first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    #[serde(default = "default_post_login_redirect")]
    pub post_login_redirect: String,
    #[serde(default = "default_home_url")]
    pub home_url: String,
    /// Usernames allowed to list every user's item.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

fn default_cookie_name() -> String {
    "flightdash_session".into()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_inactivity_timeout_secs() -> u64 {
    3600
}

fn default_max_sessions() -> u64 {
    10_000
}

fn default_post_login_redirect() -> String {
    "/dashboard".into()
}

fn default_home_url() -> String {
    "/".into()
}

impl Session {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.secret_key.expose_secret().len() < MIN_SECRET_KEY_LEN {
            return Err(ValidationError::WeakSecretKey);
        }
        if self.max_sessions == 0 {
            return Err(ValidationError::ZeroMaxSessions);
        }
        if self.cookie_name.is_empty() {
            return Err(ValidationError::EmptySetting("cookie_name"));
        }
        if !self.post_login_redirect.starts_with('/') {
            return Err(ValidationError::NonLocalRedirect(
                self.post_login_redirect.clone(),
            ));
        }
        Ok(())
    }
}

/// DynamoDB table holding one item per user, keyed by uppercased username.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct UserStore {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,
    /// Defaults to the Cognito region.
    pub region: Option<String>,
    /// Endpoint override, e.g. DynamoDB Local.
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

fn default_table_name() -> String {
    "UserAirlinePairs".into()
}

fn default_key_attribute() -> String {
    "username".into()
}

impl Default for UserStore {
    fn default() -> Self {
        UserStore {
            table_name: default_table_name(),
            key_attribute: default_key_attribute(),
            region: None,
            endpoint: None,
            timeout_ms: None,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub cognito: Cognito,
    pub session: Session,
    #[serde(default)]
    pub user_store: UserStore,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.cognito.validate()?;
        self.session.validate()?;
        if self.user_store.table_name.is_empty() {
            return Err(ValidationError::EmptySetting("table_name"));
        }
        if self.user_store.key_attribute.is_empty() {
            return Err(ValidationError::EmptySetting("key_attribute"));
        }
        Ok(())
    }
}
