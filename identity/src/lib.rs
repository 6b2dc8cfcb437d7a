//! Login flow against a hosted identity provider, session gating, and the
//! per-user data routes behind the gate.

pub mod config;
pub mod error;
pub mod gate;
pub mod metrics_defs;
pub mod provider;
pub mod routes;
pub mod session;
pub mod session_store;
pub mod user_store;

#[cfg(test)]
mod testutils;

pub use error::AuthError;
pub use provider::{CognitoProvider, IdentityProvider};
pub use session::{Identity, session_layer};
pub use user_store::{DynamoUserStore, UserStore};

use std::sync::Arc;

/// Where the flow sends the browser, and how it marks the token cookie.
#[derive(Clone, Debug)]
pub struct FlowSettings {
    pub post_login_redirect: String,
    pub home_url: String,
    pub secure_cookies: bool,
    pub admin_users: Vec<String>,
}

impl FlowSettings {
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admin_users.iter().any(|user| *user == identity.username)
    }
}

impl From<&config::Session> for FlowSettings {
    fn from(session: &config::Session) -> Self {
        FlowSettings {
            post_login_redirect: session.post_login_redirect.clone(),
            home_url: session.home_url.clone(),
            secure_cookies: session.secure_cookies,
            admin_users: session.admin_users.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdentityState {
    pub provider: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserStore>,
    pub settings: Arc<FlowSettings>,
}

impl IdentityState {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        settings: FlowSettings,
    ) -> Self {
        IdentityState {
            provider,
            users,
            settings: Arc::new(settings),
        }
    }

    /// Cognito provider plus the DynamoDB user table, both from `config`.
    pub async fn from_config(config: &config::Config) -> Result<Self, AuthError> {
        let provider = CognitoProvider::new(&config.cognito)?;
        let users = DynamoUserStore::new(&config.user_store, &config.cognito.region).await;
        tracing::info!(
            issuer = %config.cognito.issuer(),
            table = %config.user_store.table_name,
            "identity provider configured"
        );

        Ok(IdentityState::new(
            Arc::new(provider),
            Arc::new(users),
            FlowSettings::from(&config.session),
        ))
    }
}
