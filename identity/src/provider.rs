use crate::config::Cognito as CognitoConfig;
use crate::error::AuthError;
use crate::session::Identity;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful authorization-code exchange.
#[derive(Debug)]
pub struct Authenticated {
    pub access_token: String,
    pub identity: Identity,
}

/// The hosted login flow of an external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Hosted login page. `state` is passed through untouched and comes back
    /// on the callback.
    fn login_url(&self, state: Option<&str>) -> Url;

    /// Hosted logout endpoint, which redirects to the configured post-logout URL.
    fn logout_url(&self) -> Url;

    /// Trades the authorization code from the callback for a token and the
    /// user's claims.
    async fn exchange_code(&self, code: &str) -> Result<Authenticated, AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Cognito hosted UI over the OAuth2 authorization-code grant.
pub struct CognitoProvider {
    client: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    redirect_url: Url,
    logout_redirect_url: Url,
    scope: String,
    username_claim: String,
}

impl CognitoProvider {
    pub fn new(config: &CognitoConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(CognitoProvider {
            client,
            base_url: config.base_url()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            logout_redirect_url: config.logout_url.clone(),
            scope: config.scopes.join(" "),
            username_claim: config.username_claim.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    fn login_url(&self, state: Option<&str>) -> Url {
        let mut url = self.endpoint("/oauth2/authorize");
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", self.redirect_url.as_str())
                .append_pair("scope", &self.scope);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }

    fn logout_url(&self) -> Url {
        let mut url = self.endpoint("/logout");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("logout_uri", self.logout_redirect_url.as_str());
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<Authenticated, AuthError> {
        let response = self
            .client
            .post(self.endpoint("/oauth2/token"))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .send()
            .await?;

        // invalid_grant and friends: expired, reused or forged codes.
        if response.status().is_client_error() {
            return Err(AuthError::Rejected(response.status()));
        }
        let tokens: TokenResponse = response.error_for_status()?.json().await?;
        tracing::debug!(expires_in = ?tokens.expires_in, "exchanged authorization code");

        let claims: Map<String, Value> = self
            .client
            .get(self.endpoint("/oauth2/userInfo"))
            .bearer_auth(&tokens.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let identity = Identity::from_claims(claims, &self.username_claim)?;
        Ok(Authenticated {
            access_token: tokens.access_token,
            identity,
        })
    }
}
