use crate::error::AuthError;
use crate::provider::{Authenticated, IdentityProvider};
use crate::session::Identity;
use crate::user_store::{Item, UserStore, UserStoreError};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use url::Url;

/// Accepts the code `good` as user `alice`; `outage` behaves like an
/// unreachable provider; anything else is rejected.
pub struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn login_url(&self, state: Option<&str>) -> Url {
        let mut url = Url::parse("https://idp.test/oauth2/authorize").unwrap();
        url.query_pairs_mut().append_pair("client_id", "test");
        if let Some(state) = state {
            url.query_pairs_mut().append_pair("state", state);
        }
        url
    }

    fn logout_url(&self) -> Url {
        let mut url = Url::parse("https://idp.test/logout").unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "test")
            .append_pair("logout_uri", "http://localhost/postlogout");
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<Authenticated, AuthError> {
        match code {
            "good" => {
                let claims = match json!({"username": "alice", "email": "alice@example.com"}) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                };
                Ok(Authenticated {
                    access_token: "tok-alice".into(),
                    identity: Identity::from_claims(claims, "username")?,
                })
            }
            "outage" => Err(AuthError::InvalidUrl(url::ParseError::EmptyHost)),
            _ => Err(AuthError::Rejected(reqwest::StatusCode::BAD_REQUEST)),
        }
    }
}

/// Items keyed by their `username` attribute.
pub struct MemoryUserStore {
    items: Vec<Item>,
    failing: bool,
}

impl MemoryUserStore {
    pub fn new(items: Vec<Value>) -> Self {
        let items = items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map,
                other => panic!("not an item: {other}"),
            })
            .collect();
        MemoryUserStore {
            items,
            failing: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn check(&self) -> Result<(), UserStoreError> {
        if self.failing {
            return Err(UserStoreError::Request("table unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_item(&self, key: &str) -> Result<Option<Item>, UserStoreError> {
        self.check()?;
        Ok(self
            .items
            .iter()
            .find(|item| item.get("username") == Some(&Value::String(key.to_string())))
            .cloned())
    }

    async fn scan_items(&self) -> Result<Vec<Map<String, Value>>, UserStoreError> {
        self.check()?;
        Ok(self.items.clone())
    }
}
