use crate::config::UserStore as UserStoreConfig;
use crate::error::ErrorBody;
use crate::metrics_defs::USER_STORE_FAILURES;
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::time::Duration;

/// One user's item with its attributes converted to plain JSON.
pub type Item = Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum UserStoreError {
    #[error("user store request failed: {0}")]
    Request(String),
}

impl IntoResponse for UserStoreError {
    fn into_response(self) -> Response {
        shared::counter!(USER_STORE_FAILURES).increment(1);
        tracing::error!("{self}");
        let body = Json(ErrorBody {
            error: "Failed to fetch data",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Read-only view of the per-user key-value table.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The item stored under `key`, or `None` if there is none.
    async fn get_item(&self, key: &str) -> Result<Option<Item>, UserStoreError>;

    /// Every item in the table.
    async fn scan_items(&self) -> Result<Vec<Item>, UserStoreError>;
}

pub struct DynamoUserStore {
    client: Client,
    table_name: String,
    key_attribute: String,
}

impl DynamoUserStore {
    /// Builds a client from the ambient AWS configuration (environment,
    /// profile, instance role) with the table's overrides applied on top.
    pub async fn new(config: &UserStoreConfig, default_region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| default_region.to_string());
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
            .region(aws_sdk_dynamodb::config::Region::new(region));

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self::from_client(
            Client::from_conf(builder.build()),
            config.table_name.clone(),
            config.key_attribute.clone(),
        )
    }

    pub fn from_client(client: Client, table_name: String, key_attribute: String) -> Self {
        DynamoUserStore {
            client,
            table_name,
            key_attribute,
        }
    }
}

#[async_trait]
impl UserStore for DynamoUserStore {
    async fn get_item(&self, key: &str) -> Result<Option<Item>, UserStoreError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| {
                UserStoreError::Request(format!("GetItem failed: {}", DisplayErrorContext(&e)))
            })?;

        Ok(response.item().map(item_to_json))
    }

    async fn scan_items(&self) -> Result<Vec<Item>, UserStoreError> {
        let mut items = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let response = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .map_err(|e| {
                    UserStoreError::Request(format!("Scan failed: {}", DisplayErrorContext(&e)))
                })?;

            items.extend(response.items().iter().map(item_to_json));

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => last_evaluated_key = Some(key.clone()),
                _ => break,
            }
        }

        tracing::debug!(count = items.len(), table = %self.table_name, "scanned user store");
        Ok(items)
    }
}

/// Attribute names come back in hash order; sort them so responses are stable.
pub fn item_to_json(item: &HashMap<String, AttributeValue>) -> Item {
    let mut names: Vec<&String> = item.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| (name.clone(), attribute_to_json(&item[name])))
        .collect()
}

pub fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::String(BASE64_STANDARD.encode(blob.as_ref())),
        AttributeValue::Ss(set) => set.iter().cloned().map(Value::String).collect(),
        AttributeValue::Ns(set) => set.iter().map(|n| number_to_json(n)).collect(),
        AttributeValue::Bs(set) => set
            .iter()
            .map(|blob| Value::String(BASE64_STANDARD.encode(blob.as_ref())))
            .collect(),
        AttributeValue::L(list) => list.iter().map(attribute_to_json).collect(),
        AttributeValue::M(map) => Value::Object(item_to_json(map)),
        other => {
            tracing::warn!(?other, "unsupported attribute type");
            Value::Null
        }
    }
}

// DynamoDB numbers travel as strings. Anything that does not fit an i64 or
// a finite f64 stays a string rather than losing precision silently.
fn number_to_json(n: &str) -> Value {
    if let Ok(int) = n.parse::<i64>() {
        return Value::Number(int.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}
