//! Connection provider for the flight-reco database.
//!
//! A [`FlightStore`] hands out [`StoreHandle`]s. Dropping a handle releases the
//! underlying connection, so every exit path of a caller gives it back exactly
//! once.

use crate::config::Database as DatabaseConfig;
use crate::query::{BindValue, Statement};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One result row: column name to value, in projection order.
pub type Row = Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("query timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Acquires a handle, or `StoreError::Unavailable` if the store cannot be reached.
    async fn connect(&self) -> Result<Box<dyn StoreHandle>, StoreError>;

    /// True once a connection has been handed out and the last attempt succeeded.
    fn is_ready(&self) -> bool;

    /// Acquires and immediately releases a handle.
    async fn probe(&self) -> Result<(), StoreError> {
        self.connect().await.map(drop)
    }
}

#[async_trait]
pub trait StoreHandle: Send {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
}

/// Postgres-backed store over a bounded pool shared by all requests.
pub struct PgFlightStore {
    pool: PgPool,
    ready: Arc<AtomicBool>,
}

impl PgFlightStore {
    /// Builds the pool lazily: no connection is opened until the first request,
    /// so a database outage does not keep the service from starting.
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret())
            .database(&config.name)
            .application_name("flightdash");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .test_before_acquire(true)
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_connections = config.max_connections,
            "configured flight store pool"
        );

        PgFlightStore {
            pool,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn readiness(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl FlightStore for PgFlightStore {
    async fn connect(&self) -> Result<Box<dyn StoreHandle>, StoreError> {
        match self.pool.acquire().await {
            Ok(conn) => {
                self.ready.store(true, Ordering::Relaxed);
                Ok(Box::new(PgHandle { conn }))
            }
            Err(e) => {
                self.ready.store(false, Ordering::Relaxed);
                Err(StoreError::Unavailable(e.to_string()))
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

struct PgHandle {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StoreHandle for PgHandle {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let mut query = sqlx::query(statement.sql);
        for bind in &statement.binds {
            query = match bind {
                BindValue::Text(value) => query.bind(value.clone()),
                BindValue::Int(value) => query.bind(*value),
            };
        }

        let rows = query
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter().map(materialize).collect()
    }
}

/// Converts a row into a JSON map keyed by the projected column names.
fn materialize(row: &PgRow) -> Result<Row, StoreError> {
    let mut out = Row::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => row.try_get::<Option<i16>, _>(idx).map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(idx).map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(idx).map(Value::from),
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(Value::from),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(Value::from),
            "BOOL" => row.try_get::<Option<bool>, _>(idx).map(Value::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx).map(Value::from)
            }
            other => {
                return Err(StoreError::Query(format!(
                    "unsupported type {other} for column '{}'",
                    column.name()
                )));
            }
        }
        .map_err(|e| StoreError::Query(e.to_string()))?;

        out.insert(column.name().to_string(), value);
    }

    Ok(out)
}
