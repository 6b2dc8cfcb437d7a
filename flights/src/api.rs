use crate::cities::{MalformedOnd, OndIndex, index_ond_rows};
use crate::config::Config;
use crate::executor::execute;
use crate::query::{FlightsParams, ParamError, QueryFilter, Statement};
use crate::store::{FlightStore, StoreError};
use crate::types::AggregationRow;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

const FETCH_FAILED: &str = "Failed to fetch data";
const CONNECTION_FAILED: &str = "Connection to database failed";

#[derive(thiserror::Error, Debug)]
pub enum FlightsApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct FlightsState {
    store: Arc<dyn FlightStore>,
    query_timeout: Duration,
}

impl FlightsState {
    pub fn new(store: Arc<dyn FlightStore>, query_timeout: Duration) -> Self {
        FlightsState {
            store,
            query_timeout,
        }
    }
}

/// The analytics routes only.
pub fn router(state: FlightsState) -> Router {
    Router::new()
        .route("/api/flights", get(flights_handler))
        .route("/api/cities", get(cities_handler))
        .with_state(state)
}

/// The full public application: analytics routes plus `extra` (the identity
/// routes), wrapped in the request timeout and, if enabled, CORS.
pub fn app(config: &Config, state: FlightsState, extra: Router) -> Router {
    let app = router(state)
        .merge(extra)
        .layer(TimeoutLayer::new(config.request_timeout()));

    if config.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

pub async fn serve(config: &Config, app: Router) -> Result<(), FlightsApiError> {
    let addr = format!("{}:{}", config.listener.host, config.listener.port);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "flights api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn flights_handler(
    State(state): State<FlightsState>,
    Query(params): Query<FlightsParams>,
) -> Result<Json<Vec<AggregationRow>>, ApiError> {
    let ignored = params.ignored();
    if !ignored.is_empty() {
        tracing::debug!(?ignored, "ignoring unsupported flight filters");
    }

    let filter = QueryFilter::try_from(&params)?;
    let statement = Statement::flights_aggregation(&filter);
    let rows = execute(state.store.as_ref(), &statement, state.query_timeout).await?;

    let rows = rows
        .into_iter()
        .map(AggregationRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(rows))
}

async fn cities_handler(State(state): State<FlightsState>) -> Result<Json<OndIndex>, ApiError> {
    let rows = execute(
        state.store.as_ref(),
        &Statement::distinct_ond(),
        state.query_timeout,
    )
    .await?;

    Ok(Json(index_ond_rows(&rows)?))
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    InvalidParams(#[from] ParamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    MalformedOnd(#[from] MalformedOnd),
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidParams(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Store(StoreError::Unavailable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, CONNECTION_FAILED.into())
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED.into()),
            ApiError::MalformedOnd(e) => {
                tracing::error!("cannot index cities: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED.into())
            }
        };

        (status, Json(ApiErrorResponse { error: message })).into_response()
    }
}
