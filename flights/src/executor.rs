use crate::metrics_defs::{QUERY_DURATION, QUERY_FAILURES, QUERY_ROWS, STORE_UNAVAILABLE};
use crate::query::Statement;
use crate::store::{FlightStore, Row, StoreError};
use shared::{counter, histogram};
use std::time::{Duration, Instant};

/// Runs `statement` with a single handle from `store`.
///
/// One acquire and at most one round trip per call, no retries. The handle is
/// released before returning on every path, including timeouts. Error details
/// are logged here; callers only decide which generic message to show.
pub async fn execute(
    store: &dyn FlightStore,
    statement: &Statement,
    timeout: Duration,
) -> Result<Vec<Row>, StoreError> {
    let started = Instant::now();

    let mut handle = match store.connect().await {
        Ok(handle) => handle,
        Err(e) => {
            counter!(STORE_UNAVAILABLE).increment(1);
            tracing::error!(statement = statement.name, "could not connect to flight store: {e}");
            return Err(e);
        }
    };

    let result = match tokio::time::timeout(timeout, handle.fetch_all(statement)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    };
    drop(handle);

    histogram!(QUERY_DURATION, "statement" => statement.name)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(rows) => {
            histogram!(QUERY_ROWS, "statement" => statement.name).record(rows.len() as f64);
            tracing::debug!(
                statement = statement.name,
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "statement executed"
            );
            Ok(rows)
        }
        Err(e) => {
            counter!(QUERY_FAILURES, "statement" => statement.name).increment(1);
            tracing::error!(
                statement = statement.name,
                binds = ?statement.binds,
                "statement failed: {e}"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryFilter, Statement};
    use crate::testutils::{Fault, MemoryFlightStore, reco};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn aggregation() -> Statement {
        Statement::flights_aggregation(&QueryFilter::new("PAR", "LIS", "RT", 0, 5).unwrap())
    }

    #[tokio::test]
    async fn test_handle_released_on_success() {
        let store = MemoryFlightStore::new(vec![reco(1, "TP", 30, "PAR-LIS", 1, 100.0)]);
        let rows = execute(&store, &aggregation(), TIMEOUT).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(store.opened(), 1);
        assert_eq!(store.released(), 1);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_handle_released_once_on_query_failure() {
        let store = MemoryFlightStore::new(vec![]).with_fault(Fault::Query);
        let err = execute(&store, &aggregation(), TIMEOUT).await.unwrap_err();

        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(store.opened(), 1);
        assert_eq!(store.released(), 1);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_handle_released_on_timeout() {
        let store = MemoryFlightStore::new(vec![]).with_fault(Fault::Hang);
        let err = execute(&store, &aggregation(), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Timeout(_)));
        assert_eq!(store.released(), 1);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_opens_nothing() {
        let store = MemoryFlightStore::new(vec![]).with_fault(Fault::Connect);
        let err = execute(&store, &aggregation(), TIMEOUT).await.unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.opened(), 0);
        assert_eq!(store.released(), 0);
        assert_eq!(store.statements().len(), 0);
    }

    #[tokio::test]
    async fn test_single_round_trip() {
        let store = MemoryFlightStore::new(vec![]);
        execute(&store, &aggregation(), TIMEOUT).await.unwrap();

        assert_eq!(store.statements(), vec![aggregation()]);
    }
}
