//! In-memory stand-in for the flight-reco database.
//!
//! It answers the two statements from [`crate::query`] the way Postgres would,
//! including `PERCENTILE_CONT(0.5)` interpolation, and counts handle
//! acquisitions and releases so tests can check for leaks.

use crate::query::{BindValue, DISTINCT_OND_SQL, FLIGHTS_AGGREGATION_SQL, QueryFilter, Statement};
use crate::store::{FlightStore, Row, StoreError, StoreHandle};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct FlightReco {
    pub search_id: i64,
    pub main_airline: String,
    pub advance_purchase: i64,
    pub ond: String,
    pub trip_type: String,
    pub number_of_flights: i64,
    pub price_eur: f64,
}

/// Round-trip reco shorthand.
pub fn reco(
    search_id: i64,
    main_airline: &str,
    advance_purchase: i64,
    ond: &str,
    number_of_flights: i64,
    price_eur: f64,
) -> FlightReco {
    FlightReco {
        search_id,
        main_airline: main_airline.into(),
        advance_purchase,
        ond: ond.into(),
        trip_type: "RT".into(),
        number_of_flights,
        price_eur,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fault {
    Connect,
    Query,
    Hang,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    released: AtomicUsize,
    statements: Mutex<Vec<Statement>>,
}

/// PAR-LIS round trips with known medians: 200 for TP at 30 days and 150
/// for AF at 7 days. The PAR-NYC and one-way recos must be filtered out.
pub fn fixture() -> Vec<FlightReco> {
    vec![
        // adv 30, TP: cheapest per search is 100, 200, 300 -> median 200
        reco(1, "TP", 30, "PAR-LIS", 1, 100.0),
        reco(1, "TP", 30, "PAR-LIS", 1, 180.0),
        reco(2, "TP", 30, "PAR-LIS", 2, 200.0),
        reco(3, "TP", 30, "PAR-LIS", 1, 300.0),
        // adv 7, AF: 100 and 200 -> median 150
        reco(4, "AF", 7, "PAR-LIS", 1, 100.0),
        reco(5, "AF", 7, "PAR-LIS", 1, 200.0),
        // other ond, excluded
        reco(6, "AF", 7, "PAR-NYC", 1, 999.0),
        // one way, excluded
        FlightReco {
            trip_type: "OW".into(),
            ..reco(7, "AF", 7, "PAR-LIS", 1, 1.0)
        },
    ]
}

pub struct MemoryFlightStore {
    recos: Arc<Vec<FlightReco>>,
    fault: Option<Fault>,
    counters: Arc<Counters>,
}

impl MemoryFlightStore {
    pub fn new(recos: Vec<FlightReco>) -> Self {
        MemoryFlightStore {
            recos: Arc::new(recos),
            fault: None,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.opened() - self.released()
    }

    /// Every statement that reached a handle, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.counters.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlightStore for MemoryFlightStore {
    async fn connect(&self) -> Result<Box<dyn StoreHandle>, StoreError> {
        if self.fault == Some(Fault::Connect) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle {
            recos: self.recos.clone(),
            fault: self.fault,
            counters: self.counters.clone(),
        }))
    }

    fn is_ready(&self) -> bool {
        self.fault != Some(Fault::Connect)
    }
}

struct MemoryHandle {
    recos: Arc<Vec<FlightReco>>,
    fault: Option<Fault>,
    counters: Arc<Counters>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.counters
            .statements
            .lock()
            .unwrap()
            .push(statement.clone());

        match self.fault {
            Some(Fault::Query) => {
                return Err(StoreError::Query("column \"price_eur\" does not exist".into()));
            }
            Some(Fault::Hang) => std::future::pending::<()>().await,
            _ => {}
        }

        match statement.sql {
            FLIGHTS_AGGREGATION_SQL => aggregate(&self.recos, &statement.binds),
            DISTINCT_OND_SQL => Ok(distinct_ond(&self.recos)),
            other => Err(StoreError::Query(format!("unexpected statement: {other}"))),
        }
    }
}

fn aggregate(recos: &[FlightReco], binds: &[BindValue]) -> Result<Vec<Row>, StoreError> {
    let [
        BindValue::Text(trip_type),
        BindValue::Text(ond),
        BindValue::Int(min),
        BindValue::Int(max),
    ] = binds
    else {
        return Err(StoreError::Query(format!("bad binds: {binds:?}")));
    };
    // Reuses the predicate only; the ond is matched against the bound value.
    let range = QueryFilter::new("", "", trip_type, *min, *max)
        .map_err(|e| StoreError::Query(e.to_string()))?;

    // Inner stage: cheapest fare per (search, airline, advance purchase, ond).
    let mut cheapest: BTreeMap<(i64, &str, i64, &str), f64> = BTreeMap::new();
    for r in recos.iter().filter(|r| {
        r.trip_type == *trip_type && r.ond == *ond && range.admits_flights(r.number_of_flights)
    }) {
        let key = (
            r.search_id,
            r.main_airline.as_str(),
            r.advance_purchase,
            r.ond.as_str(),
        );
        let price = cheapest.entry(key).or_insert(r.price_eur);
        *price = price.min(r.price_eur);
    }

    // Outer stage: median per (advance purchase, ond, airline).
    let mut groups: BTreeMap<(i64, &str, &str), Vec<f64>> = BTreeMap::new();
    for ((_, airline, adv, ond), price) in cheapest {
        groups.entry((adv, ond, airline)).or_default().push(price);
    }

    Ok(groups
        .into_iter()
        .rev()
        .map(|((adv, ond, airline), prices)| {
            row(json!({
                "median_price": percentile_cont(prices, 0.5),
                "adv_purchase": adv,
                "main_airline": airline,
                "ond": ond,
            }))
        })
        .collect())
}

fn distinct_ond(recos: &[FlightReco]) -> Vec<Row> {
    recos
        .iter()
        .map(|r| r.ond.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|ond| row(json!({ "ond": ond })))
        .collect()
}

/// Continuous percentile with linear interpolation between closest ranks.
pub fn percentile_cont(mut values: Vec<f64>, fraction: f64) -> f64 {
    values.sort_by(f64::total_cmp);
    let position = fraction * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    values[lower] + (values[upper] - values[lower]) * (position - lower as f64)
}

/// Store that returns fixed rows for any statement.
pub struct CannedFlightStore {
    rows: Vec<Row>,
}

impl CannedFlightStore {
    pub fn new(rows: Vec<Value>) -> Self {
        CannedFlightStore {
            rows: rows.into_iter().map(row).collect(),
        }
    }
}

#[async_trait]
impl FlightStore for CannedFlightStore {
    async fn connect(&self) -> Result<Box<dyn StoreHandle>, StoreError> {
        Ok(Box::new(CannedHandle(self.rows.clone())))
    }

    fn is_ready(&self) -> bool {
        true
    }
}

struct CannedHandle(Vec<Row>);

#[async_trait]
impl StoreHandle for CannedHandle {
    async fn fetch_all(&mut self, _statement: &Statement) -> Result<Vec<Row>, StoreError> {
        Ok(self.0.clone())
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row fixture must be an object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_cont() {
        assert_eq!(percentile_cont(vec![300.0, 100.0, 200.0], 0.5), 200.0);
        assert_eq!(percentile_cont(vec![100.0, 200.0], 0.5), 150.0);
        assert_eq!(percentile_cont(vec![42.0], 0.5), 42.0);
    }
}
