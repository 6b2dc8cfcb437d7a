use crate::store::{Row, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `/api/flights` result: the median of the cheapest fare per search,
/// for one advance-purchase window, airline and OND.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationRow {
    pub median_price: f64,
    pub adv_purchase: i64,
    pub main_airline: String,
    pub ond: String,
}

impl TryFrom<Row> for AggregationRow {
    type Error = StoreError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(row))
            .map_err(|e| StoreError::Query(format!("unexpected aggregation row: {e}")))
    }
}
