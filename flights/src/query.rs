//! Maps `/api/flights` query parameters onto the median-price aggregation.
//!
//! Request values only ever travel as bind parameters. The SQL text of every
//! statement built here is a compile-time constant.

use serde::Deserialize;

/// Used when `trip_type` is absent or empty. Round trips are what the
/// dashboard shows by default.
pub const DEFAULT_TRIP_TYPE: &str = "RT";
pub const DEFAULT_MIN_CONNECTIONS: i64 = 0;
/// Large enough that no itinerary is excluded when no upper bound is given.
pub const DEFAULT_MAX_CONNECTIONS: i64 = i32::MAX as i64;

/// Median of the cheapest fare per search, per advance-purchase window,
/// airline and OND.
///
/// Binds: `$1` trip type, `$2` ond, `$3` min connections, `$4` max connections.
/// `number_of_flights` counts legs, so `(min, max + 1]` admits itineraries
/// with `min..=max` connections.
pub const FLIGHTS_AGGREGATION_SQL: &str = "\
SELECT
    PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY price_eur)::FLOAT8 AS median_price,
    advance_purchase::INT8 AS adv_purchase,
    main_airline::TEXT AS main_airline,
    ond::TEXT AS ond
FROM (
    SELECT
        MIN(price_eur) AS price_eur,
        main_airline,
        advance_purchase,
        ond
    FROM flight_recos
    WHERE trip_type = $1
      AND ond = $2
      AND number_of_flights > $3
      AND number_of_flights <= $4 + 1
    GROUP BY search_id, main_airline, advance_purchase, ond
) AS t
GROUP BY advance_purchase, ond, main_airline
ORDER BY advance_purchase DESC";

pub const DISTINCT_OND_SQL: &str = "SELECT DISTINCT ond::TEXT AS ond FROM flight_recos";

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
}

/// A parameterized statement ready for the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Short label used in logs and metrics.
    pub name: &'static str,
    pub sql: &'static str,
    pub binds: Vec<BindValue>,
}

impl Statement {
    pub fn flights_aggregation(filter: &QueryFilter) -> Self {
        Statement {
            name: "flights_aggregation",
            sql: FLIGHTS_AGGREGATION_SQL,
            binds: vec![
                BindValue::Text(filter.trip_type.clone()),
                BindValue::Text(filter.ond.clone()),
                BindValue::Int(filter.min_connections),
                BindValue::Int(filter.max_connections),
            ],
        }
    }

    pub fn distinct_ond() -> Self {
        Statement {
            name: "distinct_ond",
            sql: DISTINCT_OND_SQL,
            binds: Vec::new(),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("{name} must be an integer, got '{value}'")]
    NotAnInteger { name: &'static str, value: String },

    #[error("{name} cannot be negative")]
    Negative { name: &'static str },

    #[error("{name} cannot exceed 2147483647")]
    TooLarge { name: &'static str },

    #[error("nb_connections_min ({min}) is greater than nb_connections_max ({max})")]
    InvertedRange { min: i64, max: i64 },
}

/// Raw `/api/flights` query string.
#[derive(Deserialize, Debug, Default)]
pub struct FlightsParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub trip_type: Option<String>,
    pub nb_connections_min: Option<String>,
    pub nb_connections_max: Option<String>,

    // Sent by the dashboard but not applied to the query yet.
    pub search_date_start: Option<String>,
    pub search_date_end: Option<String>,
    pub departure_date_start: Option<String>,
    pub departure_date_end: Option<String>,
    pub is_one_adult: Option<String>,
    pub cabin: Option<String>,
}

impl FlightsParams {
    /// Names of accepted parameters that were sent but have no effect.
    pub fn ignored(&self) -> Vec<&'static str> {
        [
            ("search_date_start", &self.search_date_start),
            ("search_date_end", &self.search_date_end),
            ("departure_date_start", &self.departure_date_start),
            ("departure_date_end", &self.departure_date_end),
            ("is_one_adult", &self.is_one_adult),
            ("cabin", &self.cabin),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_some_and(|v| !v.is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Validated filter for one aggregation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    trip_type: String,
    ond: String,
    min_connections: i64,
    max_connections: i64,
}

impl QueryFilter {
    /// The OND is always joined here so the separator stays canonical.
    pub fn new(
        origin: &str,
        destination: &str,
        trip_type: &str,
        min_connections: i64,
        max_connections: i64,
    ) -> Result<Self, ParamError> {
        if min_connections < 0 {
            return Err(ParamError::Negative {
                name: "nb_connections_min",
            });
        }
        if max_connections < 0 {
            return Err(ParamError::Negative {
                name: "nb_connections_max",
            });
        }
        // Keeps `max + 1` inside INT8 on both sides of the wire.
        for (name, value) in [
            ("nb_connections_min", min_connections),
            ("nb_connections_max", max_connections),
        ] {
            if value > DEFAULT_MAX_CONNECTIONS {
                return Err(ParamError::TooLarge { name });
            }
        }
        if min_connections > max_connections {
            return Err(ParamError::InvertedRange {
                min: min_connections,
                max: max_connections,
            });
        }

        Ok(QueryFilter {
            trip_type: trip_type.to_string(),
            ond: format!("{origin}-{destination}"),
            min_connections,
            max_connections,
        })
    }

    pub fn trip_type(&self) -> &str {
        &self.trip_type
    }

    pub fn ond(&self) -> &str {
        &self.ond
    }

    pub fn min_connections(&self) -> i64 {
        self.min_connections
    }

    pub fn max_connections(&self) -> i64 {
        self.max_connections
    }

    /// Whether an itinerary with `number_of_flights` legs passes the
    /// connection predicate of [`FLIGHTS_AGGREGATION_SQL`].
    pub fn admits_flights(&self, number_of_flights: i64) -> bool {
        number_of_flights > self.min_connections && number_of_flights <= self.max_connections + 1
    }
}

impl TryFrom<&FlightsParams> for QueryFilter {
    type Error = ParamError;

    fn try_from(params: &FlightsParams) -> Result<Self, Self::Error> {
        let trip_type = match params.trip_type.as_deref() {
            None | Some("") => DEFAULT_TRIP_TYPE,
            Some(trip_type) => trip_type,
        };
        let min = parse_bound(
            "nb_connections_min",
            params.nb_connections_min.as_deref(),
            DEFAULT_MIN_CONNECTIONS,
        )?;
        let max = parse_bound(
            "nb_connections_max",
            params.nb_connections_max.as_deref(),
            DEFAULT_MAX_CONNECTIONS,
        )?;

        QueryFilter::new(
            params.origin.as_deref().unwrap_or_default(),
            params.destination.as_deref().unwrap_or_default(),
            trip_type,
            min,
            max,
        )
    }
}

fn parse_bound(name: &'static str, raw: Option<&str>, default: i64) -> Result<i64, ParamError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| ParamError::NotAnInteger {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(origin: &str, destination: &str) -> FlightsParams {
        FlightsParams {
            origin: Some(origin.into()),
            destination: Some(destination.into()),
            trip_type: Some("OW".into()),
            nb_connections_min: Some("0".into()),
            nb_connections_max: Some("2".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ond_is_joined_with_hyphen() {
        for (origin, destination) in [("PAR", "LIS"), ("par", "lis"), ("LOND", "NYCX")] {
            let filter = QueryFilter::try_from(&params(origin, destination)).unwrap();
            assert_eq!(filter.ond(), format!("{origin}-{destination}"));
        }
    }

    #[test]
    fn test_binds_follow_placeholders() {
        let filter = QueryFilter::try_from(&params("PAR", "LIS")).unwrap();
        let statement = Statement::flights_aggregation(&filter);

        assert_eq!(statement.sql, FLIGHTS_AGGREGATION_SQL);
        assert_eq!(
            statement.binds,
            vec![
                BindValue::Text("OW".into()),
                BindValue::Text("PAR-LIS".into()),
                BindValue::Int(0),
                BindValue::Int(2),
            ]
        );
        for placeholder in ["$1", "$2", "$3", "$4"] {
            assert!(statement.sql.contains(placeholder));
        }
        assert!(!statement.sql.contains("$5"));
    }

    #[test]
    fn test_hostile_values_stay_in_binds() {
        let hostile = FlightsParams {
            origin: Some("PAR' OR '1'='1".into()),
            destination: Some("LIS'; DROP TABLE flight_recos; --".into()),
            trip_type: Some("RT' UNION SELECT 1 --".into()),
            ..Default::default()
        };
        let filter = QueryFilter::try_from(&hostile).unwrap();
        let statement = Statement::flights_aggregation(&filter);

        assert_eq!(statement.sql, FLIGHTS_AGGREGATION_SQL);
        assert!(!statement.sql.contains("DROP"));
        assert!(!statement.sql.contains('\''));
        assert_eq!(
            statement.binds[1],
            BindValue::Text("PAR' OR '1'='1-LIS'; DROP TABLE flight_recos; --".into())
        );
        assert_eq!(
            statement.binds[0],
            BindValue::Text("RT' UNION SELECT 1 --".into())
        );
    }

    #[test]
    fn test_connection_range_boundaries() {
        let filter = QueryFilter::new("PAR", "LIS", "RT", 1, 3).unwrap();

        assert!(!filter.admits_flights(1), "min itself is rejected");
        assert!(filter.admits_flights(2));
        assert!(filter.admits_flights(3));
        assert!(filter.admits_flights(4), "max + 1 is admitted");
        assert!(!filter.admits_flights(5));
    }

    #[test]
    fn test_bounds_above_int_range_are_rejected() {
        let err = QueryFilter::new("PAR", "LIS", "RT", 0, i64::MAX).unwrap_err();
        assert_eq!(
            err,
            ParamError::TooLarge {
                name: "nb_connections_max"
            }
        );
        assert_eq!(
            err.to_string(),
            "nb_connections_max cannot exceed 2147483647"
        );

        let err = QueryFilter::new("PAR", "LIS", "RT", DEFAULT_MAX_CONNECTIONS + 1, i64::MAX)
            .unwrap_err();
        assert_eq!(
            err,
            ParamError::TooLarge {
                name: "nb_connections_min"
            }
        );

        let widest = QueryFilter::new("PAR", "LIS", "RT", 0, DEFAULT_MAX_CONNECTIONS).unwrap();
        assert!(widest.admits_flights(DEFAULT_MAX_CONNECTIONS + 1));
    }

    #[test]
    fn test_defaults_when_absent() {
        let filter = QueryFilter::try_from(&FlightsParams::default()).unwrap();

        assert_eq!(filter.trip_type(), DEFAULT_TRIP_TYPE);
        assert_eq!(filter.ond(), "-");
        assert_eq!(filter.min_connections(), DEFAULT_MIN_CONNECTIONS);
        assert_eq!(filter.max_connections(), DEFAULT_MAX_CONNECTIONS);
        assert!(filter.admits_flights(1));
        assert!(filter.admits_flights(40));
    }

    #[test]
    fn test_empty_strings_use_defaults() {
        let filter = QueryFilter::try_from(&FlightsParams {
            trip_type: Some(String::new()),
            nb_connections_min: Some(String::new()),
            nb_connections_max: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(filter.trip_type(), DEFAULT_TRIP_TYPE);
        assert_eq!(filter.min_connections(), DEFAULT_MIN_CONNECTIONS);
        assert_eq!(filter.max_connections(), DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_invalid_bounds() {
        let mut bad = params("PAR", "LIS");
        bad.nb_connections_min = Some("one".into());
        assert_eq!(
            QueryFilter::try_from(&bad),
            Err(ParamError::NotAnInteger {
                name: "nb_connections_min",
                value: "one".into()
            })
        );

        let mut bad = params("PAR", "LIS");
        bad.nb_connections_max = Some("-1".into());
        assert_eq!(
            QueryFilter::try_from(&bad),
            Err(ParamError::Negative {
                name: "nb_connections_max"
            })
        );

        let mut bad = params("PAR", "LIS");
        bad.nb_connections_min = Some("3".into());
        assert_eq!(
            QueryFilter::try_from(&bad),
            Err(ParamError::InvertedRange { min: 3, max: 2 })
        );
    }

    #[test]
    fn test_ignored_params() {
        let mut p = params("PAR", "LIS");
        assert!(p.ignored().is_empty());

        p.cabin = Some("economy".into());
        p.search_date_start = Some(String::new());
        assert_eq!(p.ignored(), vec!["cabin"]);
    }
}
