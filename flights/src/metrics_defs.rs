//! Metrics definitions for the flights API.

use shared::metrics_defs::{MetricDef, MetricType};

pub const QUERY_DURATION: MetricDef = MetricDef {
    name: "flights.query.duration",
    metric_type: MetricType::Histogram,
    description: "Time to acquire a connection and run one statement, in seconds",
};

pub const QUERY_ROWS: MetricDef = MetricDef {
    name: "flights.query.rows",
    metric_type: MetricType::Histogram,
    description: "Number of rows returned by one statement",
};

pub const QUERY_FAILURES: MetricDef = MetricDef {
    name: "flights.query.failures",
    metric_type: MetricType::Counter,
    description: "Statements that failed or timed out after a connection was acquired",
};

pub const STORE_UNAVAILABLE: MetricDef = MetricDef {
    name: "flights.store.unavailable",
    metric_type: MetricType::Counter,
    description: "Requests that could not obtain a database connection",
};

pub const MALFORMED_OND: MetricDef = MetricDef {
    name: "flights.cities.malformed_ond",
    metric_type: MetricType::Counter,
    description: "OND values that could not be split into origin and destination",
};

pub const ALL_METRICS: &[MetricDef] = &[
    QUERY_DURATION,
    QUERY_ROWS,
    QUERY_FAILURES,
    STORE_UNAVAILABLE,
    MALFORMED_OND,
];
