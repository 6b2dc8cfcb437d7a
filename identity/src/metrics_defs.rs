use shared::metrics_defs::{MetricDef, MetricType};

pub const LOGIN_SUCCEEDED: MetricDef = MetricDef {
    name: "identity.login.succeeded",
    metric_type: MetricType::Counter,
    description: "Authorization codes exchanged for a session",
};

pub const LOGIN_FAILED: MetricDef = MetricDef {
    name: "identity.login.failed",
    metric_type: MetricType::Counter,
    description: "Callbacks that did not produce a session",
};

pub const GATE_REJECTED: MetricDef = MetricDef {
    name: "identity.gate.rejected",
    metric_type: MetricType::Counter,
    description: "Requests to protected routes without a session identity",
};

pub const USER_STORE_FAILURES: MetricDef = MetricDef {
    name: "identity.user_store.failures",
    metric_type: MetricType::Counter,
    description: "Failed requests to the per-user store",
};

pub const ALL_METRICS: &[MetricDef] = &[
    LOGIN_SUCCEEDED,
    LOGIN_FAILED,
    GATE_REJECTED,
    USER_STORE_FAILURES,
];
