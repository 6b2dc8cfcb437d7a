//! Median fare analytics over the `flight_recos` table.
//!
//! Request flow: [`api`] extracts parameters, [`query`] builds the statement,
//! [`executor`] runs it on a handle from a [`store::FlightStore`], and the rows
//! go back as JSON.

pub mod api;
pub mod cities;
pub mod config;
pub mod executor;
pub mod metrics_defs;
pub mod query;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutils;

pub use api::{FlightsApiError, FlightsState};
pub use store::{FlightStore, PgFlightStore};
