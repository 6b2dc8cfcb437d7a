use crate::metrics_defs::MALFORMED_OND;
use crate::store::Row;
use serde::Serialize;
use serde_json::Value;
use shared::counter;
use std::collections::BTreeSet;

/// Every origin and destination code that appears in the flight data, each
/// list sorted and free of duplicates.
#[derive(Serialize, Debug, Default, PartialEq)]
pub struct OndIndex {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("malformed ond value: {0}")]
pub struct MalformedOnd(pub String);

/// Splits `"ORIGIN-DEST"` into its two codes.
///
/// Exactly one hyphen with a non-empty code on each side is accepted.
pub fn split_ond(ond: &str) -> Result<(&str, &str), MalformedOnd> {
    match ond.split_once('-') {
        Some((origin, destination))
            if !origin.is_empty() && !destination.is_empty() && !destination.contains('-') =>
        {
            Ok((origin, destination))
        }
        _ => Err(MalformedOnd(ond.to_string())),
    }
}

/// Builds the index from `SELECT DISTINCT ond` rows.
///
/// A single malformed value fails the whole index; the caller turns that into
/// a failed request rather than a partial list.
pub fn index_ond_rows(rows: &[Row]) -> Result<OndIndex, MalformedOnd> {
    let mut origins = BTreeSet::new();
    let mut destinations = BTreeSet::new();

    for row in rows {
        let ond = match row.get("ond") {
            Some(Value::String(ond)) => ond.as_str(),
            other => {
                counter!(MALFORMED_OND).increment(1);
                let shown = other.map(Value::to_string).unwrap_or_default();
                return Err(MalformedOnd(shown));
            }
        };

        let (origin, destination) = split_ond(ond).inspect_err(|_| {
            counter!(MALFORMED_OND).increment(1);
        })?;
        origins.insert(origin.to_string());
        destinations.insert(destination.to_string());
    }

    Ok(OndIndex {
        origins: origins.into_iter().collect(),
        destinations: destinations.into_iter().collect(),
    })
}
