//! Repository layer: entity-scoped database operations.

mod health_profile;
mod prescription;

pub use health_profile::*;
pub use prescription::*;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn timestamp_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn timestamp_from_sql(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {value}: {e}")))
}
