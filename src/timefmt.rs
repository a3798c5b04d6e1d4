//! timefmt.rs
//! Canonical timestamp text for SQLite storage. The format is fixed-width
//! UTC (`2026-08-26T09:00:00.000000Z`) so string comparison inside SQL
//! matches chronological order.

use chrono::{DateTime, Utc};

const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.format(DB_FORMAT).to_string()
}

pub fn from_db(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Calendar date (UTC) used for the sender daily-reset bookkeeping.
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
