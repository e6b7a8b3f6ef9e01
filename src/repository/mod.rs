//! Repository layer for the status store.
//!
//! All database access uses Diesel with diesel-async's
//! `SyncConnectionWrapper` over SQLite.

mod hospital;
mod migrations;
mod pool;
mod price_file;
mod records;
mod search_log;

pub use hospital::HospitalRepository;
pub use migrations::initialize_schema;
pub use pool::{DieselError, SqlitePool};
pub use price_file::PriceFileRepository;
pub use records::{HospitalRecord, NewSearchLog, PriceFileRecord, SearchLogRecord};
pub use search_log::{ActivityEntry, SearchLogRepository};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn bad_datetime_falls_back_to_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(Some("not a date".into())), None);
        assert_eq!(parse_datetime_opt(None), None);
    }
}
