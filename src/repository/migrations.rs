//! Schema bootstrap.
//!
//! The schema is small and fixed, so initialization is a batch of
//! idempotent CREATE statements rather than a migration registry.

use diesel_async::RunQueryDsl;

use super::pool::{DieselError, SqlitePool};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS hospitals (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    state TEXT NOT NULL,
    city TEXT,
    address TEXT,
    website TEXT,
    health_system_name TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TEXT,
    updated_at TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS price_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    hospital_id TEXT NOT NULL REFERENCES hospitals(id),
    url TEXT NOT NULL,
    file_type TEXT NOT NULL,
    validated INTEGER NOT NULL DEFAULT 0,
    validation_score REAL NOT NULL DEFAULT 0,
    validation_notes TEXT,
    file_size INTEGER,
    contains_prices INTEGER NOT NULL DEFAULT 0,
    contains_hospital_name INTEGER NOT NULL DEFAULT 0,
    found_at TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS search_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    hospital_id TEXT NOT NULL REFERENCES hospitals(id),
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_hospitals_status ON hospitals(status)",
    "CREATE INDEX IF NOT EXISTS idx_hospitals_state ON hospitals(state)",
    "CREATE INDEX IF NOT EXISTS idx_price_files_hospital ON price_files(hospital_id)",
    "CREATE INDEX IF NOT EXISTS idx_search_logs_hospital ON search_logs(hospital_id)",
];

/// Create tables and indexes if they do not exist yet.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), DieselError> {
    let mut conn = pool.get().await?;
    for statement in SCHEMA {
        diesel::sql_query(*statement).execute(&mut conn).await?;
    }
    Ok(())
}
