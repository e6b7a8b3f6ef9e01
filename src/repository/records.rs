//! Diesel ORM models for the status store tables.
//!
//! These models provide compile-time type checking for database
//! operations; conversions to domain types live next to the records.

use diesel::prelude::*;

use super::{parse_datetime, parse_datetime_opt};
use crate::models::{Hospital, PriceFile, SearchStatus};
use crate::schema;

/// Hospital record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::hospitals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HospitalRecord {
    pub id: String,
    pub name: String,
    pub state: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub health_system_name: Option<String>,
    pub status: String,
    pub attempts: i32,
    pub last_attempt_at: Option<String>,
    pub updated_at: String,
}

impl From<HospitalRecord> for Hospital {
    fn from(record: HospitalRecord) -> Self {
        Hospital {
            id: record.id,
            name: record.name,
            state: record.state,
            city: record.city,
            address: record.address,
            website: record.website,
            health_system_name: record.health_system_name,
            status: SearchStatus::from_str(&record.status).unwrap_or(SearchStatus::Pending),
            attempts: record.attempts,
            last_attempt_at: parse_datetime_opt(record.last_attempt_at),
        }
    }
}

/// Price file record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::price_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceFileRecord {
    pub id: i64,
    pub hospital_id: String,
    pub url: String,
    pub file_type: String,
    pub validated: i32,
    pub validation_score: f32,
    pub validation_notes: Option<String>,
    pub file_size: Option<i64>,
    pub contains_prices: i32,
    pub contains_hospital_name: i32,
    pub found_at: String,
}

impl From<PriceFileRecord> for PriceFile {
    fn from(record: PriceFileRecord) -> Self {
        PriceFile {
            id: record.id,
            hospital_id: record.hospital_id,
            url: record.url,
            file_type: record.file_type,
            validated: record.validated != 0,
            validation_score: record.validation_score,
            validation_notes: record.validation_notes,
            file_size: record.file_size,
            contains_prices: record.contains_prices != 0,
            contains_hospital_name: record.contains_hospital_name != 0,
            found_at: parse_datetime(&record.found_at),
        }
    }
}

/// Search log record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::search_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SearchLogRecord {
    pub id: i64,
    pub hospital_id: String,
    pub status: String,
    pub message: String,
    pub at: String,
}

/// New search log entry for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::search_logs)]
pub struct NewSearchLog<'a> {
    pub hospital_id: &'a str,
    pub status: &'a str,
    pub message: &'a str,
    pub at: &'a str,
}
