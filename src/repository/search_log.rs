//! Search log repository (append-only audit trail).

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DieselError, SqlitePool};
use super::records::{NewSearchLog, SearchLogRecord};
use crate::models::SearchStatus;
use crate::schema::{hospitals, search_logs};

/// One entry of the recent-activity feed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActivityEntry {
    pub hospital_name: String,
    pub state: String,
    pub status: String,
    pub message: String,
    pub at: String,
}

/// Diesel-based search log repository. Entries are only ever appended.
#[derive(Clone)]
pub struct SearchLogRepository {
    pool: SqlitePool,
}

impl SearchLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one log entry for a status transition.
    pub async fn append(
        &self,
        hospital_id: &str,
        status: SearchStatus,
        message: &str,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::insert_into(search_logs::table)
            .values(&NewSearchLog {
                hospital_id,
                status: status.as_str(),
                message,
                at: &now,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Recent entries for one hospital, newest first.
    pub async fn for_hospital(
        &self,
        hospital_id: &str,
        limit: i64,
    ) -> Result<Vec<SearchLogRecord>, DieselError> {
        let mut conn = self.pool.get().await?;

        search_logs::table
            .filter(search_logs::hospital_id.eq(hospital_id))
            .order(search_logs::at.desc())
            .limit(limit)
            .load::<SearchLogRecord>(&mut conn)
            .await
    }

    /// Recent activity across all hospitals, joined with identity.
    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(String, String, String, String, String)> = search_logs::table
            .inner_join(hospitals::table)
            .select((
                hospitals::name,
                hospitals::state,
                search_logs::status,
                search_logs::message,
                search_logs::at,
            ))
            .order(search_logs::at.desc())
            .limit(limit)
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(hospital_name, state, status, message, at)| ActivityEntry {
                hospital_name,
                state,
                status,
                message,
                at,
            })
            .collect())
    }

    /// Number of log entries for a hospital.
    pub async fn count_for_hospital(&self, hospital_id: &str) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        search_logs::table
            .filter(search_logs::hospital_id.eq(hospital_id))
            .select(count_star())
            .first(&mut conn)
            .await
    }
}
