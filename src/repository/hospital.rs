//! Hospital repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DieselError, SqlitePool};
use super::records::HospitalRecord;
use crate::models::{Hospital, SearchStatus};
use crate::schema::hospitals;

/// Diesel-based hospital repository.
#[derive(Clone)]
pub struct HospitalRepository {
    pool: SqlitePool,
}

impl HospitalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a hospital by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Hospital>, DieselError> {
        let mut conn = self.pool.get().await?;

        hospitals::table
            .find(id)
            .first::<HospitalRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Hospital::from))
    }

    /// Register a hospital. Identity fields are refreshed for existing
    /// rows; status, attempts and timestamps are preserved so that
    /// re-registering never resets search history.
    pub async fn register(&self, hospital: &Hospital) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        let exists: i64 = hospitals::table
            .filter(hospitals::id.eq(&hospital.id))
            .count()
            .first(&mut conn)
            .await?;

        if exists > 0 {
            diesel::update(hospitals::table.find(&hospital.id))
                .set((
                    hospitals::name.eq(&hospital.name),
                    hospitals::state.eq(&hospital.state),
                    hospitals::city.eq(&hospital.city),
                    hospitals::address.eq(&hospital.address),
                    hospitals::website.eq(&hospital.website),
                    hospitals::health_system_name.eq(&hospital.health_system_name),
                    hospitals::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
        } else {
            diesel::insert_into(hospitals::table)
                .values((
                    hospitals::id.eq(&hospital.id),
                    hospitals::name.eq(&hospital.name),
                    hospitals::state.eq(&hospital.state),
                    hospitals::city.eq(&hospital.city),
                    hospitals::address.eq(&hospital.address),
                    hospitals::website.eq(&hospital.website),
                    hospitals::health_system_name.eq(&hospital.health_system_name),
                    hospitals::status.eq(SearchStatus::Pending.as_str()),
                    hospitals::attempts.eq(0),
                    hospitals::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
        }

        Ok(())
    }

    /// Move a hospital into `searching` and bump its attempt counter.
    /// This is the only place the counter changes.
    pub async fn begin_attempt(&self, id: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::update(hospitals::table.find(id))
            .set((
                hospitals::status.eq(SearchStatus::Searching.as_str()),
                hospitals::attempts.eq(hospitals::attempts + 1),
                hospitals::last_attempt_at.eq(&now),
                hospitals::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Set a terminal status without touching the attempt counter.
    pub async fn set_status(&self, id: &str, status: SearchStatus) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        diesel::update(hospitals::table.find(id))
            .set((
                hospitals::status.eq(status.as_str()),
                hospitals::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Hospitals eligible for (re)processing: pending, not_found or error,
    /// fewest attempts first, then stalest. SQLite sorts NULLs first on
    /// ascending order, which puts never-attempted hospitals ahead.
    pub async fn eligible(
        &self,
        states: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<Hospital>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = hospitals::table
            .filter(hospitals::status.eq_any([
                SearchStatus::Pending.as_str(),
                SearchStatus::NotFound.as_str(),
                SearchStatus::Error.as_str(),
            ]))
            .order((hospitals::attempts.asc(), hospitals::last_attempt_at.asc()))
            .limit(limit)
            .into_boxed();

        if let Some(states) = states {
            query = query.filter(hospitals::state.eq_any(states));
        }

        query
            .load::<HospitalRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Hospital::from).collect())
    }

    /// All hospitals, ordered by state then name.
    pub async fn get_all(&self) -> Result<Vec<Hospital>, DieselError> {
        let mut conn = self.pool.get().await?;

        hospitals::table
            .order((hospitals::state.asc(), hospitals::name.asc()))
            .load::<HospitalRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Hospital::from).collect())
    }

    /// Count of hospitals grouped by status.
    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        hospitals::table
            .group_by(hospitals::status)
            .select((hospitals::status, count_star()))
            .load::<(String, i64)>(&mut conn)
            .await
    }

    /// Count of hospitals grouped by state.
    pub async fn count_by_state(&self) -> Result<Vec<(String, i64)>, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        hospitals::table
            .group_by(hospitals::state)
            .select((hospitals::state, count_star()))
            .load::<(String, i64)>(&mut conn)
            .await
    }

    /// Total hospital count.
    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        hospitals::table.select(count_star()).first(&mut conn).await
    }
}
