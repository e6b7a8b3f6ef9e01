//! Price file repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::pool::{DieselError, SqlitePool};
use super::records::PriceFileRecord;
use crate::models::{PriceFile, SearchStatus};
use crate::schema::{hospitals, price_files, search_logs};

/// Diesel-based price file repository.
#[derive(Clone)]
pub struct PriceFileRepository {
    pool: SqlitePool,
}

impl PriceFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a confirmed price file: move the hospital to `found`,
    /// insert the file row and append the audit log entry, all in one
    /// transaction so `found` never exists without its file.
    pub async fn record_found(&self, file: &PriceFile) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let file = file.clone();
        let now = Utc::now().to_rfc3339();

        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::update(hospitals::table.find(&file.hospital_id))
                    .set((
                        hospitals::status.eq(SearchStatus::Found.as_str()),
                        hospitals::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;

                diesel::insert_into(price_files::table)
                    .values((
                        price_files::hospital_id.eq(&file.hospital_id),
                        price_files::url.eq(&file.url),
                        price_files::file_type.eq(&file.file_type),
                        price_files::validated.eq(file.validated as i32),
                        price_files::validation_score.eq(file.validation_score),
                        price_files::validation_notes.eq(&file.validation_notes),
                        price_files::file_size.eq(file.file_size),
                        price_files::contains_prices.eq(file.contains_prices as i32),
                        price_files::contains_hospital_name.eq(file.contains_hospital_name as i32),
                        price_files::found_at.eq(file.found_at.to_rfc3339()),
                    ))
                    .execute(conn)
                    .await?;

                diesel::insert_into(search_logs::table)
                    .values((
                        search_logs::hospital_id.eq(&file.hospital_id),
                        search_logs::status.eq(SearchStatus::Found.as_str()),
                        search_logs::message.eq(format!("Found price file: {}", file.url)),
                        search_logs::at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;

                Ok(())
            })
        })
        .await
    }

    /// Latest price file for a hospital, if any.
    pub async fn latest_for_hospital(
        &self,
        hospital_id: &str,
    ) -> Result<Option<PriceFile>, DieselError> {
        let mut conn = self.pool.get().await?;

        price_files::table
            .filter(price_files::hospital_id.eq(hospital_id))
            .order(price_files::found_at.desc())
            .first::<PriceFileRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(PriceFile::from))
    }

    /// The current best (latest validated) file per hospital.
    pub async fn latest_validated(&self) -> Result<Vec<PriceFile>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<PriceFileRecord> = price_files::table
            .filter(price_files::validated.eq(1))
            .order((price_files::hospital_id.asc(), price_files::found_at.desc()))
            .load(&mut conn)
            .await?;

        // Rows arrive newest-first within each hospital; keep the first.
        let mut out: Vec<PriceFile> = Vec::new();
        for record in records {
            if out.last().map(|f| f.hospital_id.as_str()) != Some(record.hospital_id.as_str()) {
                out.push(PriceFile::from(record));
            }
        }
        Ok(out)
    }

    /// Total and validated price file counts.
    pub async fn counts(&self) -> Result<(i64, i64), DieselError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        let total: i64 = price_files::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        let validated: i64 = price_files::table
            .filter(price_files::validated.eq(1))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok((total, validated))
    }

    /// Count of distinct hospitals with at least one validated file.
    pub async fn hospitals_with_file(&self) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        price_files::table
            .filter(price_files::validated.eq(1))
            .select(diesel::dsl::count_distinct(price_files::hospital_id))
            .first(&mut conn)
            .await
    }

    /// All price files for a hospital, newest first.
    pub async fn for_hospital(&self, hospital_id: &str) -> Result<Vec<PriceFile>, DieselError> {
        let mut conn = self.pool.get().await?;

        price_files::table
            .filter(price_files::hospital_id.eq(hospital_id))
            .order(price_files::found_at.desc())
            .load::<PriceFileRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(PriceFile::from).collect())
    }
}
