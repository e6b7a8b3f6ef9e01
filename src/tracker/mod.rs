//! Durable per-hospital status tracking.
//!
//! The tracker owns every status transition. Each transition is a short
//! atomic read-modify-write against SQLite and appends exactly one
//! search log entry. Store write failures are retried once on a fresh
//! connection before being surfaced.

mod stats;

pub use stats::{ExportEntry, Statistics};

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Hospital, PriceFile, SearchStatus};
use crate::repository::{
    DieselError, HospitalRepository, PriceFileRepository, SearchLogRepository, SearchLogRecord,
    SqlitePool,
};

/// Errors from the status store.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("unknown hospital: {0}")]
    UnknownHospital(String),
}

/// Current status of one hospital, with its latest file and recent log.
#[derive(Debug, Clone)]
pub struct HospitalStatus {
    pub hospital: Hospital,
    pub price_file: Option<PriceFile>,
    pub recent_logs: Vec<SearchLogRecord>,
}

/// Tracks the status of price transparency file searches.
#[derive(Clone)]
pub struct StatusTracker {
    hospitals: HospitalRepository,
    price_files: PriceFileRepository,
    logs: SearchLogRepository,
}

impl StatusTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            hospitals: HospitalRepository::new(pool.clone()),
            price_files: PriceFileRepository::new(pool.clone()),
            logs: SearchLogRepository::new(pool),
        }
    }

    /// Register a hospital for tracking. Existing rows keep their
    /// status and attempt history.
    pub async fn register(&self, hospital: &Hospital) -> Result<(), TrackerError> {
        if let Err(e) = self.hospitals.register(hospital).await {
            warn!("register failed for {}, retrying once: {}", hospital.id, e);
            self.hospitals.register(hospital).await?;
        }
        Ok(())
    }

    /// Register many hospitals, returning how many succeeded.
    pub async fn register_all(&self, hospitals: &[Hospital]) -> Result<usize, TrackerError> {
        let mut registered = 0;
        for hospital in hospitals {
            match self.register(hospital).await {
                Ok(()) => registered += 1,
                Err(e) => warn!("skipping hospital {}: {}", hospital.id, e),
            }
        }
        Ok(registered)
    }

    /// Enter `searching`. The attempt counter increments here and only
    /// here.
    pub async fn begin_attempt(&self, hospital_id: &str) -> Result<(), TrackerError> {
        if let Err(e) = self.hospitals.begin_attempt(hospital_id).await {
            warn!(
                "begin_attempt failed for {}, retrying once: {}",
                hospital_id, e
            );
            self.hospitals.begin_attempt(hospital_id).await?;
        }
        self.append_log(hospital_id, SearchStatus::Searching, "Search started")
            .await
    }

    /// Enter `found`, persisting the price file in the same transaction.
    pub async fn mark_success(&self, file: &PriceFile) -> Result<(), TrackerError> {
        debug!(
            "marking success for {} with file {}",
            file.hospital_id, file.url
        );
        if let Err(e) = self.price_files.record_found(file).await {
            warn!(
                "mark_success failed for {}, retrying once: {}",
                file.hospital_id, e
            );
            self.price_files.record_found(file).await?;
        }
        Ok(())
    }

    /// Enter `not_found`.
    pub async fn mark_failure(&self, hospital_id: &str, reason: &str) -> Result<(), TrackerError> {
        self.transition(
            hospital_id,
            SearchStatus::NotFound,
            &format!("Price file not found: {reason}"),
        )
        .await
    }

    /// Enter `error`.
    pub async fn mark_error(&self, hospital_id: &str, message: &str) -> Result<(), TrackerError> {
        self.transition(
            hospital_id,
            SearchStatus::Error,
            &format!("Error during search: {message}"),
        )
        .await
    }

    async fn transition(
        &self,
        hospital_id: &str,
        status: SearchStatus,
        message: &str,
    ) -> Result<(), TrackerError> {
        if let Err(e) = self.hospitals.set_status(hospital_id, status).await {
            warn!(
                "transition to {} failed for {}, retrying once: {}",
                status.as_str(),
                hospital_id,
                e
            );
            self.hospitals.set_status(hospital_id, status).await?;
        }
        self.append_log(hospital_id, status, message).await
    }

    async fn append_log(
        &self,
        hospital_id: &str,
        status: SearchStatus,
        message: &str,
    ) -> Result<(), TrackerError> {
        if let Err(e) = self.logs.append(hospital_id, status, message).await {
            warn!("log append failed for {}, retrying once: {}", hospital_id, e);
            self.logs.append(hospital_id, status, message).await?;
        }
        Ok(())
    }

    /// Hospitals eligible for (re)processing, fewest attempts and
    /// stalest first, never-attempted ahead of everything.
    pub async fn eligible(
        &self,
        states: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<Hospital>, TrackerError> {
        Ok(self.hospitals.eligible(states, limit).await?)
    }

    /// Current status of one hospital with its latest file and logs.
    pub async fn status(&self, hospital_id: &str) -> Result<HospitalStatus, TrackerError> {
        let hospital = self
            .hospitals
            .get(hospital_id)
            .await?
            .ok_or_else(|| TrackerError::UnknownHospital(hospital_id.to_string()))?;
        let price_file = self.price_files.latest_for_hospital(hospital_id).await?;
        let recent_logs = self.logs.for_hospital(hospital_id, 5).await?;

        Ok(HospitalStatus {
            hospital,
            price_file,
            recent_logs,
        })
    }

    /// Aggregate statistics across the whole store.
    pub async fn statistics(&self) -> Result<Statistics, TrackerError> {
        let total_hospitals = self.hospitals.count().await?;
        let status_counts: BTreeMap<String, i64> =
            self.hospitals.count_by_status().await?.into_iter().collect();
        let state_counts: BTreeMap<String, i64> =
            self.hospitals.count_by_state().await?.into_iter().collect();
        let (total_price_files, validated_price_files) = self.price_files.counts().await?;
        let hospitals_with_file = self.price_files.hospitals_with_file().await?;
        let recent_activity = self.logs.recent_activity(10).await?;

        Ok(Statistics {
            total_hospitals,
            status_counts,
            state_counts,
            total_price_files,
            validated_price_files,
            hospitals_with_file,
            found_percentage: if total_hospitals > 0 {
                hospitals_with_file as f64 / total_hospitals as f64 * 100.0
            } else {
                0.0
            },
            recent_activity,
        })
    }

    /// Current best validated file per hospital, grouped by state code.
    pub async fn export(&self) -> Result<BTreeMap<String, Vec<ExportEntry>>, TrackerError> {
        let hospitals = self.hospitals.get_all().await?;
        let files = self.price_files.latest_validated().await?;

        let by_hospital: BTreeMap<&str, &PriceFile> = files
            .iter()
            .map(|f| (f.hospital_id.as_str(), f))
            .collect();

        let mut out: BTreeMap<String, Vec<ExportEntry>> = BTreeMap::new();
        for hospital in &hospitals {
            let entry = ExportEntry::new(hospital, by_hospital.get(hospital.id.as_str()).copied());
            out.entry(hospital.state.clone()).or_default().push(entry);
        }
        Ok(out)
    }
}
