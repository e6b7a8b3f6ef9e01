//! Concurrent batch processing over many hospitals.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::Pipeline;
use crate::models::{Hospital, SearchStatus};

/// Final tally of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
}

/// Process hospitals concurrently, bounded by `concurrency`.
///
/// Setting `cancel` stops new hospitals from starting; in-flight
/// attempts run to completion so no hospital is left in `searching`.
pub async fn batch_process(
    pipeline: Arc<Pipeline>,
    hospitals: Vec<Hospital>,
    concurrency: usize,
    progress: Option<ProgressBar>,
    cancel: Arc<AtomicBool>,
) -> BatchSummary {
    let total = hospitals.len();
    info!("Processing {} hospitals with concurrency {}", total, concurrency);

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let processed = Arc::new(AtomicUsize::new(0));
    let found = Arc::new(AtomicUsize::new(0));
    let not_found = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(total);

    for hospital in hospitals {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        let cancel = Arc::clone(&cancel);
        let progress = progress.clone();
        let processed = Arc::clone(&processed);
        let found = Arc::clone(&found);
        let not_found = Arc::clone(&not_found);
        let errors = Arc::clone(&errors);

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if cancel.load(Ordering::Relaxed) {
                return;
            }

            match pipeline.process(&hospital).await {
                Ok(SearchStatus::Found) => {
                    found.fetch_add(1, Ordering::Relaxed);
                }
                Ok(SearchStatus::Error) => {
                    errors.fetch_add(1, Ordering::Relaxed);
                }
                Ok(_) => {
                    not_found.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("Status store failed for {}: {}", hospital.id, e);
                    errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(bar) = &progress {
                bar.inc(1);
            }
            if done % 10 == 0 {
                info!(
                    "Progress: {}/{} processed, {} found",
                    done,
                    total,
                    found.load(Ordering::Relaxed)
                );
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.await;
    }

    let summary = BatchSummary {
        total,
        processed: processed.load(Ordering::Relaxed),
        found: found.load(Ordering::Relaxed),
        not_found: not_found.load(Ordering::Relaxed),
        errors: errors.load(Ordering::Relaxed),
    };

    info!(
        "Batch done: {}/{} processed, {} found, {} not found, {} errors",
        summary.processed, summary.total, summary.found, summary.not_found, summary.errors
    );

    summary
}
