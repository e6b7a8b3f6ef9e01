//! Command implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use super::{Cli, Commands};
use crate::config::Settings;
use crate::crawler::HttpFetcher;
use crate::llm::OllamaJudge;
use crate::matcher::HospitalMatcher;
use crate::models::Hospital;
use crate::pipeline::{batch_process, Pipeline};
use crate::repository::{initialize_schema, SqlitePool};
use crate::search::build_provider;
use crate::tracker::StatusTracker;
use crate::validator::FileValidator;

const DEFAULT_DB: &str = "pricescout.db";

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    let db_path = cli
        .db
        .clone()
        .or_else(|| settings.database_url.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

    let pool = SqlitePool::from_path(&db_path);
    initialize_schema(&pool)
        .await
        .context("initializing database schema")?;
    let tracker = StatusTracker::new(pool);

    match cli.command {
        Commands::Search {
            limit,
            states,
            concurrency,
        } => search(settings, tracker, limit, states, concurrency).await,
        Commands::Load { file } => load(tracker, &file).await,
        Commands::Status { hospital_id } => status(tracker, &hospital_id).await,
        Commands::Export { output } => export(tracker, output.as_deref()).await,
        Commands::Stats { save } => stats(tracker, save.as_deref()).await,
    }
}

async fn search(
    settings: Settings,
    tracker: StatusTracker,
    limit: usize,
    states: Vec<String>,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let provider = build_provider(&settings.search).context("configuring search provider")?;
    let fetcher = Arc::new(
        HttpFetcher::new(settings.crawler.clone()).context("building HTTP fetcher")?,
    );
    let validator = FileValidator::new(settings.validator.clone());
    let matcher = HospitalMatcher::new(settings.matcher.clone());

    let judge: Option<Arc<dyn crate::llm::SemanticJudge>> = if settings.llm.enabled {
        let judge = OllamaJudge::new(settings.llm.clone()).context("building semantic judge")?;
        if judge.is_available().await {
            Some(Arc::new(judge))
        } else {
            warn!("Ollama is not reachable; proceeding without semantic matching");
            None
        }
    } else {
        None
    };

    let states_filter = if states.is_empty() {
        None
    } else {
        Some(
            states
                .iter()
                .map(|s| s.to_uppercase())
                .collect::<Vec<String>>(),
        )
    };
    let query_limit = if limit == 0 { i64::MAX } else { limit as i64 };
    let hospitals = tracker
        .eligible(states_filter.as_deref(), query_limit)
        .await?;

    if hospitals.is_empty() {
        println!("No eligible hospitals. Load some with `pricescout load <file>`.");
        return Ok(());
    }

    let concurrency = concurrency.unwrap_or(settings.pipeline.concurrency);
    let pipeline = Arc::new(Pipeline::new(
        provider,
        fetcher,
        validator,
        matcher,
        judge,
        tracker,
        settings.pipeline.clone(),
    ));

    // Ctrl-C stops new hospitals; in-flight attempts finish cleanly.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Cancellation requested; finishing in-flight hospitals");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let bar = ProgressBar::new(hospitals.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("searching");
    bar.enable_steady_tick(std::time::Duration::from_millis(200));

    let summary = batch_process(pipeline, hospitals, concurrency, Some(bar.clone()), cancel).await;
    bar.finish_and_clear();

    println!(
        "Processed {}/{} hospitals: {} found, {} not found, {} errors",
        summary.processed, summary.total, summary.found, summary.not_found, summary.errors
    );
    Ok(())
}

/// Hospital entry as it appears in load files.
#[derive(Debug, Deserialize)]
struct HospitalEntry {
    id: Option<String>,
    name: String,
    state: Option<String>,
    city: Option<String>,
    address: Option<String>,
    website: Option<String>,
    health_system_name: Option<String>,
}

/// Load files come in two shapes: a map of state code to entries, or a
/// flat array of entries carrying their own state.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoadFile {
    ByState(HashMap<String, Vec<HospitalEntry>>),
    Flat(Vec<HospitalEntry>),
}

async fn load(tracker: StatusTracker, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let parsed: LoadFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))?;

    let mut hospitals = Vec::new();
    match parsed {
        LoadFile::ByState(by_state) => {
            for (state, entries) in by_state {
                for entry in entries {
                    hospitals.push(to_hospital(entry, Some(&state))?);
                }
            }
        }
        LoadFile::Flat(entries) => {
            for entry in entries {
                hospitals.push(to_hospital(entry, None)?);
            }
        }
    }

    let registered = tracker.register_all(&hospitals).await?;
    println!("Registered {} of {} hospitals", registered, hospitals.len());
    Ok(())
}

fn to_hospital(entry: HospitalEntry, state_key: Option<&str>) -> anyhow::Result<Hospital> {
    let state = entry
        .state
        .as_deref()
        .or(state_key)
        .with_context(|| format!("hospital '{}' has no state", entry.name))?
        .to_uppercase();

    let id = entry
        .id
        .unwrap_or_else(|| slug(&format!("{} {}", entry.name, state)));

    let mut hospital = Hospital::new(id, entry.name, state);
    hospital.city = entry.city;
    hospital.address = entry.address;
    hospital.website = entry.website;
    hospital.health_system_name = entry.health_system_name;
    Ok(hospital)
}

fn slug(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

async fn status(tracker: StatusTracker, hospital_id: &str) -> anyhow::Result<()> {
    let status = tracker.status(hospital_id).await?;

    let hospital = &status.hospital;
    println!("{} ({})", hospital.name, hospital.id);
    println!(
        "  location: {}{}",
        hospital.city.as_deref().map(|c| format!("{c}, ")).unwrap_or_default(),
        hospital.state
    );
    println!("  status: {} ({} attempts)", hospital.status.as_str(), hospital.attempts);

    match &status.price_file {
        Some(file) => {
            println!(
                "  price file: {} ({}, score {:.2})",
                file.url, file.file_type, file.validation_score
            );
        }
        None => println!("  price file: none"),
    }

    if !status.recent_logs.is_empty() {
        println!("  recent activity:");
        for log in &status.recent_logs {
            println!("    {} [{}] {}", log.at, log.status, log.message);
        }
    }
    Ok(())
}

async fn export(tracker: StatusTracker, output: Option<&Path>) -> anyhow::Result<()> {
    let export = tracker.export().await?;
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Exported {} states to {}", export.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn stats(tracker: StatusTracker, save: Option<&Path>) -> anyhow::Result<()> {
    let statistics = tracker.statistics().await?;

    println!("Hospitals: {}", statistics.total_hospitals);
    for (status, count) in &statistics.status_counts {
        println!("  {status}: {count}");
    }
    println!(
        "Price files: {} total, {} validated",
        statistics.total_price_files, statistics.validated_price_files
    );
    println!(
        "Hospitals with a validated file: {} ({:.1}%)",
        statistics.hospitals_with_file, statistics.found_percentage
    );

    if !statistics.state_counts.is_empty() {
        println!("By state:");
        for (state, count) in &statistics.state_counts {
            println!("  {state}: {count}");
        }
    }

    if !statistics.recent_activity.is_empty() {
        println!("Recent activity:");
        for entry in &statistics.recent_activity {
            println!(
                "  {} [{}] {}: {}",
                entry.at, entry.status, entry.hospital_name, entry.message
            );
        }
    }

    if let Some(path) = save {
        let json = serde_json::to_string_pretty(&statistics)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Saved statistics to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_generation() {
        assert_eq!(slug("Mercy Hospital MO"), "mercy-hospital-mo");
        assert_eq!(slug("St. Luke's (East) TX"), "st-luke-s-east-tx");
    }

    #[test]
    fn load_file_shapes_parse() {
        let by_state: LoadFile = serde_json::from_str(
            r#"{"MO": [{"name": "Mercy Hospital", "city": "Springfield"}]}"#,
        )
        .unwrap();
        assert!(matches!(by_state, LoadFile::ByState(_)));

        let flat: LoadFile = serde_json::from_str(
            r#"[{"name": "Mercy Hospital", "state": "MO"}]"#,
        )
        .unwrap();
        assert!(matches!(flat, LoadFile::Flat(_)));
    }

    #[test]
    fn entry_state_resolution() {
        let entry = HospitalEntry {
            id: None,
            name: "Mercy Hospital".to_string(),
            state: None,
            city: None,
            address: None,
            website: None,
            health_system_name: None,
        };
        let hospital = to_hospital(entry, Some("mo")).unwrap();
        assert_eq!(hospital.state, "MO");
        assert_eq!(hospital.id, "mercy-hospital-mo");

        let stateless = HospitalEntry {
            id: None,
            name: "Orphan Clinic".to_string(),
            state: None,
            city: None,
            address: None,
            website: None,
            health_system_name: None,
        };
        assert!(to_hospital(stateless, None).is_err());
    }
}
