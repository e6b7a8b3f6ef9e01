//! Aggregate statistics and export shapes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Hospital, PriceFile};
use crate::repository::ActivityEntry;

/// Aggregate progress across the whole status store.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_hospitals: i64,
    pub status_counts: BTreeMap<String, i64>,
    pub state_counts: BTreeMap<String, i64>,
    pub total_price_files: i64,
    pub validated_price_files: i64,
    pub hospitals_with_file: i64,
    pub found_percentage: f64,
    pub recent_activity: Vec<ActivityEntry>,
}

/// One hospital's row in the per-state export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportEntry {
    pub hospital_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_system_name: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_at: Option<String>,
}

impl ExportEntry {
    pub fn new(hospital: &Hospital, file: Option<&PriceFile>) -> Self {
        Self {
            hospital_id: hospital.id.clone(),
            name: hospital.name.clone(),
            city: hospital.city.clone(),
            health_system_name: hospital.health_system_name.clone(),
            status: hospital.status.as_str().to_string(),
            price_file_url: file.map(|f| f.url.clone()),
            file_type: file.map(|f| f.file_type.clone()),
            validation_score: file.map(|f| f.validation_score),
            found_at: file.map(|f| f.found_at.to_rfc3339()),
        }
    }
}
