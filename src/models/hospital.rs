//! Hospital model and search status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search status of a hospital's price transparency discovery.
///
/// Transitions: `pending -> searching -> {found | not_found | error}`.
/// `not_found` and `error` may re-enter `searching` on a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Pending,
    Searching,
    Found,
    NotFound,
    Error,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "searching" => Some(Self::Searching),
            "found" => Some(Self::Found),
            "not_found" => Some(Self::NotFound),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether a hospital in this status is eligible for (re)processing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::NotFound | Self::Error)
    }

    /// Whether this is a terminal status for one attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Found | Self::NotFound | Self::Error)
    }
}

/// A hospital whose price transparency file we want to locate.
///
/// Identity comes from the master dataset; `id` is immutable once
/// assigned. Name and state are required to build search queries,
/// everything else is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    /// Stable identifier from the master dataset.
    pub id: String,
    /// Hospital name.
    pub name: String,
    /// Two-letter state code.
    pub state: String,
    /// City, when known.
    pub city: Option<String>,
    /// Street address, when known.
    pub address: Option<String>,
    /// Known website, when known.
    pub website: Option<String>,
    /// Parent health system name, when the hospital belongs to one.
    pub health_system_name: Option<String>,

    /// Current search status.
    pub status: SearchStatus,
    /// Number of times a search attempt was started.
    pub attempts: i32,
    /// When the last attempt was started (None = never attempted).
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl Hospital {
    /// Create a hospital with required fields only, in `pending` status.
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: state.into(),
            city: None,
            address: None,
            website: None,
            health_system_name: None,
            status: SearchStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_health_system(mut self, system: impl Into<String>) -> Self {
        self.health_system_name = Some(system.into());
        self
    }

    /// Base text for search queries: name plus location.
    pub fn search_query_base(&self) -> String {
        match &self.city {
            Some(city) => format!("{} {}, {}", self.name, city, self.state),
            None => format!("{} {}", self.name, self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            SearchStatus::Pending,
            SearchStatus::Searching,
            SearchStatus::Found,
            SearchStatus::NotFound,
            SearchStatus::Error,
        ] {
            assert_eq!(SearchStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(SearchStatus::from_str("bogus"), None);
    }

    #[test]
    fn retryable_statuses() {
        assert!(SearchStatus::Pending.is_retryable());
        assert!(SearchStatus::NotFound.is_retryable());
        assert!(SearchStatus::Error.is_retryable());
        assert!(!SearchStatus::Searching.is_retryable());
        assert!(!SearchStatus::Found.is_retryable());
    }

    #[test]
    fn query_base_includes_location() {
        let hospital = Hospital::new("h1", "Example General Hospital", "IL").with_city("Springfield");
        assert_eq!(
            hospital.search_query_base(),
            "Example General Hospital Springfield, IL"
        );

        let no_city = Hospital::new("h2", "Rural Clinic", "MT");
        assert_eq!(no_city.search_query_base(), "Rural Clinic MT");
    }
}
