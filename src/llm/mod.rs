//! Semantic judgment of candidate files.
//!
//! The matcher consults a `SemanticJudge` when deterministic evidence
//! is inconclusive. The judge is a trait seam; `OllamaJudge` (a local
//! Ollama instance) is the reference implementation.

mod ollama;

pub use ollama::OllamaJudge;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::Hospital;

/// Errors from a semantic judge.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("failed to parse judgment: {0}")]
    Parse(String),

    #[error("semantic judging is disabled")]
    Disabled,
}

/// A semantic verdict on whether a file sample belongs to a hospital.
#[derive(Debug, Clone, Deserialize)]
pub struct Judgment {
    pub valid: bool,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub explanation: String,
    #[serde(default)]
    pub contains_prices: bool,
    #[serde(default)]
    pub contains_hospital_name: bool,
}

/// Judges whether a file sample is a given hospital's price data.
#[async_trait]
pub trait SemanticJudge: Send + Sync {
    async fn judge(&self, sample: &str, hospital: &Hospital) -> Result<Judgment, JudgeError>;
}
