//! Hospital identity matching.
//!
//! Two tiers: a deterministic tier over name variants and location
//! evidence, and a semantic tier consulted only when the deterministic
//! verdict is not decisive. No hospital-system names are special-cased;
//! every relaxation is a generic config threshold.

pub mod variants;

pub use variants::token_overlap;

use tracing::{debug, warn};

use crate::config::MatcherConfig;
use crate::llm::SemanticJudge;
use crate::models::Hospital;

/// Vocabulary that marks a document as a disclosure even when it never
/// names the hospital.
const DISCLOSURE_VOCAB: &[&str] = &[
    "standard charges",
    "price transparency",
    "chargemaster",
    "gross charge",
    "cash price",
];

/// Verdict on whether a file belongs to a hospital.
#[derive(Debug, Clone)]
pub struct MatchVerdict {
    pub is_match: bool,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub reasoning: String,
}

/// Two-tier identity matcher.
pub struct HospitalMatcher {
    config: MatcherConfig,
}

impl HospitalMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Deterministic tier: name variants, location and disclosure
    /// vocabulary evidence.
    pub fn deterministic(&self, sample: &str, hospital: &Hospital) -> MatchVerdict {
        let text = sample.to_lowercase();

        let exact_name = text.contains(&hospital.name.to_lowercase());
        let name_variant = variants::name_variants(
            &hospital.name,
            hospital.city.as_deref(),
            &hospital.state,
        )
        .iter()
        .any(|v| variants::variant_in_text(&text, v, self.config.similarity_threshold));

        let system_found = hospital
            .health_system_name
            .as_deref()
            .map(|system| {
                variants::name_variants(system, hospital.city.as_deref(), &hospital.state)
                    .iter()
                    .any(|v| variants::variant_in_text(&text, v, self.config.similarity_threshold))
            })
            .unwrap_or(false);

        let city_found = hospital
            .city
            .as_deref()
            .map(|city| text.contains(&city.to_lowercase()))
            .unwrap_or(false);
        let state_found = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token.eq_ignore_ascii_case(&hospital.state));
        let disclosure_found = DISCLOSURE_VOCAB.iter().any(|v| text.contains(v));

        let (confidence, reasoning) = if exact_name || name_variant {
            let base: f32 = if exact_name { 0.95 } else { 0.8 };
            let mut confidence = base;
            if city_found {
                confidence += 0.1;
            }
            if state_found {
                confidence += 0.05;
            }
            let confidence = confidence.min(0.95);
            let kind = if exact_name { "exact name" } else { "name variant" };
            (
                confidence,
                format!("{kind} found (city: {city_found}, state: {state_found})"),
            )
        } else if system_found {
            let confidence = if city_found || state_found { 0.8 } else { 0.75 };
            (
                confidence,
                format!("health system name found (city: {city_found}, state: {state_found})"),
            )
        } else if (city_found || state_found) && disclosure_found {
            (
                0.7,
                "location and disclosure vocabulary found, hospital not named".to_string(),
            )
        } else if city_found || state_found {
            (0.5, "only location evidence found".to_string())
        } else {
            (0.1, "no identity evidence in sample".to_string())
        };

        // Location alone sits exactly at 0.5 and is not enough to call
        // a match.
        MatchVerdict {
            is_match: confidence > 0.5,
            confidence,
            reasoning,
        }
    }

    /// Full validation: deterministic tier first, semantic tier when
    /// the verdict is not decisive.
    pub async fn validate(
        &self,
        sample: &str,
        hospital: &Hospital,
        judge: Option<&dyn SemanticJudge>,
    ) -> MatchVerdict {
        let deterministic = self.deterministic(sample, hospital);
        debug!(
            "Deterministic match for {}: {} ({:.2})",
            hospital.name, deterministic.is_match, deterministic.confidence
        );

        if deterministic.confidence > self.config.semantic_review_threshold {
            return deterministic;
        }
        let Some(judge) = judge else {
            return deterministic;
        };

        let judgment = match judge.judge(sample, hospital).await {
            Ok(judgment) => judgment,
            Err(e) => {
                warn!("Semantic judge failed for {}: {}", hospital.name, e);
                return MatchVerdict {
                    reasoning: format!("{} (semantic judge unavailable)", deterministic.reasoning),
                    ..deterministic
                };
            }
        };

        if judgment.valid == deterministic.is_match {
            // Agreement: report the stronger confidence with the
            // judge's explanation, which is usually more specific.
            return MatchVerdict {
                is_match: deterministic.is_match,
                confidence: deterministic.confidence.max(judgment.confidence),
                reasoning: judgment.explanation,
            };
        }

        if judgment.confidence > self.config.override_threshold {
            debug!(
                "Semantic verdict overrides deterministic for {} ({:.2} > {:.2})",
                hospital.name, judgment.confidence, self.config.override_threshold
            );
            return MatchVerdict {
                is_match: judgment.valid,
                confidence: judgment.confidence,
                reasoning: judgment.explanation,
            };
        }

        MatchVerdict {
            reasoning: format!("{} (LLM uncertain)", deterministic.reasoning),
            ..deterministic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{JudgeError, Judgment};
    use async_trait::async_trait;

    fn matcher() -> HospitalMatcher {
        HospitalMatcher::new(MatcherConfig::default())
    }

    fn hospital() -> Hospital {
        Hospital::new("h1", "Mercy Hospital", "MO").with_city("Springfield")
    }

    struct FixedJudge(Result<Judgment, ()>);

    #[async_trait]
    impl SemanticJudge for FixedJudge {
        async fn judge(&self, _: &str, _: &Hospital) -> Result<Judgment, JudgeError> {
            self.0
                .clone()
                .map_err(|_| JudgeError::Connection("down".to_string()))
        }
    }

    #[test]
    fn exact_name_with_location_scores_high() {
        let verdict = matcher().deterministic(
            "Standard charges for Mercy Hospital, Springfield MO, effective 2024",
            &hospital(),
        );
        assert!(verdict.is_match);
        assert!(verdict.confidence >= 0.9);
    }

    #[test]
    fn location_with_disclosure_vocab_is_tentative() {
        let verdict = matcher().deterministic(
            "price transparency machine readable file springfield campus",
            &hospital(),
        );
        assert!(verdict.is_match);
        assert!((verdict.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn city_mention_alone_is_not_a_match() {
        let verdict = matcher().deterministic(
            "welcome to springfield community events calendar",
            &hospital(),
        );
        assert!(!verdict.is_match);
        assert!(verdict.confidence <= 0.5);
    }

    #[test]
    fn same_city_different_facility_is_not_a_name_match() {
        let verdict = matcher().deterministic(
            "standard charges springfield orthopedic clinic llc",
            &hospital(),
        );
        assert!(verdict.confidence <= 0.7);
        assert!(verdict.reasoning.contains("hospital not named"));
    }

    #[test]
    fn unrelated_text_scores_low() {
        let verdict = matcher().deterministic("quarterly investor report 2024", &hospital());
        assert!(!verdict.is_match);
        assert!(verdict.confidence <= 0.2);
    }

    #[test]
    fn system_name_counts_as_evidence() {
        let h = Hospital::new("h2", "Lakeside Community Hospital", "TX")
            .with_city("Plano")
            .with_health_system("Meadowbrook Health");
        let verdict = matcher().deterministic(
            "meadowbrook health standard charges file for plano facilities",
            &h,
        );
        assert!(verdict.is_match);
        assert!(verdict.confidence >= 0.75);
    }

    #[tokio::test]
    async fn decisive_deterministic_skips_judge() {
        // The judge disagrees, but never gets consulted.
        let judge = FixedJudge(Ok(Judgment {
            valid: false,
            confidence: 1.0,
            explanation: "should not be used".to_string(),
            contains_prices: false,
            contains_hospital_name: false,
        }));
        let verdict = matcher()
            .validate(
                "Standard charges for Mercy Hospital, Springfield MO",
                &hospital(),
                Some(&judge),
            )
            .await;
        assert!(verdict.is_match);
        assert_ne!(verdict.reasoning, "should not be used");
    }

    #[tokio::test]
    async fn confident_judge_overrides() {
        let judge = FixedJudge(Ok(Judgment {
            valid: false,
            confidence: 0.95,
            explanation: "file names a different hospital".to_string(),
            contains_prices: true,
            contains_hospital_name: false,
        }));
        let verdict = matcher()
            .validate(
                "price transparency file for springfield area",
                &hospital(),
                Some(&judge),
            )
            .await;
        assert!(!verdict.is_match);
        assert_eq!(verdict.reasoning, "file names a different hospital");
    }

    #[tokio::test]
    async fn uncertain_judge_keeps_deterministic() {
        let judge = FixedJudge(Ok(Judgment {
            valid: false,
            confidence: 0.5,
            explanation: "unsure".to_string(),
            contains_prices: false,
            contains_hospital_name: false,
        }));
        let verdict = matcher()
            .validate(
                "price transparency file for springfield area",
                &hospital(),
                Some(&judge),
            )
            .await;
        assert!(verdict.is_match);
        assert!(verdict.reasoning.contains("LLM uncertain"));
    }

    #[tokio::test]
    async fn judge_failure_falls_back() {
        let judge = FixedJudge(Err(()));
        let verdict = matcher()
            .validate(
                "price transparency file for springfield area",
                &hospital(),
                Some(&judge),
            )
            .await;
        assert!(verdict.is_match);
        assert!(verdict.reasoning.contains("semantic judge unavailable"));
    }
}
