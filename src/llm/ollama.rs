//! Semantic judge backed by a local Ollama instance.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{JudgeError, Judgment, SemanticJudge};
use crate::config::LlmConfig;
use crate::models::Hospital;

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Judge running prompts against Ollama's `/api/generate`.
pub struct OllamaJudge {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaJudge {
    pub fn new(config: LlmConfig) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| JudgeError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Whether the Ollama service answers at all.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_prompt(&self, sample: &str, hospital: &Hospital) -> String {
        let truncated = truncate_utf8(sample, self.config.sample_chars);
        let location = match &hospital.city {
            Some(city) => format!("{}, {}", city, hospital.state),
            None => hospital.state.clone(),
        };
        let system = hospital
            .health_system_name
            .as_deref()
            .map(|s| format!("It belongs to the {s} health system. "))
            .unwrap_or_default();

        format!(
            r#"You are verifying hospital price transparency files.

The hospital is "{name}" in {location}. {system}Below is a sample from a file that may be its standard charges disclosure.

Decide whether this file is plausibly THIS hospital's price transparency data. A file for a different hospital, a different facility of an unrelated system, or non-price content is not a match.

Respond with ONLY a JSON object, no other text:
{{"valid": true or false, "confidence": 0.0 to 1.0, "explanation": "one sentence", "contains_prices": true or false, "contains_hospital_name": true or false}}

File sample:
{sample}"#,
            name = hospital.name,
            location = location,
            system = system,
            sample = truncated,
        )
    }

    async fn call(&self, prompt: &str) -> Result<String, JudgeError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| JudgeError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(JudgeError::Api(format!("HTTP {status}: {body}")));
        }

        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))?;

        Ok(body.response)
    }
}

#[async_trait]
impl SemanticJudge for OllamaJudge {
    async fn judge(&self, sample: &str, hospital: &Hospital) -> Result<Judgment, JudgeError> {
        if !self.config.enabled {
            return Err(JudgeError::Disabled);
        }

        let prompt = self.build_prompt(sample, hospital);
        debug!("Asking {} about {}", self.config.model, hospital.name);

        let completion = self.call(&prompt).await?;
        parse_judgment(&completion)
    }
}

/// Extract the JSON object from a model completion that may wrap it in
/// prose or a code fence.
fn parse_judgment(completion: &str) -> Result<Judgment, JudgeError> {
    let start = completion
        .find('{')
        .ok_or_else(|| JudgeError::Parse("no JSON object in completion".to_string()))?;
    let end = completion
        .rfind('}')
        .ok_or_else(|| JudgeError::Parse("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(JudgeError::Parse("malformed JSON object".to_string()));
    }

    let mut judgment: Judgment = serde_json::from_str(&completion[start..=end])
        .map_err(|e| JudgeError::Parse(e.to_string()))?;
    judgment.confidence = judgment.confidence.clamp(0.0, 1.0);
    Ok(judgment)
}

/// Truncate to at most `max_chars` characters, on a char boundary.
fn truncate_utf8(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let judgment = parse_judgment(
            r#"{"valid": true, "confidence": 0.85, "explanation": "Hospital name appears in header.", "contains_prices": true, "contains_hospital_name": true}"#,
        )
        .unwrap();
        assert!(judgment.valid);
        assert!((judgment.confidence - 0.85).abs() < f32::EPSILON);
        assert!(judgment.contains_prices);
    }

    #[test]
    fn parses_fenced_json() {
        let completion = "Here is my assessment:\n```json\n{\"valid\": false, \"confidence\": 0.9, \"explanation\": \"Different hospital named in the data.\"}\n```";
        let judgment = parse_judgment(completion).unwrap();
        assert!(!judgment.valid);
        assert!(!judgment.contains_prices);
    }

    #[test]
    fn confidence_is_clamped() {
        let judgment = parse_judgment(
            r#"{"valid": true, "confidence": 1.7, "explanation": "overconfident"}"#,
        )
        .unwrap();
        assert!((judgment.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_proseless_completions() {
        assert!(parse_judgment("I cannot determine this.").is_err());
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // "hé" is two characters but three bytes.
        assert_eq!(truncate_utf8("héllo wörld", 2), "hé");
        assert_eq!(truncate_utf8("héllo", 10), "héllo");
        assert_eq!(truncate_utf8("", 5), "");
    }
}
