//! Delimited, JSON and plain-text validation heuristics.

use std::sync::LazyLock;

use regex::Regex;

use super::Validation;
use crate::config::ValidatorConfig;

/// A cell that is nothing but a currency amount.
pub static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\$?\s*\d+(?:[,.]\d+)?\s*$").unwrap());

/// Header vocabulary pointing at monetary columns.
const PRICE_WORDS: &[&str] = &[
    "price",
    "charge",
    "cost",
    "rate",
    "fee",
    "amount",
    "gross",
    "cash",
    "negotiated",
    "payer",
];

/// Header vocabulary pointing at service/code columns.
const SERVICE_WORDS: &[&str] = &[
    "description",
    "procedure",
    "code",
    "cpt",
    "drg",
    "hcpcs",
    "ndc",
    "service",
    "rev",
    "item",
];

/// Verbatim phrases from the disclosure regulation's vocabulary.
const TRANSPARENCY_PHRASES: &[&str] = &[
    "standard charges",
    "price transparency",
    "gross charge",
    "cash price",
    "negotiated charge",
    "de-identified",
];

const CANDIDATE_DELIMITERS: &[char] = &[',', ';', '\t', '|'];

/// Pick the delimiter that splits the first line into the most fields.
pub fn sniff_delimiter(first_line: &str) -> char {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| first_line.matches(*d).count())
        .filter(|d| first_line.contains(*d))
        .unwrap_or(',')
}

/// Whether any delimited cell in the first `sample` lines is a bare
/// currency amount.
pub fn contains_currency(text: &str, sample: usize) -> bool {
    for line in text.lines().take(sample) {
        let delimiter = sniff_delimiter(line);
        for cell in line.split(delimiter) {
            let cell = cell.trim_matches('"');
            if !cell.trim().is_empty() && CURRENCY_PATTERN.is_match(cell) {
                return true;
            }
        }
    }
    false
}

fn bucket_hit(cells: &[String], bucket: &[&str]) -> bool {
    cells
        .iter()
        .any(|cell| bucket.iter().any(|word| cell.contains(word)))
}

fn phrase_hit(lower_text: &str) -> bool {
    TRANSPARENCY_PHRASES.iter().any(|p| lower_text.contains(p))
}

/// Row-count gate: enough rows outright, or a handful of rows that do
/// carry prices (some small facilities publish very short lists).
fn enough_rows(config: &ValidatorConfig, rows: usize, has_prices: bool) -> bool {
    rows >= config.min_rows || (rows >= 3 && has_prices)
}

/// Validate delimited text (CSV and friends).
pub fn validate_delimited(config: &ValidatorConfig, content: &[u8]) -> Validation {
    let text = String::from_utf8_lossy(content);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let Some(header_line) = lines.first() else {
        return Validation {
            valid: false,
            score: 0.0,
            notes: "no rows".to_string(),
            contains_prices: false,
        };
    };

    let delimiter = sniff_delimiter(header_line);
    let header: Vec<String> = header_line
        .split(delimiter)
        .map(|c| c.trim_matches('"').trim().to_lowercase())
        .collect();

    let data_rows = lines.len() - 1;
    let has_price_header = bucket_hit(&header, PRICE_WORDS);
    let has_service_header = bucket_hit(&header, SERVICE_WORDS);

    let mut has_currency = false;
    for line in lines.iter().skip(1).take(config.sample_rows) {
        for cell in line.split(delimiter) {
            let cell = cell.trim_matches('"');
            if !cell.trim().is_empty() && CURRENCY_PATTERN.is_match(cell) {
                has_currency = true;
                break;
            }
        }
        if has_currency {
            break;
        }
    }

    let mut score: f32 = 0.0;
    let mut notes = Vec::new();

    if has_price_header {
        score += 0.3;
        notes.push("price columns");
    }
    if has_service_header {
        score += 0.2;
        notes.push("service/code columns");
    }
    if has_currency {
        score += 0.3;
        notes.push("currency values");
    }
    if data_rows >= config.min_rows {
        score += 0.1;
    }
    if phrase_hit(&text.to_lowercase()) {
        score += 0.1;
        notes.push("transparency vocabulary");
    }
    score = score.min(1.0);

    // Currency evidence is mandatory; headers and vocabulary alone do
    // not make a charge list.
    let valid = score >= 0.5 && has_currency && enough_rows(config, data_rows, has_currency);

    Validation {
        valid,
        score,
        notes: if notes.is_empty() {
            format!("delimited file with {data_rows} rows, no charge evidence")
        } else {
            format!("delimited file with {data_rows} rows: {}", notes.join(", "))
        },
        contains_prices: has_currency,
    }
}

/// Validate a JSON document: an array of records, or an object wrapping
/// one (the CMS schema nests records under a top-level key).
pub fn validate_json(config: &ValidatorConfig, content: &[u8]) -> Validation {
    let value: serde_json::Value = match serde_json::from_slice(content) {
        Ok(value) => value,
        Err(e) => {
            return Validation {
                valid: false,
                score: 0.0,
                notes: format!("unparseable json: {e}"),
                contains_prices: false,
            }
        }
    };

    let records = match find_record_array(&value) {
        Some(records) => records,
        None => {
            return Validation {
                valid: false,
                score: 0.0,
                notes: "json without a record array".to_string(),
                contains_prices: false,
            }
        }
    };

    let keys: Vec<String> = records
        .first()
        .and_then(|r| r.as_object())
        .map(|o| o.keys().map(|k| k.to_lowercase()).collect())
        .unwrap_or_default();

    let has_price_key = bucket_hit(&keys, PRICE_WORDS);
    let has_service_key = bucket_hit(&keys, SERVICE_WORDS);

    let mut has_prices = false;
    for record in records.iter().take(config.sample_rows) {
        let Some(object) = record.as_object() else {
            continue;
        };
        for (key, value) in object {
            let key = key.to_lowercase();
            let is_price_key = PRICE_WORDS.iter().any(|w| key.contains(w));
            let price_like = match value {
                serde_json::Value::Number(_) => is_price_key,
                serde_json::Value::String(s) => CURRENCY_PATTERN.is_match(s),
                _ => false,
            };
            if price_like {
                has_prices = true;
                break;
            }
        }
        if has_prices {
            break;
        }
    }

    let mut score: f32 = 0.0;
    if has_price_key {
        score += 0.3;
    }
    if has_service_key {
        score += 0.2;
    }
    if has_prices {
        score += 0.3;
    }
    if records.len() >= config.min_rows {
        score += 0.1;
    }
    score = score.min(1.0);

    let valid = score >= 0.5 && has_prices && enough_rows(config, records.len(), has_prices);

    Validation {
        valid,
        score,
        notes: format!(
            "json with {} records (price keys: {}, service keys: {})",
            records.len(),
            has_price_key,
            has_service_key
        ),
        contains_prices: has_prices,
    }
}

/// The record array itself, or the first array-of-objects value inside
/// a wrapping object.
fn find_record_array(value: &serde_json::Value) -> Option<&Vec<serde_json::Value>> {
    match value {
        serde_json::Value::Array(items) if items.iter().any(|i| i.is_object()) => Some(items),
        serde_json::Value::Object(map) => map.values().find_map(|v| match v {
            serde_json::Value::Array(items) if items.iter().any(|i| i.is_object()) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

/// Validate unstructured plain text by price-pattern density.
pub fn validate_text(config: &ValidatorConfig, content: &[u8]) -> Validation {
    let text = String::from_utf8_lossy(content);
    let lower = text.to_lowercase();

    let keyword_count = PRICE_WORDS.iter().filter(|w| lower.contains(**w)).count();

    let mut currency_lines = 0usize;
    for line in text.lines().take(config.sample_rows.max(200)) {
        let has_amount = line.split_whitespace().any(|token| {
            let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '$' && c != '.');
            !token.is_empty() && CURRENCY_PATTERN.is_match(token)
        });
        if has_amount {
            currency_lines += 1;
        }
    }

    let has_prices = currency_lines >= 3;
    let mut score: f32 = 0.0;
    if keyword_count >= 2 {
        score += 0.3;
    }
    if has_prices {
        score += 0.3;
    }
    if phrase_hit(&lower) {
        score += 0.2;
    }
    score = score.min(1.0);

    Validation {
        valid: score >= 0.5,
        score,
        notes: format!(
            "plain text: {keyword_count} price keywords, {currency_lines} lines with amounts"
        ),
        contains_prices: has_prices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_sniffing() {
        assert_eq!(sniff_delimiter("a,b,c"), ',');
        assert_eq!(sniff_delimiter("a;b;c"), ';');
        assert_eq!(sniff_delimiter("a\tb\tc"), '\t');
        assert_eq!(sniff_delimiter("a|b|c"), '|');
        assert_eq!(sniff_delimiter("single column"), ',');
        // Semicolons inside quoted fields lose to the real delimiter.
        assert_eq!(sniff_delimiter("a,b,c;d,e"), ',');
    }

    #[test]
    fn currency_pattern_matches() {
        for cell in ["150", "$150", " $ 150.00 ", "1,200", "99.5"] {
            assert!(CURRENCY_PATTERN.is_match(cell), "{cell}");
        }
        for cell in ["150 USD", "abc", "$1.2.3", "12-34"] {
            assert!(!CURRENCY_PATTERN.is_match(cell), "{cell}");
        }
    }

    #[test]
    fn semicolon_delimited_accepted() {
        let config = ValidatorConfig::default();
        let mut csv = String::from("description;code;gross charge\n");
        for i in 0..15 {
            csv.push_str(&format!("Procedure {i};1000{i};250.00\n"));
        }
        let validation = validate_delimited(&config, csv.as_bytes());
        assert!(validation.valid);
        assert!(validation.contains_prices);
    }

    #[test]
    fn charge_headers_without_currency_cells_rejected() {
        let config = ValidatorConfig::default();
        let mut csv = String::from("description,code,gross charge,cash price\n");
        for i in 0..20 {
            csv.push_str(&format!("Office visit {i},CPT-A{i},call for estimate,varies\n"));
        }
        let validation = validate_delimited(&config, csv.as_bytes());
        assert!(!validation.valid, "{}", validation.notes);
        assert!(!validation.contains_prices);
    }

    #[test]
    fn json_without_price_values_rejected() {
        let config = ValidatorConfig::default();
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(serde_json::json!({
                "description": format!("Service {i}"),
                "code": format!("C{i}"),
                "gross_charge": "call for estimate",
            }));
        }
        let content = serde_json::to_vec(&records).unwrap();
        let validation = validate_json(&config, &content);
        assert!(!validation.valid, "{}", validation.notes);
        assert!(!validation.contains_prices);
    }

    #[test]
    fn headers_without_data_rejected() {
        let config = ValidatorConfig::default();
        let validation = validate_delimited(&config, b"description,code,gross charge\n");
        assert!(!validation.valid);
    }

    #[test]
    fn json_wrapped_record_array() {
        let config = ValidatorConfig::default();
        let json = br#"{
            "hospital_name": "Example",
            "standard_charge_information": [
                {"description": "Visit", "code": "99213", "gross_charge": 150.0},
                {"description": "X-ray", "code": "71045", "gross_charge": 95.0},
                {"description": "MRI", "code": "70551", "gross_charge": 1200.0}
            ]
        }"#;
        let validation = validate_json(&config, json);
        assert!(validation.valid, "{}", validation.notes);
        assert!(validation.contains_prices);
    }

    #[test]
    fn json_scalar_rejected() {
        let config = ValidatorConfig::default();
        assert!(!validate_json(&config, b"42").valid);
        assert!(!validate_json(&config, b"{\"a\": 1}").valid);
    }

    #[test]
    fn text_with_price_density_accepted() {
        let config = ValidatorConfig::default();
        let mut text = String::from("Standard charges for common services. Gross charge listing.\n");
        for i in 0..10 {
            text.push_str(&format!("Service {i} ... $ {}.00\n", 100 + i));
        }
        let validation = validate_text(&config, text.as_bytes());
        assert!(validation.valid, "{}", validation.notes);
    }

    #[test]
    fn prose_text_rejected() {
        let config = ValidatorConfig::default();
        let text = b"Welcome to our hospital. We are committed to your care.";
        assert!(!validate_text(&config, text).valid);
    }
}
