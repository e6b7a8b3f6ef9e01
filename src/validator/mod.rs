//! Structural validation of downloaded candidate files.
//!
//! Validation answers one question: does this file plausibly contain a
//! standard-charges dataset? Identity (is it *this* hospital's file)
//! is the matcher's job.

mod tabular;

pub use tabular::{sniff_delimiter, CURRENCY_PATTERN};

use std::io::Read;

use tracing::debug;

use crate::config::ValidatorConfig;
use crate::models::FileType;

/// Outcome of validating one downloaded file.
#[derive(Debug, Clone)]
pub struct Validation {
    pub valid: bool,
    /// Structural confidence in [0, 1].
    pub score: f32,
    pub notes: String,
    /// Whether currency-like values were observed.
    pub contains_prices: bool,
}

impl Validation {
    fn rejected(notes: impl Into<String>) -> Self {
        Self {
            valid: false,
            score: 0.0,
            notes: notes.into(),
            contains_prices: false,
        }
    }
}

/// Validates file content against the shapes price transparency data
/// actually ships in.
#[derive(Debug, Clone)]
pub struct FileValidator {
    config: ValidatorConfig,
}

impl FileValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Shortcut used while triaging candidates.
    pub fn is_valid_format(&self, content: &[u8], file_type: Option<FileType>) -> bool {
        self.validate(content, file_type).valid
    }

    /// Full validation of one file.
    pub fn validate(&self, content: &[u8], file_type: Option<FileType>) -> Validation {
        if content.is_empty() {
            return Validation::rejected("empty file");
        }
        if content.len() as u64 > self.config.max_file_bytes {
            return Validation::rejected(format!(
                "file too large ({} bytes, limit {})",
                content.len(),
                self.config.max_file_bytes
            ));
        }

        // Content sniffing beats the URL extension when they disagree.
        let file_type = sniff_type(content).or(file_type);

        let validation = match file_type {
            Some(FileType::Csv) => tabular::validate_delimited(&self.config, content),
            Some(FileType::Json) => tabular::validate_json(&self.config, content),
            Some(FileType::Xlsx) | Some(FileType::Xls) => self.validate_spreadsheet(content),
            Some(FileType::Xml) => self.validate_xml(content),
            Some(FileType::Txt) => tabular::validate_text(&self.config, content),
            Some(FileType::Zip) => self.validate_zip(content),
            Some(FileType::Pdf) => self.validate_binary(content, "pdf"),
            None => {
                // Unknown type: try it as delimited text, else treat as binary.
                if content.is_ascii() || std::str::from_utf8(content).is_ok() {
                    tabular::validate_delimited(&self.config, content)
                } else {
                    self.validate_binary(content, "unknown binary")
                }
            }
        };

        debug!(
            "Validation: valid={} score={:.2} ({})",
            validation.valid, validation.score, validation.notes
        );
        validation
    }

    /// Spreadsheets are accepted on size alone; identity confirmation
    /// is deferred to the matcher, which reads the text it can.
    fn validate_spreadsheet(&self, content: &[u8]) -> Validation {
        if (content.len() as u64) < self.config.min_binary_bytes {
            return Validation::rejected("spreadsheet too small to hold a charge list");
        }
        Validation {
            valid: true,
            score: 0.5,
            notes: "spreadsheet accepted by size, identity deferred".to_string(),
            contains_prices: false,
        }
    }

    fn validate_xml(&self, content: &[u8]) -> Validation {
        let text = String::from_utf8_lossy(content);
        let lower = text.to_lowercase();
        let keyword_hits = ["charge", "price", "rate", "payer", "cpt", "drg"]
            .iter()
            .filter(|k| lower.contains(**k))
            .count();

        if keyword_hits == 0 {
            return Validation::rejected("xml without any charge vocabulary");
        }

        Validation {
            valid: true,
            score: (0.4 + 0.1 * keyword_hits as f32).min(0.7),
            notes: format!("xml with {keyword_hits} charge-vocabulary elements"),
            contains_prices: tabular::contains_currency(&text, self.config.sample_rows),
        }
    }

    /// ZIP archives pass when any member passes. Nested archives are
    /// not recursed into.
    fn validate_zip(&self, content: &[u8]) -> Validation {
        let cursor = std::io::Cursor::new(content);
        let mut archive = match zip::ZipArchive::new(cursor) {
            Ok(archive) => archive,
            Err(e) => return Validation::rejected(format!("unreadable zip archive: {e}")),
        };

        let mut best: Option<Validation> = None;

        for i in 0..archive.len() {
            let Ok(mut member) = archive.by_index(i) else {
                continue;
            };
            if !member.is_file() {
                continue;
            }

            let name = member.name().to_string();
            let member_type = FileType::from_str(name.rsplit('.').next().unwrap_or(""));
            if member_type == Some(FileType::Zip) {
                continue;
            }
            if member.size() > self.config.max_file_bytes {
                continue;
            }

            let mut data = Vec::with_capacity(member.size() as usize);
            if member.read_to_end(&mut data).is_err() {
                continue;
            }

            let inner = self.validate(&data, member_type);
            if inner.valid {
                let notes = format!("zip member {name}: {}", inner.notes);
                let validation = Validation { notes, ..inner };
                if best.as_ref().map_or(true, |b| validation.score > b.score) {
                    best = Some(validation);
                }
            }
        }

        best.unwrap_or_else(|| Validation::rejected("no valid member in zip archive"))
    }

    /// PDFs and unknown binaries: reject obvious login/policy pages,
    /// otherwise accept on size with a low score.
    fn validate_binary(&self, content: &[u8], kind: &str) -> Validation {
        if (content.len() as u64) < self.config.min_binary_bytes {
            return Validation::rejected(format!("{kind} too small to hold a charge list"));
        }

        let head = String::from_utf8_lossy(&content[..content.len().min(8192)]).to_lowercase();
        for marker in ["login", "sign in", "password", "privacy policy", "terms of service"] {
            if head.contains(marker) {
                return Validation::rejected(format!("{kind} looks like a '{marker}' page"));
            }
        }

        Validation {
            valid: true,
            score: 0.4,
            notes: format!("{kind} accepted by size, content not parseable"),
            contains_prices: false,
        }
    }
}

/// Sniff the real file type from magic bytes.
fn sniff_type(content: &[u8]) -> Option<FileType> {
    let kind = infer::get(content)?;
    match kind.mime_type() {
        "application/zip" => {
            // XLSX is a zip container; tell them apart by the workbook entry.
            if content_has_xlsx_marker(content) {
                Some(FileType::Xlsx)
            } else {
                Some(FileType::Zip)
            }
        }
        "application/pdf" => Some(FileType::Pdf),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(FileType::Xlsx),
        "application/vnd.ms-excel" => Some(FileType::Xls),
        _ => None,
    }
}

fn content_has_xlsx_marker(content: &[u8]) -> bool {
    let cursor = std::io::Cursor::new(content);
    match zip::ZipArchive::new(cursor) {
        Ok(archive) => archive
            .file_names()
            .any(|n| n == "xl/workbook.xml" || n == "[Content_Types].xml"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn validator() -> FileValidator {
        FileValidator::new(ValidatorConfig::default())
    }

    fn charge_csv(rows: usize) -> Vec<u8> {
        let mut out = String::from("description,code,gross charge,cash price\n");
        for i in 0..rows {
            out.push_str(&format!("Office visit {i},9921{i},$150.00,120.50\n"));
        }
        out.into_bytes()
    }

    #[test]
    fn rejects_empty_and_oversized() {
        let v = validator();
        assert!(!v.validate(b"", Some(FileType::Csv)).valid);

        let small = FileValidator::new(ValidatorConfig {
            max_file_bytes: 10,
            ..ValidatorConfig::default()
        });
        assert!(!small.validate(&charge_csv(20), Some(FileType::Csv)).valid);
    }

    #[test]
    fn accepts_charge_csv() {
        let validation = validator().validate(&charge_csv(20), Some(FileType::Csv));
        assert!(validation.valid);
        assert!(validation.contains_prices);
        assert!(validation.score >= 0.5);
    }

    #[test]
    fn few_rows_with_currency_still_pass() {
        let validation = validator().validate(&charge_csv(3), Some(FileType::Csv));
        assert!(validation.valid, "{}", validation.notes);
    }

    #[test]
    fn prices_replaced_by_text_invalidate_the_file() {
        assert!(validator().validate(&charge_csv(20), Some(FileType::Csv)).valid);

        let mut csv = String::from("description,code,gross charge,cash price\n");
        for i in 0..20 {
            csv.push_str(&format!("Office visit {i},code pending,call for estimate,varies\n"));
        }
        let validation = validator().validate(csv.as_bytes(), Some(FileType::Csv));
        assert!(!validation.valid, "{}", validation.notes);
    }

    #[test]
    fn rejects_unrelated_csv() {
        let csv = b"name,email\nalice,alice@example.org\nbob,bob@example.org\n";
        let validation = validator().validate(csv, Some(FileType::Csv));
        assert!(!validation.valid);
    }

    #[test]
    fn zip_member_validation() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("charges.csv", options).unwrap();
            writer.write_all(&charge_csv(20)).unwrap();
            writer.start_file("readme.txt", options).unwrap();
            writer.write_all(b"see charges.csv").unwrap();
            writer.finish().unwrap();
        }

        let validation = validator().validate(buf.get_ref(), Some(FileType::Zip));
        assert!(validation.valid);
        assert!(validation.notes.contains("charges.csv"));
    }

    #[test]
    fn empty_zip_rejected() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("notes.txt", options).unwrap();
            writer.write_all(b"nothing here").unwrap();
            writer.finish().unwrap();
        }

        let validation = validator().validate(buf.get_ref(), Some(FileType::Zip));
        assert!(!validation.valid);
    }

    #[test]
    fn binary_login_page_rejected() {
        let mut content = vec![0u8; 2048];
        content[..28].copy_from_slice(b"%PDF-1.4 Login to continue  ");
        let validation = validator().validate_binary(&content, "pdf");
        assert!(!validation.valid);
    }

    #[test]
    fn json_array_of_objects_accepted() {
        let json = br#"[
            {"description": "Office visit", "code": "99213", "gross_charge": 150.0},
            {"description": "X-ray", "code": "71045", "gross_charge": 95.5},
            {"description": "MRI", "code": "70551", "gross_charge": 1200.0}
        ]"#;
        let validation = validator().validate(json, Some(FileType::Json));
        assert!(validation.valid, "{}", validation.notes);
    }
}
