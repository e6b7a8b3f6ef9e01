//! Price transparency file models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File formats a price transparency dataset can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
    Xlsx,
    Xls,
    Xml,
    Txt,
    Zip,
    Pdf,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Xml => "xml",
            Self::Txt => "txt",
            Self::Zip => "zip",
            Self::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "xml" => Some(Self::Xml),
            "txt" => Some(Self::Txt),
            "zip" => Some(Self::Zip),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer from an HTTP Content-Type header value.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/csv" => Some(Self::Csv),
            "application/json" => Some(Self::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            "application/vnd.ms-excel" => Some(Self::Xls),
            "text/xml" | "application/xml" => Some(Self::Xml),
            "text/plain" => Some(Self::Txt),
            "application/zip" => Some(Self::Zip),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer from a URL path's extension.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url::Url::parse(url).ok()?.path().to_ascii_lowercase();
        let ext = path.rsplit('.').next()?;
        Self::from_str(ext)
    }

    /// Extensions that could carry price transparency data, dots included.
    pub fn data_extensions() -> &'static [&'static str] {
        &[".csv", ".json", ".xlsx", ".xls", ".xml", ".txt", ".zip"]
    }
}

/// A discovered and validated price transparency file for a hospital.
///
/// At most one *current* validated file is authoritative per hospital
/// (latest by `found_at`); older rows are kept as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFile {
    /// Database row ID (0 before insert).
    pub id: i64,
    /// Owning hospital.
    pub hospital_id: String,
    /// Where the file was downloaded from.
    pub url: String,
    /// File format.
    pub file_type: String,
    /// Whether structural validation and identity matching passed.
    pub validated: bool,
    /// Combined validation confidence in [0, 1].
    pub validation_score: f32,
    /// Free-text reasoning from validation/matching.
    pub validation_notes: Option<String>,
    /// Size in bytes, when known.
    pub file_size: Option<i64>,
    /// Whether currency-like values were observed in the content.
    pub contains_prices: bool,
    /// Whether the hospital's name was observed in the content.
    pub contains_hospital_name: bool,
    /// When the file was found.
    pub found_at: DateTime<Utc>,
}

impl PriceFile {
    pub fn new(hospital_id: impl Into<String>, url: impl Into<String>, file_type: FileType) -> Self {
        Self {
            id: 0,
            hospital_id: hospital_id.into(),
            url: url.into(),
            file_type: file_type.as_str().to_string(),
            validated: false,
            validation_score: 0.0,
            validation_notes: None,
            file_size: None,
            contains_prices: false,
            contains_hospital_name: false,
            found_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_from_url() {
        assert_eq!(
            FileType::from_url("https://example.org/files/charges.csv"),
            Some(FileType::Csv)
        );
        assert_eq!(
            FileType::from_url("https://example.org/data.JSON?download=1"),
            Some(FileType::Json)
        );
        assert_eq!(FileType::from_url("https://example.org/about-us"), None);
    }
}
