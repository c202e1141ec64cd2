// ScamShield Data Models
// Shared between the classifier, history and dashboard services

use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Verdict ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Safe,
    Suspicious,
    Scam,
}

impl Verdict {
    /// Parse a verdict as returned by the remote model.
    /// Casing varies between prompt variants ("scam", "SCAM"), so matching is case-insensitive.
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_uppercase().as_str() {
            "SAFE" => Some(Self::Safe),
            "SUSPICIOUS" => Some(Self::Suspicious),
            "SCAM" => Some(Self::Scam),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Suspicious => "SUSPICIOUS",
            Self::Scam => "SCAM",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

// ============ Analysis Result ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Original text, or `IMAGE_CONTENT_PLACEHOLDER` for image scans.
    pub content: String,
    pub content_type: ContentType,
    pub verdict: Verdict,
    /// 0 (harmless) to 100 (certainly a scam).
    pub risk_score: f64,
    #[serde(default)]
    pub indicators: Vec<String>,
    pub reasoning: String,
    pub advice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingSource>>,
    #[serde(default)]
    pub is_deep_scan: bool,
}

pub const IMAGE_CONTENT_PLACEHOLDER: &str = "Image Scan";

// ============ Stats ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    pub scams: usize,
    pub suspicious: usize,
    pub safe: usize,
}

// ============ System Log ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Error,
    Success,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub id: String,
    pub timestamp: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

// ============ Scan Mode ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    Ar,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            "ar" => Some(Self::Ar),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::Ar => "ar",
        }
    }

    /// English name of the language, used when instructing the model.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::Ar => "Arabic",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMode {
    #[serde(default)]
    pub deep_scan: bool,
    #[serde(default)]
    pub language: Language,
}

impl ScanMode {
    pub fn deep(language: Language) -> Self {
        Self { deep_scan: true, language }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parse_is_case_insensitive() {
        assert_eq!(Verdict::parse("scam"), Some(Verdict::Scam));
        assert_eq!(Verdict::parse(" Suspicious "), Some(Verdict::Suspicious));
        assert_eq!(Verdict::parse("SAFE"), Some(Verdict::Safe));
        assert_eq!(Verdict::parse("unknown"), None);
        assert_eq!(Verdict::parse(""), None);
    }

    #[test]
    fn test_analysis_result_json_shape() {
        let result = AnalysisResult {
            id: "abc".to_string(),
            timestamp: 1_700_000_000_000,
            content: "hello".to_string(),
            content_type: ContentType::Text,
            verdict: Verdict::Scam,
            risk_score: 91.0,
            indicators: vec!["Fake Link".to_string()],
            reasoning: "r".to_string(),
            advice: "a".to_string(),
            image_url: None,
            sources: None,
            is_deep_scan: false,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["verdict"], "SCAM");
        assert_eq!(value["contentType"], "text");
        assert_eq!(value["riskScore"], 91.0);
        assert!(value.get("imageUrl").is_none());
        assert!(value.get("sources").is_none());
    }

    #[test]
    fn test_log_kind_serializes_as_type() {
        let entry = SystemLogEntry {
            id: "1".to_string(),
            timestamp: 0,
            message: "History saved".to_string(),
            kind: LogKind::Database,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "database");
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("FR"), Some(Language::Fr));
        assert_eq!(Language::from_code("de"), None);
        assert_eq!(Language::Ar.display_name(), "Arabic");
        assert_eq!(Language::default().code(), "en");
    }
}
