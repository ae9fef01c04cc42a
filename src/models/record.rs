use serde::{Deserialize, Serialize};

/// Which request shape the recognizer sends to the remote service.
///
/// `Radar` asks for a minimal name+date response tuned for the live loop;
/// `Fast` and `Deep` request the full record shape, on the flash and pro
/// model tiers respectively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanMode {
    Fast,
    Deep,
    Radar,
}

impl Default for ScanMode {
    fn default() -> Self {
        ScanMode::Fast
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// One product analysis extracted from a single frame.
///
/// Field names follow the JSON shape the AI service is asked to produce.
/// Radar-mode responses populate only `product_name` and the date fields;
/// everything else stays `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionRecord {
    pub product_name: String,
    pub origin: Option<String>,
    /// Manufacture date, normalized to YYYY-MM-DD.
    pub manufacture_date: Option<String>,
    /// Expiry date, normalized to YYYY-MM-DD.
    pub expiry_date: Option<String>,
    /// Free-text shelf life when no printed expiry date exists ("18 months").
    pub storage_duration: Option<String>,
    pub is_expired: Option<bool>,
    pub days_remaining: Option<i64>,
    /// The literal date string seen on the packaging.
    pub raw_text_found: Option<String>,
    pub confidence: Option<Confidence>,
    pub summary: Option<String>,
    pub date_ambiguity_warning: Option<String>,
    pub is_food_product: bool,
    pub grounding_sources: Vec<GroundingSource>,
}

impl Default for RecognitionRecord {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            origin: None,
            manufacture_date: None,
            expiry_date: None,
            storage_duration: None,
            is_expired: None,
            days_remaining: None,
            raw_text_found: None,
            confidence: None,
            summary: None,
            date_ambiguity_warning: None,
            is_food_product: true,
            grounding_sources: Vec::new(),
        }
    }
}

impl RecognitionRecord {
    /// Dedup key: product name plus expiry date, falling back to storage
    /// duration. Exact string match; any fuzzy date interpretation already
    /// happened on the recognizer side.
    pub fn identity_key(&self) -> String {
        let date_part = self
            .expiry_date
            .as_deref()
            .or(self.storage_duration.as_deref())
            .unwrap_or("");
        format!("{}-{}", self.product_name, date_part)
    }

    /// A record with neither an expiry date nor a storage duration carries
    /// nothing worth tracking and is discarded before dedup.
    pub fn is_usable(&self) -> bool {
        self.expiry_date.is_some() || self.storage_duration.is_some()
    }
}
