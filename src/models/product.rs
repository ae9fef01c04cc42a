use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecognitionRecord;

/// A recognition record the user chose to keep: the unit of history
/// persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedProduct {
    pub id: String,
    pub scanned_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: RecognitionRecord,
}

impl SavedProduct {
    pub fn new(record: RecognitionRecord, scanned_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scanned_at,
            record,
        }
    }
}
