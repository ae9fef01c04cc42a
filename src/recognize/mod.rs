mod gemini;

pub use gemini::GeminiRecognizer;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{RecognitionRecord, ScanMode};

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("recognition service returned HTTP {0}")]
    Status(u16),
    #[error("malformed recognition response: {0}")]
    Malformed(String),
}

/// The consumed AI capability: one frame in, zero or more structured product
/// records out.
///
/// Implementations decide how `mode` maps onto the remote side (model tier,
/// prompt, response schema); callers only see which fields come back
/// populated.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        image: &[u8],
        mode: ScanMode,
    ) -> Result<Vec<RecognitionRecord>, RecognitionError>;
}
