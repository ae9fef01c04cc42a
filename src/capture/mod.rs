mod prepare;

pub use prepare::prepare_image;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// One encoded still image pulled from the live video source.
///
/// Owned by the loop only for the duration of a single submission.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (JPEG from any real camera source).
    pub bytes: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        Self { bytes, captured_at }
    }
}

/// The injected camera capability. The caller acquires and releases the
/// device; the scan loop only pulls frames.
///
/// `Ok(None)` means the source is not producing frames yet (camera still
/// warming up); the current tick is skipped, not failed. Grabbing may block,
/// so the loop calls this through `spawn_blocking`.
pub trait FrameSource: Send + Sync {
    fn grab(&self) -> Result<Option<Frame>>;
}
