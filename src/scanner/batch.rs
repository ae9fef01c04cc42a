use log::warn;

use crate::capture::prepare_image;
use crate::models::{RecognitionRecord, ScanMode};
use crate::recognize::Recognizer;
use crate::settings::ScannerSettings;

/// Analyze a set of still photos one at a time.
///
/// Unlike the live loop there is no dedup here: the caller reviews the batch
/// and decides what to keep. A photo that fails to decode or analyze is
/// logged and skipped; the rest of the batch still runs. `progress` is called
/// after each photo with `(done, total)`.
pub async fn scan_batch(
    recognizer: &dyn Recognizer,
    images: &[Vec<u8>],
    mode: ScanMode,
    settings: &ScannerSettings,
    mut progress: impl FnMut(usize, usize),
) -> Vec<RecognitionRecord> {
    let total = images.len();
    let mut results = Vec::new();

    for (index, bytes) in images.iter().enumerate() {
        match prepare_image(bytes, settings.batch_max_width, settings.batch_jpeg_quality) {
            Ok(prepared) => match recognizer.recognize(&prepared, mode).await {
                Ok(records) => results.extend(records),
                Err(err) => warn!("photo {}/{} failed analysis: {err}", index + 1, total),
            },
            Err(err) => warn!("photo {}/{} could not be decoded: {err:#}", index + 1, total),
        }

        progress(index + 1, total);
    }

    results
}
