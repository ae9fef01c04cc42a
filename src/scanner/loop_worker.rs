use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::FeedbackCues;
use crate::capture::{prepare_image, FrameSource};
use crate::models::{RecognitionRecord, ScanMode};
use crate::recognize::Recognizer;
use crate::settings::{ScannerSettings, SubmitPolicy};

use super::session::ScanSession;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Caller-supplied sink for newly accepted records. Invoked with each batch
/// exactly once, under the session lock, so increments never interleave.
pub type IncrementCallback = Arc<dyn Fn(&[RecognitionRecord]) + Send + Sync>;

pub(super) struct LoopDeps {
    pub source: Arc<dyn FrameSource>,
    pub recognizer: Arc<dyn Recognizer>,
    pub cues: Arc<dyn FeedbackCues>,
    pub session: Arc<Mutex<ScanSession>>,
    pub on_increment: IncrementCallback,
    pub settings: ScannerSettings,
}

/// The live capture loop: grab a frame every interval, submit it for
/// recognition, funnel every completion through the shared session.
///
/// All per-tick failures (no frame, undecodable frame, recognition error,
/// timeout) are logged and swallowed; the next tick retries with a fresh
/// frame. Only cancellation ends the loop.
pub(super) async fn scan_loop(deps: LoopDeps, cancel_token: CancellationToken) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(deps.settings.capture_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Only consulted under SubmitPolicy::Serialized.
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if deps.settings.submit_policy == SubmitPolicy::Serialized
                    && in_flight.load(Ordering::SeqCst)
                {
                    log_info!("recognition still in flight; skipping tick");
                    continue;
                }

                let frame = {
                    let source = Arc::clone(&deps.source);
                    match tokio::task::spawn_blocking(move || source.grab()).await {
                        Ok(Ok(Some(frame))) => frame,
                        Ok(Ok(None)) => {
                            // Camera not producing yet; not an error.
                            continue;
                        }
                        Ok(Err(err)) => {
                            log_warn!("frame grab failed: {err:#}");
                            continue;
                        }
                        Err(err) => {
                            log_error!("frame grab worker join failed: {err}");
                            continue;
                        }
                    }
                };

                let prepared = match prepare_image(
                    &frame.bytes,
                    deps.settings.live_max_width,
                    deps.settings.live_jpeg_quality,
                ) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        log_warn!("frame preparation failed: {err:#}");
                        continue;
                    }
                };

                in_flight.store(true, Ordering::SeqCst);

                let recognizer = Arc::clone(&deps.recognizer);
                let session = Arc::clone(&deps.session);
                let cues = Arc::clone(&deps.cues);
                let on_increment = Arc::clone(&deps.on_increment);
                let in_flight = Arc::clone(&in_flight);
                let timeout = Duration::from_millis(deps.settings.recognition_timeout_ms);

                tokio::spawn(async move {
                    let outcome =
                        tokio::time::timeout(timeout, recognizer.recognize(&prepared, ScanMode::Radar))
                            .await;

                    match outcome {
                        Ok(Ok(records)) => {
                            apply_results(&session, cues.as_ref(), &on_increment, records).await;
                        }
                        Ok(Err(err)) => {
                            log_warn!("recognition failed; next frame retries: {err}");
                        }
                        Err(_) => {
                            log_warn!(
                                "recognition timed out (> {}ms); next frame retries",
                                timeout.as_millis()
                            );
                        }
                    }

                    in_flight.store(false, Ordering::SeqCst);
                });
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop shutting down");
                break;
            }
        }
    }
}

/// Funnel one completed recognition through the session.
///
/// Runs entirely under the session lock with no await inside, so two
/// completions can never both pass the seen-set check for the same key, and
/// cues/callback ordering matches acceptance ordering.
pub(super) async fn apply_results(
    session: &Mutex<ScanSession>,
    cues: &dyn FeedbackCues,
    on_increment: &IncrementCallback,
    records: Vec<RecognitionRecord>,
) {
    if records.is_empty() {
        return;
    }

    let mut guard = session.lock().await;
    let fresh = guard.apply(records);
    if fresh.is_empty() {
        return;
    }

    log_info!("accepted {} new product(s)", fresh.len());

    cues.play_scan_cue();
    if fresh.iter().any(|r| r.is_expired == Some(true)) {
        cues.play_alert_cue();
    }

    (on_increment)(&fresh);
}
