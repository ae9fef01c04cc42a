use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::FeedbackCues;
use crate::capture::FrameSource;
use crate::models::RecognitionRecord;
use crate::recognize::Recognizer;
use crate::settings::ScannerSettings;

use super::loop_worker::{scan_loop, IncrementCallback, LoopDeps};
use super::session::ScanSession;

struct ActiveScan {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    session: Arc<Mutex<ScanSession>>,
}

/// Owns the live capture loop lifecycle.
///
/// The camera is acquired by the caller before `start` and released after
/// `stop`; the controller only pulls frames from the injected source while a
/// session is active.
pub struct ScanController {
    source: Arc<dyn FrameSource>,
    recognizer: Arc<dyn Recognizer>,
    cues: Arc<dyn FeedbackCues>,
    settings: ScannerSettings,
    active: Option<ActiveScan>,
}

impl ScanController {
    pub fn new(
        source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn Recognizer>,
        cues: Arc<dyn FeedbackCues>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            source,
            recognizer,
            cues,
            settings,
            active: None,
        }
    }

    /// Begin a fresh session and start ticking. `on_increment` receives each
    /// newly accepted batch as it happens.
    pub async fn start(&mut self, on_increment: IncrementCallback) -> Result<()> {
        if self.active.is_some() {
            bail!("scan session already active");
        }

        let session = Arc::new(Mutex::new(ScanSession::new()));
        session.lock().await.begin();

        let cancel_token = CancellationToken::new();
        let deps = LoopDeps {
            source: Arc::clone(&self.source),
            recognizer: Arc::clone(&self.recognizer),
            cues: Arc::clone(&self.cues),
            session: Arc::clone(&session),
            on_increment,
            settings: self.settings.clone(),
        };

        info!(
            "starting scan session (interval {}ms, {:?} submits)",
            self.settings.capture_interval_ms, self.settings.submit_policy
        );
        let handle = tokio::spawn(scan_loop(deps, cancel_token.clone()));

        self.active = Some(ActiveScan {
            handle,
            cancel_token,
            session,
        });
        Ok(())
    }

    /// End the session: no further ticks, loop task joined, full accumulator
    /// returned in acceptance order.
    ///
    /// Recognition calls still in flight are left to finish on their own;
    /// once the session is marked stopped their late results are discarded.
    pub async fn stop(&mut self) -> Result<Vec<RecognitionRecord>> {
        let Some(active) = self.active.take() else {
            bail!("no active scan session");
        };

        active.cancel_token.cancel();
        active
            .handle
            .await
            .context("scan loop task failed to join")?;

        let results = active.session.lock().await.finish();
        info!("scan session ended with {} product(s)", results.len());
        Ok(results)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// When the last batch was accepted, if a session is active. Stalls here
    /// are the only caller-visible symptom of a misaimed camera or a flaky
    /// service.
    pub async fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        match &self.active {
            Some(active) => active.session.lock().await.last_accepted_at(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::models::ScanMode;
    use crate::recognize::RecognitionError;
    use crate::settings::SubmitPolicy;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;
    use tokio::time::{sleep, Duration};

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 180, 160]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn record(name: &str, expiry: &str, expired: bool) -> RecognitionRecord {
        RecognitionRecord {
            product_name: name.to_string(),
            expiry_date: Some(expiry.to_string()),
            is_expired: Some(expired),
            ..Default::default()
        }
    }

    fn fast_settings(policy: SubmitPolicy) -> ScannerSettings {
        ScannerSettings {
            capture_interval_ms: 10,
            recognition_timeout_ms: 5_000,
            submit_policy: policy,
            ..Default::default()
        }
    }

    struct StillSource {
        bytes: Vec<u8>,
    }

    impl FrameSource for StillSource {
        fn grab(&self) -> Result<Option<Frame>> {
            Ok(Some(Frame::new(self.bytes.clone(), Utc::now())))
        }
    }

    struct NotReadySource;

    impl FrameSource for NotReadySource {
        fn grab(&self) -> Result<Option<Frame>> {
            Ok(None)
        }
    }

    /// Pops one scripted response per call; empty script means empty results.
    struct ScriptedRecognizer {
        script: StdMutex<VecDeque<Result<Vec<RecognitionRecord>, RecognitionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Result<Vec<RecognitionRecord>, RecognitionError>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        async fn recognize(
            &self,
            _image: &[u8],
            _mode: ScanMode,
        ) -> Result<Vec<RecognitionRecord>, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
        }
    }

    /// Parks every call until released, to model slow or in-flight requests.
    struct ParkedRecognizer {
        started: AtomicUsize,
        release: Notify,
        response: Vec<RecognitionRecord>,
    }

    impl ParkedRecognizer {
        fn new(response: Vec<RecognitionRecord>) -> Self {
            Self {
                started: AtomicUsize::new(0),
                release: Notify::new(),
                response,
            }
        }
    }

    #[async_trait]
    impl Recognizer for ParkedRecognizer {
        async fn recognize(
            &self,
            _image: &[u8],
            _mode: ScanMode,
        ) -> Result<Vec<RecognitionRecord>, RecognitionError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(self.response.clone())
        }
    }

    #[derive(Default)]
    struct CountingCues {
        scans: AtomicUsize,
        alerts: AtomicUsize,
    }

    impl FeedbackCues for CountingCues {
        fn play_scan_cue(&self) {
            self.scans.fetch_add(1, Ordering::SeqCst);
        }

        fn play_alert_cue(&self) {
            self.alerts.fetch_add(1, Ordering::SeqCst);
        }
    }

    type Increments = Arc<StdMutex<Vec<Vec<String>>>>;

    fn collecting_callback() -> (IncrementCallback, Increments) {
        let seen: Increments = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: IncrementCallback = Arc::new(move |batch: &[RecognitionRecord]| {
            sink.lock()
                .unwrap()
                .push(batch.iter().map(|r| r.product_name.clone()).collect());
        });
        (callback, seen)
    }

    fn controller(
        source: Arc<dyn FrameSource>,
        recognizer: Arc<dyn Recognizer>,
        cues: Arc<dyn FeedbackCues>,
        policy: SubmitPolicy,
    ) -> ScanController {
        ScanController::new(source, recognizer, cues, fast_settings(policy))
    }

    #[tokio::test]
    async fn live_session_dedups_cues_and_accumulates() {
        // Tick 1 sees Milk; tick 2 sees Milk again plus an expired Yogurt;
        // tick 3 fails outright. Later ticks see nothing.
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            Ok(vec![record("Milk", "2025-06-01", false)]),
            Ok(vec![
                record("Milk", "2025-06-01", false),
                record("Yogurt", "2025-05-20", true),
            ]),
            Err(RecognitionError::Malformed("simulated".into())),
        ]));
        let cues = Arc::new(CountingCues::default());
        let (callback, increments) = collecting_callback();

        let mut controller = controller(
            Arc::new(StillSource { bytes: tiny_png() }),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::clone(&cues) as Arc<dyn FeedbackCues>,
            SubmitPolicy::Serialized,
        );

        controller.start(callback).await.unwrap();
        // Plenty of 10ms ticks to consume the script and then some.
        sleep(Duration::from_millis(200)).await;
        assert!(controller.last_accepted_at().await.is_some());
        let results = controller.stop().await.unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Yogurt"]);

        let batches = increments.lock().unwrap().clone();
        assert_eq!(
            batches,
            vec![vec!["Milk".to_string()], vec!["Yogurt".to_string()]]
        );

        // One cue per accepted batch; one alert for the expired Yogurt. The
        // failed tick and the all-duplicate portion contributed nothing.
        assert_eq!(cues.scans.load(Ordering::SeqCst), 2);
        assert_eq!(cues.alerts.load(Ordering::SeqCst), 1);
        assert!(recognizer.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn unready_camera_skips_ticks_without_submitting() {
        let recognizer = Arc::new(ScriptedRecognizer::new(Vec::new()));
        let (callback, increments) = collecting_callback();

        let mut controller = controller(
            Arc::new(NotReadySource),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::new(CountingCues::default()),
            SubmitPolicy::Concurrent,
        );

        controller.start(callback).await.unwrap();
        sleep(Duration::from_millis(80)).await;
        let results = controller.stop().await.unwrap();

        assert!(results.is_empty());
        assert!(increments.lock().unwrap().is_empty());
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn serialized_policy_never_overlaps_requests() {
        let recognizer = Arc::new(ParkedRecognizer::new(Vec::new()));
        let (callback, _) = collecting_callback();

        let mut controller = controller(
            Arc::new(StillSource { bytes: tiny_png() }),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::new(CountingCues::default()),
            SubmitPolicy::Serialized,
        );

        controller.start(callback).await.unwrap();
        // Many ticks elapse while the single request is parked.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(recognizer.started.load(Ordering::SeqCst), 1);

        recognizer.release.notify_one();
        sleep(Duration::from_millis(50)).await;
        // Released; the gate reopens and at least one more submission runs.
        assert!(recognizer.started.load(Ordering::SeqCst) >= 2);

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_policy_overlaps_requests() {
        let recognizer = Arc::new(ParkedRecognizer::new(Vec::new()));
        let (callback, _) = collecting_callback();

        let mut controller = controller(
            Arc::new(StillSource { bytes: tiny_png() }),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::new(CountingCues::default()),
            SubmitPolicy::Concurrent,
        );

        controller.start(callback).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        // Every tick fired despite none of the calls having completed.
        assert!(recognizer.started.load(Ordering::SeqCst) >= 3);

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn late_completion_after_stop_is_discarded() {
        let recognizer = Arc::new(ParkedRecognizer::new(vec![record(
            "Milk",
            "2025-06-01",
            false,
        )]));
        let cues = Arc::new(CountingCues::default());
        let (callback, increments) = collecting_callback();

        let mut controller = controller(
            Arc::new(StillSource { bytes: tiny_png() }),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::clone(&cues) as Arc<dyn FeedbackCues>,
            SubmitPolicy::Serialized,
        );

        controller.start(callback).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(recognizer.started.load(Ordering::SeqCst), 1);

        // Stop with the call still in flight, then let it complete.
        let results = controller.stop().await.unwrap();
        assert!(results.is_empty());

        recognizer.release.notify_one();
        sleep(Duration::from_millis(50)).await;

        assert!(increments.lock().unwrap().is_empty());
        assert_eq!(cues.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sessions_are_isolated_across_restarts() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            Ok(vec![record("Milk", "2025-06-01", false)]),
            Ok(vec![record("Milk", "2025-06-01", false)]),
        ]));
        let (callback, _) = collecting_callback();
        let (callback2, _) = collecting_callback();

        let mut controller = controller(
            Arc::new(StillSource { bytes: tiny_png() }),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            Arc::new(CountingCues::default()),
            SubmitPolicy::Serialized,
        );

        controller.start(callback).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        let first = controller.stop().await.unwrap();
        assert_eq!(first.len(), 1);

        // Same product again in a new session: accepted again, not
        // suppressed by the old seen-set.
        controller.start(callback2).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        let second = controller.stop().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].product_name, "Milk");
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let (callback, _) = collecting_callback();
        let (callback2, _) = collecting_callback();

        let mut controller = controller(
            Arc::new(NotReadySource),
            Arc::new(ScriptedRecognizer::new(Vec::new())),
            Arc::new(CountingCues::default()),
            SubmitPolicy::Serialized,
        );

        controller.start(callback).await.unwrap();
        assert!(controller.start(callback2).await.is_err());
        controller.stop().await.unwrap();
        assert!(controller.stop().await.is_err());
    }
}
