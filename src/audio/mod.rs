pub mod alert_cue;
pub mod scan_cue;

use alert_cue::AlertCue;
use scan_cue::ScanCue;

use log::warn;
use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Feedback capability consumed by the scan loop. Both cues are
/// fire-and-forget: implementations swallow their own failures so a broken
/// audio device can never abort a capture session.
pub trait FeedbackCues: Send + Sync {
    /// Short confirmation beep for newly captured products.
    fn play_scan_cue(&self);
    /// Harsher tone played when a captured product is already expired.
    fn play_alert_cue(&self);
}

enum CueCommand {
    PlayScan,
    PlayAlert,
}

/// Plays synthesized cues on a dedicated audio thread.
///
/// The `OutputStream`/`Sink` pair is not `Send`, so a command channel feeds a
/// thread that owns them for its whole life. The thread and stream are
/// created lazily on the first cue.
pub struct CueEngineHandle {
    tx: Arc<Mutex<Option<Sender<CueCommand>>>>,
}

impl CueEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<CueCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<CueCommand>();

        thread::Builder::new()
            .name("cue-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("failed to open audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                        warn!("cue engine has no audio output: {err}");
                        continue;
                    }
                    if let Some(ref s) = sink {
                        match cmd {
                            CueCommand::PlayScan => s.append(ScanCue::new()),
                            CueCommand::PlayAlert => s.append(AlertCue::new()),
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    fn send(&self, cmd: CueCommand) {
        match self.ensure_thread() {
            Ok(tx) => {
                if tx.send(cmd).is_err() {
                    warn!("cue engine thread is gone; dropping cue");
                }
            }
            Err(err) => warn!("failed to start cue engine: {err}"),
        }
    }
}

impl Default for CueEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackCues for CueEngineHandle {
    fn play_scan_cue(&self) {
        self.send(CueCommand::PlayScan);
    }

    fn play_alert_cue(&self) {
        self.send(CueCommand::PlayAlert);
    }
}
