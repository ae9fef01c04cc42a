pub mod audio;
pub mod capture;
pub mod db;
pub mod expiry;
pub mod models;
pub mod notify;
pub mod recognize;
pub mod scanner;
pub mod settings;
mod utils;

pub use audio::{CueEngineHandle, FeedbackCues};
pub use capture::{prepare_image, Frame, FrameSource};
pub use db::Database;
pub use expiry::{dynamic_status, ExpiryBand, ExpiryStatus};
pub use models::{Confidence, GroundingSource, RecognitionRecord, SavedProduct, ScanMode};
pub use notify::{dispatch_urgent, urgent_products, AlertSink, LogAlertSink};
pub use recognize::{GeminiRecognizer, RecognitionError, Recognizer};
pub use scanner::{scan_batch, IncrementCallback, ScanController, ScanSession, SessionState};
pub use settings::{RecognizerSettings, ScannerSettings, SettingsStore, SubmitPolicy};
