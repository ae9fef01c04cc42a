use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// How the capture loop treats ticks while a recognition call is still out.
///
/// `Serialized` gates new submissions on the previous one finishing;
/// `Concurrent` fires every tick and relies on atomic result application to
/// keep out-of-order completions safe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubmitPolicy {
    Serialized,
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSettings {
    /// Tick period of the live loop. A tuning knob, not a correctness one.
    pub capture_interval_ms: u64,
    /// Per-call ceiling; a timeout counts as a failed recognition.
    pub recognition_timeout_ms: u64,
    pub submit_policy: SubmitPolicy,
    pub live_max_width: u32,
    pub live_jpeg_quality: u8,
    pub batch_max_width: u32,
    pub batch_jpeg_quality: u8,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            capture_interval_ms: 1300,
            recognition_timeout_ms: 12_000,
            submit_policy: SubmitPolicy::Concurrent,
            live_max_width: 640,
            live_jpeg_quality: 50,
            batch_max_width: 1200,
            batch_jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizerSettings {
    pub endpoint: String,
    /// Low-latency tier used for radar and fast scans.
    pub model_flash: String,
    /// Reasoning tier used for deep scans.
    pub model_pro: String,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model_flash: "gemini-2.5-flash".into(),
            model_pro: "gemini-3-pro-preview".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    scanner: ScannerSettings,
    recognizer: RecognizerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.data.read().unwrap().scanner.clone()
    }

    pub fn recognizer(&self) -> RecognizerSettings {
        self.data.read().unwrap().recognizer.clone()
    }

    pub fn update_scanner(&self, settings: ScannerSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.scanner = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
