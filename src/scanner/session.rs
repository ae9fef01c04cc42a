use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::RecognitionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Stopped,
}

/// Dedup set and result accumulator for one live capture session.
///
/// The original sketch of this feature captured a grow-only set in a closure;
/// here the whole session is one explicit object with a begin/finish
/// lifecycle, shared behind a mutex so result application stays atomic no
/// matter how many recognition calls are in flight.
pub struct ScanSession {
    state: SessionState,
    seen: HashSet<String>,
    accepted: Vec<RecognitionRecord>,
    last_accepted_at: Option<DateTime<Utc>>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            seen: HashSet::new(),
            accepted: Vec::new(),
            last_accepted_at: None,
        }
    }

    /// Reset to a fresh Active session. Nothing from a previous session
    /// survives: the seen-set and accumulator start empty.
    pub fn begin(&mut self) {
        *self = Self {
            state: SessionState::Active,
            seen: HashSet::new(),
            accepted: Vec::new(),
            last_accepted_at: None,
        };
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Timestamp of the most recent accepted batch, for UI/diagnostics. A
    /// healthy session pointed at real labels should keep this moving.
    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        self.last_accepted_at
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// Apply one recognition result set and return the records accepted for
    /// the first time, in input order.
    ///
    /// Records without an expiry date or storage duration are discarded
    /// before keying. Applying against a non-Active session is a no-op so a
    /// recognition call that completes after `finish` cannot write into a
    /// drained session. The caller must hold this session's lock for the
    /// whole call, which makes check-and-insert atomic across concurrent
    /// completions.
    pub fn apply(&mut self, results: Vec<RecognitionRecord>) -> Vec<RecognitionRecord> {
        if self.state != SessionState::Active {
            return Vec::new();
        }

        let mut fresh = Vec::new();
        for record in results {
            if !record.is_usable() {
                continue;
            }
            if self.seen.insert(record.identity_key()) {
                fresh.push(record);
            }
        }

        if !fresh.is_empty() {
            self.accepted.extend(fresh.iter().cloned());
            self.last_accepted_at = Some(Utc::now());
        }

        fresh
    }

    /// End the session and hand back everything accepted, in acceptance
    /// order. The session is not reusable afterwards; `begin` starts over.
    pub fn finish(&mut self) -> Vec<RecognitionRecord> {
        self.state = SessionState::Stopped;
        std::mem::take(&mut self.accepted)
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}
