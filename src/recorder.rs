//! Action recording
//!
//! An opt-in journal of tool invocations. While recording is on, each
//! browser-facing operation is appended with its parameters and a
//! timestamp; the buffer can be read back or cleared at any time.
//! Recording starts fresh: enabling it discards anything previously
//! captured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One journaled operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedAction {
    /// Operation name as invoked (e.g. `click_element`)
    pub name: String,
    /// Parameters the operation was invoked with
    pub params: Value,
    /// When the operation was journaled
    pub timestamp: DateTime<Utc>,
}

/// Recording status summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStatus {
    /// Whether operations are currently being journaled
    pub recording: bool,
    /// Number of journaled operations in the buffer
    pub action_count: usize,
}

/// Journal of browser operations, disabled by default
#[derive(Debug, Default)]
pub struct Recorder {
    recording: bool,
    actions: Vec<RecordedAction>,
}

impl Recorder {
    /// New recorder, not recording, empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin recording; the buffer is cleared so the journal covers
    /// exactly one window
    pub fn start(&mut self) {
        self.actions.clear();
        self.recording = true;
        debug!("Recording started");
    }

    /// Stop recording; the buffer is kept for readback
    pub fn stop(&mut self) {
        self.recording = false;
        debug!(count = self.actions.len(), "Recording stopped");
    }

    /// Discard all journaled operations without changing the on/off state
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Whether operations are currently being journaled
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Journal one operation; no-op unless recording is on
    pub fn record(&mut self, name: &str, params: Value) {
        if !self.recording {
            return;
        }
        self.actions.push(RecordedAction {
            name: name.to_string(),
            params,
            timestamp: Utc::now(),
        });
    }

    /// Journaled operations, in invocation order
    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    /// Current status summary
    pub fn status(&self) -> RecorderStatus {
        RecorderStatus {
            recording: self.recording,
            action_count: self.actions.len(),
        }
    }
}
