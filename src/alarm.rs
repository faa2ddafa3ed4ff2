//! Alarm port
//!
//! The detector decides *when* to alarm; an [`AlarmPort`] decides *how*.
//! Triggers are one-way notifications: implementations must return
//! immediately and must not report playback failures back to the caller.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sink for alarm-start notifications
pub trait AlarmPort: Send {
    /// Start the alert pattern. Called at most once per alarm activation.
    fn trigger(&self);
}

/// Alarm that does nothing (headless and batch runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlarm;

impl AlarmPort for NullAlarm {
    fn trigger(&self) {}
}

/// Alarm that only counts triggers; clones share the counter
#[derive(Debug, Clone, Default)]
pub struct RecordingAlarm {
    count: Arc<AtomicUsize>,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl AlarmPort for RecordingAlarm {
    fn trigger(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Audible alert pattern: `beeps` tones of `tone_ms` each
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPattern {
    pub beeps: u32,
    pub frequency_hz: u32,
    pub tone_ms: u64,
}

impl Default for AlertPattern {
    fn default() -> Self {
        Self {
            beeps: 6,
            frequency_hz: 1200,
            tone_ms: 400,
        }
    }
}

impl AlertPattern {
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.tone_ms * u64::from(self.beeps))
    }
}

/// Plays the alert pattern as terminal bells on a detached thread.
///
/// Terminals cannot set the tone frequency; `frequency_hz` is carried for
/// sinks that can.
#[derive(Debug, Clone, Default)]
pub struct TerminalBellAlarm {
    pattern: AlertPattern,
}

impl TerminalBellAlarm {
    pub fn new(pattern: AlertPattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &AlertPattern {
        &self.pattern
    }
}

impl AlarmPort for TerminalBellAlarm {
    fn trigger(&self) {
        let pattern = self.pattern.clone();
        let spawned = thread::Builder::new()
            .name("drowsy-alarm".to_string())
            .spawn(move || {
                let mut stderr = std::io::stderr();
                for _ in 0..pattern.beeps {
                    if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
                        log::warn!("alarm playback failed: {}", e);
                        return;
                    }
                    thread::sleep(Duration::from_millis(pattern.tone_ms));
                }
            });

        if let Err(e) = spawned {
            log::warn!("could not start alarm thread: {}", e);
        }
    }
}
