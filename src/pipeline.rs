//! Pipeline orchestration
//!
//! This module provides the public API for per-frame processing. It wires the
//! stages together for one session:
//! 1. LandmarkLayout - select eye/mouth regions from the frame
//! 2. Ratio extraction - EAR and MAR
//! 3. Detector - blink, yawn, and drowsiness state machine
//! 4. Ports - alarm trigger, frame log, EAR history

use crate::alarm::{AlarmPort, NullAlarm};
use crate::config::ProcessorConfig;
use crate::detector::{Detector, DetectorConfig, DetectorState};
use crate::error::ComputeError;
use crate::geometry::{ratio_sample, LandmarkLayout};
use crate::history::EarHistory;
use crate::schema::{LandmarkFrame, ValidationError};
use crate::session_log::FrameLogSink;
use crate::types::{DetectorEvent, FrameRecord, FrameReport, RatioSample};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate statistics for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub frames_total: u64,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub total_blinks: u32,
    pub total_yawns: u32,
    /// Number of alarm activations
    pub alarms: u32,
    /// Processed frames flagged drowsy
    pub drowsy_frames: u64,
    /// Mean EAR over the chart window
    pub recent_mean_ear: Option<f64>,
}

/// Serializable session progress for pausing and resuming.
///
/// Thresholds and the chart window are not part of the snapshot; a resumed
/// session runs with the configuration of the processor that loads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    session_id: String,
    frame_index: u64,
    alarms: u32,
    drowsy_frames: u64,
    detector: DetectorState,
    /// EAR samples, oldest first
    ear_history: Vec<f64>,
}

/// Stateful processor for one monitoring session.
///
/// Frames must be fed in capture order; each call fully processes its frame
/// before returning.
pub struct DrowsinessProcessor {
    session_id: String,
    layout: LandmarkLayout,
    detector: Detector,
    history: EarHistory,
    alarm: Box<dyn AlarmPort>,
    log_sink: Option<Box<dyn FrameLogSink>>,
    frame_index: u64,
    alarms: u32,
    drowsy_frames: u64,
}

impl Default for DrowsinessProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DrowsinessProcessor {
    /// Create a processor with default thresholds, no alarm output and no log
    pub fn new() -> Self {
        Self::from_config(&ProcessorConfig::default())
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            layout: config.layout.clone(),
            detector: Detector::new(config.detector.clone()),
            history: EarHistory::new(config.history_window),
            alarm: Box::new(NullAlarm),
            log_sink: None,
            frame_index: 0,
            alarms: 0,
            drowsy_frames: 0,
        }
    }

    /// Create a processor with explicit detector thresholds
    pub fn with_detector_config(detector: DetectorConfig) -> Self {
        Self::from_config(&ProcessorConfig {
            detector,
            ..Default::default()
        })
    }

    pub fn with_alarm(mut self, alarm: impl AlarmPort + 'static) -> Self {
        self.alarm = Box::new(alarm);
        self
    }

    pub fn with_log_sink(mut self, sink: impl FrameLogSink + 'static) -> Self {
        self.log_sink = Some(Box::new(sink));
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn detector_state(&self) -> &DetectorState {
        self.detector.state()
    }

    pub fn detector_config(&self) -> &DetectorConfig {
        self.detector.config()
    }

    /// Trailing EAR window for the live chart
    pub fn ear_history(&self) -> &EarHistory {
        &self.history
    }

    /// Process one landmark frame.
    ///
    /// No-face frames and frames with unusable geometry leave the detector
    /// untouched. Only structurally invalid frames return an error.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Result<FrameReport, ComputeError> {
        // Coordinates are checked last, so the rest of the frame is sound here.
        // A bad point the layout reads fails ratio extraction below.
        match frame.validate() {
            Ok(()) | Err(ValidationError::NonFiniteCoordinate { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let regions = match frame.regions(&self.layout) {
            Ok(Some(regions)) => regions,
            Ok(None) => return Ok(self.skip_frame(false)),
            Err(e) if e.is_invalid_sample() => {
                log::debug!("frame {}: {}, skipping", self.frame_index, e);
                return Ok(self.skip_frame(true));
            }
            Err(e) => return Err(e),
        };

        let sample = match ratio_sample(&regions) {
            Ok(sample) => sample,
            Err(e) => {
                log::debug!("frame {}: {}, skipping", self.frame_index, e);
                return Ok(self.skip_frame(true));
            }
        };

        let timestamp = frame.timestamp.unwrap_or_else(now_seconds);
        Ok(self.process_sample(sample, timestamp))
    }

    /// Feed an already-computed ratio sample through the detector and ports
    pub fn process_sample(&mut self, sample: RatioSample, timestamp: f64) -> FrameReport {
        let outcome = self.detector.process(sample, timestamp);

        if outcome.alarm_started() {
            self.alarms += 1;
            log::warn!(
                "drowsiness alarm: eyes closed for {} frames",
                self.detector.state().closed_eye_frames
            );
            self.alarm.trigger();
        }
        for event in &outcome.events {
            match event {
                DetectorEvent::Blink => log::debug!("blink #{}", outcome.record.total_blinks),
                DetectorEvent::Yawn => log::info!("yawn #{}", outcome.record.total_yawns),
                DetectorEvent::AlarmEnd => log::info!("drowsiness alarm cleared"),
                DetectorEvent::AlarmStart => {}
            }
        }
        if outcome.record.is_drowsy {
            self.drowsy_frames += 1;
        }

        self.history.push(sample.ear);
        self.write_log(&outcome.record);

        let report = FrameReport {
            frame_index: self.frame_index,
            face_detected: true,
            measurement_valid: true,
            ear: Some(sample.ear),
            mar: Some(sample.mar),
            total_blinks: outcome.record.total_blinks,
            total_yawns: outcome.record.total_yawns,
            alert: outcome.record.is_drowsy,
            events: outcome.events,
            record: Some(outcome.record),
        };
        self.frame_index += 1;
        report
    }

    /// Account for a frame that produced no measurement
    pub fn skip_frame(&mut self, face_detected: bool) -> FrameReport {
        self.detector.skip();
        let state = self.detector.state();
        let report = FrameReport {
            frame_index: self.frame_index,
            face_detected,
            measurement_valid: false,
            ear: None,
            mar: None,
            total_blinks: state.total_blinks,
            total_yawns: state.total_yawns,
            alert: self.detector.is_drowsy(),
            events: Vec::new(),
            record: None,
        };
        self.frame_index += 1;
        report
    }

    fn write_log(&mut self, record: &FrameRecord) {
        if let Some(sink) = self.log_sink.as_mut() {
            if let Err(e) = sink.append(record) {
                log::warn!("session log write failed: {}", e);
            }
        }
    }

    /// Flush the session log, if any
    pub fn flush(&mut self) -> Result<(), ComputeError> {
        match self.log_sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.detector.state();
        SessionSummary {
            session_id: self.session_id.clone(),
            frames_total: self.frame_index,
            frames_processed: state.frames_processed,
            frames_skipped: state.frames_skipped,
            total_blinks: state.total_blinks,
            total_yawns: state.total_yawns,
            alarms: self.alarms,
            drowsy_frames: self.drowsy_frames,
            recent_mean_ear: self.history.mean(),
        }
    }

    /// Save detector state and history to JSON
    pub fn save_state(&self) -> Result<String, ComputeError> {
        let snapshot = SessionSnapshot {
            session_id: self.session_id.clone(),
            frame_index: self.frame_index,
            alarms: self.alarms,
            drowsy_frames: self.drowsy_frames,
            detector: self.detector.state().clone(),
            ear_history: self.history.to_vec(),
        };
        serde_json::to_string(&snapshot).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Restore detector counters and history from JSON.
    ///
    /// The processor keeps its own thresholds and chart window; saved EAR
    /// samples beyond the window are dropped oldest first.
    pub fn load_state(&mut self, json: &str) -> Result<(), ComputeError> {
        let snapshot: SessionSnapshot =
            serde_json::from_str(json).map_err(|e| ComputeError::ParseError(e.to_string()))?;

        let mut history = EarHistory::new(self.history.window_size());
        for ear in snapshot.ear_history {
            history.push(ear);
        }

        self.session_id = snapshot.session_id;
        self.frame_index = snapshot.frame_index;
        self.alarms = snapshot.alarms;
        self.drowsy_frames = snapshot.drowsy_frames;
        self.detector = Detector::with_state(self.detector.config().clone(), snapshot.detector);
        self.history = history;
        Ok(())
    }

    /// Start a new session: fresh counters, history, and session id
    pub fn reset(&mut self) {
        self.detector.reset();
        self.history.clear();
        self.session_id = Uuid::new_v4().to_string();
        self.frame_index = 0;
        self.alarms = 0;
        self.drowsy_frames = 0;
    }
}

/// Run a batch of frames through a fresh processor (stateless, one-shot).
///
/// Returns the per-frame reports and the session summary.
pub fn analyze_frames(
    frames: &[LandmarkFrame],
    config: &ProcessorConfig,
) -> Result<(Vec<FrameReport>, SessionSummary), ComputeError> {
    config.validate()?;
    let mut processor = DrowsinessProcessor::from_config(config);
    let reports = frames
        .iter()
        .map(|frame| processor.process_frame(frame))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((reports, processor.summary()))
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
