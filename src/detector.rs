//! Temporal event detection
//!
//! This module turns the per-frame ratio stream into debounced events. Eye and
//! mouth are tracked independently:
//! - Eye: consecutive closed-eye frames become a blink (short run) or a
//!   drowsiness alarm (long run). A run is never both.
//! - Mouth: consecutive open-mouth frames become a yawn once long enough.
//!
//! The detector holds no clock and performs no I/O. Callers feed it one
//! sample per frame and route the returned events to the alarm and log ports.

use crate::error::ComputeError;
use crate::types::{DetectorEvent, FrameRecord, RatioSample};
use serde::{Deserialize, Serialize};

/// Default EAR below which an eye counts as closed
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.21;
/// Default closed-eye run length that raises the drowsiness alarm
pub const DEFAULT_DROWSY_FRAME_THRESHOLD: u32 = 25;
/// Default minimum closed-eye run length for a blink
pub const DEFAULT_BLINK_MIN_FRAMES: u32 = 3;
/// Default MAR above which the mouth counts as open
pub const DEFAULT_MAR_THRESHOLD: f64 = 0.6;
/// Default minimum open-mouth run length for a yawn
pub const DEFAULT_YAWN_MIN_FRAMES: u32 = 15;

/// Detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// EAR below this value means the eyes are closed this frame
    pub ear_threshold: f64,
    /// Consecutive closed-eye frames that trigger the alarm
    pub drowsy_frame_threshold: u32,
    /// Minimum consecutive closed-eye frames counted as a blink
    pub blink_min_frames: u32,
    /// MAR above this value means the mouth is open this frame
    pub mar_threshold: f64,
    /// Minimum consecutive open-mouth frames counted as a yawn
    pub yawn_min_frames: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            drowsy_frame_threshold: DEFAULT_DROWSY_FRAME_THRESHOLD,
            blink_min_frames: DEFAULT_BLINK_MIN_FRAMES,
            mar_threshold: DEFAULT_MAR_THRESHOLD,
            yawn_min_frames: DEFAULT_YAWN_MIN_FRAMES,
        }
    }
}

impl DetectorConfig {
    /// Alarm sooner and treat slightly wider eyes as closed
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.23,
            drowsy_frame_threshold: 15,
            ..Default::default()
        }
    }

    /// Tolerate longer closures before alarming
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.19,
            drowsy_frame_threshold: 40,
            yawn_min_frames: 20,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if !self.mar_threshold.is_finite() || self.mar_threshold <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "mar_threshold must be a positive number, got {}",
                self.mar_threshold
            )));
        }
        if self.drowsy_frame_threshold == 0
            || self.blink_min_frames == 0
            || self.yawn_min_frames == 0
        {
            return Err(ComputeError::InvalidConfig(
                "frame thresholds must be at least 1".to_string(),
            ));
        }
        // With blink_min >= drowsy the blink window [blink_min, drowsy) is empty
        if self.blink_min_frames >= self.drowsy_frame_threshold {
            return Err(ComputeError::InvalidConfig(format!(
                "blink_min_frames ({}) must be below drowsy_frame_threshold ({})",
                self.blink_min_frames, self.drowsy_frame_threshold
            )));
        }
        Ok(())
    }
}

/// Mutable detector state for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorState {
    /// Consecutive frames with EAR below threshold (drives the alarm)
    pub closed_eye_frames: u32,
    /// Consecutive frames with EAR below threshold (drives blink counting)
    pub blink_frames: u32,
    /// Set on the alarm edge, cleared when the eyes reopen
    pub alarm_active: bool,
    pub total_blinks: u32,
    pub total_yawns: u32,
    /// Consecutive frames with MAR above threshold
    pub yawn_frames: u32,
    /// Frames that reached the state machine
    pub frames_processed: u64,
    /// No-face or invalid frames that left the state untouched
    pub frames_skipped: u64,
}

/// Result of one detector step
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub record: FrameRecord,
    pub events: Vec<DetectorEvent>,
}

impl FrameOutcome {
    /// True if this frame is the alarm edge
    pub fn alarm_started(&self) -> bool {
        self.events.contains(&DetectorEvent::AlarmStart)
    }
}

/// Blink, yawn, and drowsiness state machine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detector {
    config: DetectorConfig,
    state: DetectorState,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::default(),
        }
    }

    /// Resume from a previously saved state
    pub fn with_state(config: DetectorConfig, state: DetectorState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Whether the current closed-eye run has reached the drowsy threshold
    pub fn is_drowsy(&self) -> bool {
        self.state.closed_eye_frames >= self.config.drowsy_frame_threshold
    }

    /// Advance the state machine by one valid frame
    pub fn process(&mut self, sample: RatioSample, timestamp: f64) -> FrameOutcome {
        let mut events = Vec::new();

        self.step_eyes(sample.ear, &mut events);
        self.step_mouth(sample.mar, &mut events);
        self.state.frames_processed += 1;

        let record = FrameRecord {
            timestamp,
            ear: sample.ear,
            mar: sample.mar,
            total_blinks: self.state.total_blinks,
            total_yawns: self.state.total_yawns,
            is_drowsy: self.is_drowsy(),
        };

        FrameOutcome { record, events }
    }

    /// Frame without a usable measurement (no face, degenerate geometry).
    ///
    /// Counters freeze: an in-progress run neither advances nor resets.
    pub fn skip(&mut self) {
        self.state.frames_skipped += 1;
    }

    /// Start a fresh session with the same configuration
    pub fn reset(&mut self) {
        self.state = DetectorState::default();
    }

    fn step_eyes(&mut self, ear: f64, events: &mut Vec<DetectorEvent>) {
        let cfg = &self.config;
        let state = &mut self.state;

        if ear < cfg.ear_threshold {
            state.closed_eye_frames += 1;
            state.blink_frames += 1;
        } else {
            if (cfg.blink_min_frames..cfg.drowsy_frame_threshold).contains(&state.blink_frames) {
                state.total_blinks += 1;
                events.push(DetectorEvent::Blink);
            }
            state.blink_frames = 0;
            state.closed_eye_frames = 0;
            if state.alarm_active {
                state.alarm_active = false;
                events.push(DetectorEvent::AlarmEnd);
            }
        }

        if state.closed_eye_frames >= cfg.drowsy_frame_threshold && !state.alarm_active {
            state.alarm_active = true;
            events.push(DetectorEvent::AlarmStart);
        }
    }

    fn step_mouth(&mut self, mar: f64, events: &mut Vec<DetectorEvent>) {
        let state = &mut self.state;

        if mar > self.config.mar_threshold {
            state.yawn_frames += 1;
        } else {
            if state.yawn_frames >= self.config.yawn_min_frames {
                state.total_yawns += 1;
                events.push(DetectorEvent::Yawn);
            }
            state.yawn_frames = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OPEN: f64 = 0.3;
    const CLOSED: f64 = 0.1;

    fn eye(ear: f64) -> RatioSample {
        RatioSample { ear, mar: 0.3 }
    }

    fn mouth(mar: f64) -> RatioSample {
        RatioSample { ear: OPEN, mar }
    }

    fn feed(detector: &mut Detector, samples: &[RatioSample]) -> Vec<FrameOutcome> {
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| detector.process(*s, i as f64))
            .collect()
    }

    fn run(ear: f64, len: usize) -> Vec<RatioSample> {
        vec![eye(ear); len]
    }

    fn count(outcomes: &[FrameOutcome], event: DetectorEvent) -> usize {
        outcomes
            .iter()
            .flat_map(|o| o.events.iter())
            .filter(|e| **e == event)
            .count()
    }

    #[test]
    fn test_blink_at_minimum_length() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg.clone());

        let mut samples = run(CLOSED, cfg.blink_min_frames as usize);
        samples.push(eye(OPEN));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(detector.state().total_blinks, 1);
        assert_eq!(detector.state().blink_frames, 0);
        assert_eq!(detector.state().closed_eye_frames, 0);
        assert_eq!(outcomes.last().unwrap().events, vec![DetectorEvent::Blink]);
    }

    #[test]
    fn test_short_run_dropped() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg.clone());

        let mut samples = run(CLOSED, cfg.blink_min_frames as usize - 1);
        samples.push(eye(OPEN));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(detector.state().total_blinks, 0);
        assert!(outcomes.iter().all(|o| !o.record.is_drowsy));
        assert!(outcomes.iter().all(|o| o.events.is_empty()));
    }

    #[test]
    fn test_threshold_is_strict_less_than() {
        let mut detector = Detector::new(DetectorConfig::default());
        // Exactly at threshold counts as open
        let mut samples = run(CLOSED, 4);
        samples.push(eye(DEFAULT_EAR_THRESHOLD));
        feed(&mut detector, &samples);
        assert_eq!(detector.state().total_blinks, 1);
    }

    #[test]
    fn test_drowsy_run_is_not_a_blink() {
        let cfg = DetectorConfig::default();
        let threshold = cfg.drowsy_frame_threshold as usize;
        let mut detector = Detector::new(cfg);

        let mut samples = run(CLOSED, threshold);
        samples.push(eye(OPEN));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(detector.state().total_blinks, 0);
        for (i, outcome) in outcomes.iter().enumerate().take(threshold) {
            // The frame on which the count reaches the threshold is the first drowsy one
            assert_eq!(outcome.record.is_drowsy, i + 1 >= threshold, "frame {i}");
        }
        assert!(!outcomes[threshold].record.is_drowsy);
        assert_eq!(count(&outcomes, DetectorEvent::AlarmStart), 1);
        assert!(outcomes[threshold - 1].alarm_started());
        assert_eq!(outcomes[threshold].events, vec![DetectorEvent::AlarmEnd]);
    }

    #[test]
    fn test_longest_blink_below_drowsy_threshold() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg.clone());

        let mut samples = run(CLOSED, cfg.drowsy_frame_threshold as usize - 1);
        samples.push(eye(OPEN));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(detector.state().total_blinks, 1);
        assert_eq!(count(&outcomes, DetectorEvent::AlarmStart), 0);
    }

    #[test]
    fn test_alarm_once_per_run() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg.clone());

        // Two long runs of different length separated by one open frame
        let mut samples = run(CLOSED, 60);
        samples.push(eye(OPEN));
        samples.extend(run(CLOSED, cfg.drowsy_frame_threshold as usize + 3));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(count(&outcomes, DetectorEvent::AlarmStart), 2);
        assert_eq!(count(&outcomes, DetectorEvent::AlarmEnd), 1);
        assert!(detector.state().alarm_active);
        assert_eq!(detector.state().total_blinks, 0);
    }

    #[test]
    fn test_yawn_counting() {
        let cfg = DetectorConfig::default();
        let min = cfg.yawn_min_frames as usize;
        let mut detector = Detector::new(cfg);

        let mut samples = vec![mouth(0.8); min];
        samples.push(mouth(0.2));
        samples.extend(vec![mouth(0.8); min - 1]);
        samples.push(mouth(0.2));
        let outcomes = feed(&mut detector, &samples);

        assert_eq!(detector.state().total_yawns, 1);
        assert_eq!(detector.state().yawn_frames, 0);
        assert_eq!(count(&outcomes, DetectorEvent::Yawn), 1);
    }

    #[test]
    fn test_yawn_has_no_upper_bound() {
        let mut detector = Detector::new(DetectorConfig::default());
        let mut samples = vec![mouth(0.9); 500];
        samples.push(mouth(0.6));
        feed(&mut detector, &samples);
        // MAR equal to threshold is not open
        assert_eq!(detector.state().total_yawns, 1);
    }

    #[test]
    fn test_skip_freezes_run() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg);

        feed(&mut detector, &run(CLOSED, 2));
        let before = detector.state().clone();
        detector.skip();
        assert_eq!(detector.state().closed_eye_frames, before.closed_eye_frames);
        assert_eq!(detector.state().blink_frames, before.blink_frames);
        assert_eq!(detector.state().frames_skipped, 1);

        // The run continues across the gap and qualifies as a blink
        feed(&mut detector, &[eye(CLOSED), eye(OPEN)]);
        assert_eq!(detector.state().total_blinks, 1);
    }

    #[test]
    fn test_eye_and_mouth_independent() {
        let cfg = DetectorConfig::default();
        let mut detector = Detector::new(cfg.clone());

        let closed_yawning = RatioSample { ear: CLOSED, mar: 0.9 };
        let mut samples = vec![closed_yawning; cfg.yawn_min_frames as usize];
        samples.push(RatioSample { ear: OPEN, mar: 0.1 });
        let outcomes = feed(&mut detector, &samples);

        // 15 closed frames is a blink, and the mouth run is a yawn
        assert_eq!(detector.state().total_blinks, 1);
        assert_eq!(detector.state().total_yawns, 1);
        assert_eq!(
            outcomes.last().unwrap().events,
            vec![DetectorEvent::Blink, DetectorEvent::Yawn]
        );
    }

    #[test]
    fn test_totals_never_decrease() {
        let mut detector = Detector::new(DetectorConfig::default());
        let mut last = (0, 0);
        for i in 0..400u32 {
            let ear = if (i / 7) % 3 == 0 { CLOSED } else { OPEN };
            let mar = if (i / 20) % 2 == 0 { 0.9 } else { 0.1 };
            let outcome = detector.process(RatioSample { ear, mar }, f64::from(i));
            let now = (outcome.record.total_blinks, outcome.record.total_yawns);
            assert!(now.0 >= last.0 && now.1 >= last.1);
            assert!(now.0 - last.0 <= 1 && now.1 - last.1 <= 1);
            last = now;
        }
        assert!(last.0 > 0 && last.1 > 0);
    }

    #[test]
    fn test_reset() {
        let mut detector = Detector::new(DetectorConfig::strict());
        feed(&mut detector, &run(CLOSED, 30));
        detector.reset();
        assert_eq!(detector.state(), &DetectorState::default());
        assert_eq!(detector.config(), &DetectorConfig::strict());
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert!(DetectorConfig::strict().validate().is_ok());
        assert!(DetectorConfig::lenient().validate().is_ok());

        let bad = DetectorConfig {
            blink_min_frames: 25,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ComputeError::InvalidConfig(_))));

        let bad = DetectorConfig {
            ear_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = DetectorConfig {
            yawn_min_frames: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_state_serialization() {
        let mut detector = Detector::new(DetectorConfig::default());
        feed(&mut detector, &run(CLOSED, 5));

        let json = serde_json::to_string(&detector).unwrap();
        let loaded: Detector = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.state(), detector.state());
        assert_eq!(loaded.state().closed_eye_frames, 5);
    }
}
