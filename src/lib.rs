//! Synheart Drowsiness - On-device drowsiness and yawn detection
//!
//! Turns a stream of facial landmark frames into debounced driver-state events
//! through a deterministic per-frame pipeline: landmark layout → aperture
//! ratios (EAR/MAR) → temporal event detector → alarm, log, and chart ports.
//!
//! ## Modules
//!
//! - **Ratio extraction** (`geometry`): eye and mouth aspect ratios
//! - **Event detection** (`detector`): blink, yawn, and drowsiness state machine
//! - **Processor** (`pipeline`): per-session orchestration and state persistence

pub mod alarm;
pub mod config;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod history;
pub mod pipeline;
pub mod schema;
pub mod session_log;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alarm::{AlarmPort, AlertPattern, NullAlarm, RecordingAlarm, TerminalBellAlarm};
pub use config::ProcessorConfig;
pub use detector::{Detector, DetectorConfig, DetectorState, FrameOutcome};
pub use error::ComputeError;
pub use geometry::{eye_aspect_ratio, mouth_aspect_ratio, ratio_sample, LandmarkLayout};
pub use history::EarHistory;
pub use pipeline::{analyze_frames, DrowsinessProcessor, SessionSummary};
pub use schema::{FrameAdapter, LandmarkFrame, SCHEMA_VERSION};
pub use session_log::{CsvFrameLog, FrameLogSink, MemoryFrameLog, NdjsonFrameLog};
pub use types::{DetectorEvent, FaceRegions, FrameRecord, FrameReport, Point, RatioSample};

/// Library version
pub const DROWSY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped into session logs and reports
pub const PRODUCER_NAME: &str = "synheart-drowsiness";
