//! Processor configuration
//!
//! Settings resolve in three layers: built-in defaults, an optional TOML file
//! (path from `DROWSY_CONFIG`), then `DROWSY_*` environment overrides. The
//! result is validated before use.
//!
//! ```toml
//! history_window = 100
//!
//! [detector]
//! ear_threshold = 0.21
//! drowsy_frame_threshold = 25
//!
//! [alert]
//! beeps = 6
//! ```

use crate::alarm::AlertPattern;
use crate::detector::DetectorConfig;
use crate::error::ComputeError;
use crate::geometry::LandmarkLayout;
use crate::history::DEFAULT_HISTORY_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "DROWSY_CONFIG";

/// Environment variables that override single settings
pub const ENV_OVERRIDES: [&str; 6] = [
    "DROWSY_EAR_THRESHOLD",
    "DROWSY_DROWSY_FRAMES",
    "DROWSY_BLINK_MIN_FRAMES",
    "DROWSY_MAR_THRESHOLD",
    "DROWSY_YAWN_MIN_FRAMES",
    "DROWSY_HISTORY_WINDOW",
];

/// Full processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Samples kept in the EAR chart window
    pub history_window: usize,
    pub detector: DetectorConfig,
    pub layout: LandmarkLayout,
    pub alert: AlertPattern,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            detector: DetectorConfig::default(),
            layout: LandmarkLayout::default(),
            alert: AlertPattern::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load from `DROWSY_CONFIG` (if set) and apply environment overrides
    pub fn load() -> Result<Self, ComputeError> {
        let path = std::env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty());
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults) and apply environment overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self, ComputeError> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ComputeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::InvalidConfig(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ComputeError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Apply `DROWSY_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ComputeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let detector = &mut self.detector;
        override_with(&lookup, "DROWSY_EAR_THRESHOLD", &mut detector.ear_threshold)?;
        override_with(&lookup, "DROWSY_DROWSY_FRAMES", &mut detector.drowsy_frame_threshold)?;
        override_with(&lookup, "DROWSY_BLINK_MIN_FRAMES", &mut detector.blink_min_frames)?;
        override_with(&lookup, "DROWSY_MAR_THRESHOLD", &mut detector.mar_threshold)?;
        override_with(&lookup, "DROWSY_YAWN_MIN_FRAMES", &mut detector.yawn_min_frames)?;
        override_with(&lookup, "DROWSY_HISTORY_WINDOW", &mut self.history_window)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        self.detector.validate()?;
        if self.history_window == 0 {
            return Err(ComputeError::InvalidConfig(
                "history_window must be greater than zero".to_string(),
            ));
        }
        if self.alert.tone_ms == 0 {
            return Err(ComputeError::InvalidConfig(
                "alert.tone_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_with<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ComputeError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(());
        }
        *slot = raw
            .parse()
            .map_err(|_| ComputeError::InvalidConfig(format!("{key} has invalid value {raw:?}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = ProcessorConfig::from_toml(
            r#"
            history_window = 50

            [detector]
            drowsy_frame_threshold = 30
            "#,
        )
        .unwrap();

        assert_eq!(cfg.history_window, 50);
        assert_eq!(cfg.detector.drowsy_frame_threshold, 30);
        assert_eq!(cfg.detector.ear_threshold, 0.21);
        assert_eq!(cfg.layout, LandmarkLayout::MEDIAPIPE_FACE_MESH);
        assert_eq!(cfg.alert, AlertPattern::default());
    }

    #[test]
    fn test_custom_layout() {
        let cfg = ProcessorConfig::from_toml(
            r#"
            [layout]
            left_eye = [1, 2, 3, 4, 5, 6]
            right_eye = [7, 8, 9, 10, 11, 12]
            mouth = [13, 14, 15, 16]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.layout.mouth, [13, 14, 15, 16]);
        assert_eq!(cfg.layout.max_index(), 16);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DROWSY_EAR_THRESHOLD", "0.25"),
            ("DROWSY_YAWN_MIN_FRAMES", " 20 "),
            ("DROWSY_HISTORY_WINDOW", ""),
        ]
        .into_iter()
        .collect();

        let mut cfg = ProcessorConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.detector.ear_threshold, 0.25);
        assert_eq!(cfg.detector.yawn_min_frames, 20);
        assert_eq!(cfg.history_window, DEFAULT_HISTORY_WINDOW);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut cfg = ProcessorConfig::default();
        let err = cfg
            .apply_env(|k| (k == "DROWSY_DROWSY_FRAMES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DROWSY_DROWSY_FRAMES"));
    }

    #[test]
    fn test_validate() {
        assert!(ProcessorConfig::default().validate().is_ok());

        let cfg = ProcessorConfig {
            history_window: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = ProcessorConfig {
            detector: DetectorConfig::strict(),
            ..Default::default()
        };
        let raw = cfg.to_toml().unwrap();
        assert_eq!(ProcessorConfig::from_toml(&raw).unwrap(), cfg);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drowsy.toml");
        std::fs::write(&path, "[detector]\nblink_min_frames = 2\n").unwrap();

        let cfg = ProcessorConfig::from_file(&path).unwrap();
        assert_eq!(cfg.detector.blink_min_frames, 2);

        let missing = ProcessorConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ComputeError::InvalidConfig(_))));
    }
}
