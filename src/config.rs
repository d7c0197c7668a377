//! Scanner configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraRequest, Facing, Resolution};
use crate::session::ScanMode;

/// Errors loading or validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Confirm behavior
    pub mode: ScanMode,
    /// Preferred camera facing
    pub facing: Facing,
    /// Resolution requested from the camera
    pub ideal_resolution: Resolution,
    /// Explicit camera index, overrides `facing`
    pub device_index: Option<u32>,
    /// How long the NotFound indicator stays up
    pub recovery_delay_ms: u64,
    /// Host tick period for the frame loop
    pub frame_interval_ms: u64,
    /// Longest frame side handed to the decoder, 0 disables downscaling
    pub decode_max_dimension: u32,
    /// Whether Found fires the feedback hook
    pub feedback_enabled: bool,
    /// How long to wait for a hardware camera to open
    pub open_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Add,
            facing: Facing::Environment,
            ideal_resolution: Resolution::default(),
            device_index: None,
            recovery_delay_ms: 2000,
            frame_interval_ms: 33,
            decode_max_dimension: 800,
            feedback_enabled: true,
            open_timeout_ms: 5000,
        }
    }
}

impl ScanConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded scan config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recovery_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "recovery_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.ideal_resolution.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "ideal_resolution {}x{} has a zero side",
                self.ideal_resolution.width, self.ideal_resolution.height
            )));
        }
        Ok(())
    }

    pub fn camera_request(&self) -> CameraRequest {
        CameraRequest {
            facing: self.facing,
            ideal_resolution: self.ideal_resolution,
            device_index: self.device_index,
        }
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.mode, ScanMode::Add);
        assert_eq!(config.recovery_delay(), Duration::from_millis(2000));
        assert_eq!(config.ideal_resolution, Resolution::new(1280, 720));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ScanConfig::from_json_str(r#"{"mode": "view", "facing": "user", "device_index": 2}"#)
                .unwrap();
        assert_eq!(config.mode, ScanMode::View);
        assert_eq!(config.facing, Facing::User);
        assert_eq!(config.frame_interval_ms, 33);

        let request = config.camera_request();
        assert_eq!(request.device_index, Some(2));
        assert_eq!(request.facing, Facing::User);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(ScanConfig::from_json_str("{}").unwrap(), ScanConfig::default());
    }

    #[test]
    fn test_rejects_zero_recovery_delay() {
        let err = ScanConfig::from_json_str(r#"{"recovery_delay_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_frame_interval() {
        let err = ScanConfig::from_json_str(r#"{"frame_interval_ms": 0}"#).unwrap_err();
        assert!(err.to_string().contains("frame_interval_ms"));
    }

    #[test]
    fn test_rejects_empty_resolution() {
        let err = ScanConfig::from_json_str(r#"{"ideal_resolution": {"width": 0, "height": 720}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let err = ScanConfig::from_json_str(r#"{"mode": "browse"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScanConfig::load(Path::new("/nonexistent/scan.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
