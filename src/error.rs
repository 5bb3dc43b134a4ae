//! Custom error types for the fan controller.
//!
//! This module provides error handling for configuration loading and
//! validation, hardware command execution and sensor acquisition.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for fan controller operations.
#[derive(Error, Debug)]
pub enum FanControlError {
    /// No configuration file found in any of the searched locations.
    #[error("Missing configuration file. Searched: {searched}")]
    ConfigNotFound { searched: String },

    /// Configuration file could not be read.
    #[error("Failed to read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON or has the wrong shape.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A temperature curve violates its invariants.
    #[error("Invalid curve \"{curve}\": {reason}")]
    InvalidCurve { curve: String, reason: String },

    /// A scalar configuration value is out of range.
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Fan speed outside the range the controller will send.
    #[error("Invalid fan speed {value}%. Valid range: {min}%-{max}%")]
    InvalidSpeed { value: u8, min: u8, max: u8 },

    /// A hardware command returned a failure status.
    #[error("Command \"{command}\" failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// A hardware command or sensor tool did not finish in time.
    #[error("Command \"{command}\" timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// An external program could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl FanControlError {
    /// Whether this error should stop the process at startup.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FanControlError::ConfigNotFound { .. }
                | FanControlError::ConfigIo { .. }
                | FanControlError::ConfigParse(_)
                | FanControlError::InvalidCurve { .. }
                | FanControlError::InvalidConfig { .. }
        )
    }
}

/// Result type alias for fan controller operations.
pub type Result<T> = std::result::Result<T, FanControlError>;
