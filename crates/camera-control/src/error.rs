//! Camera control error types

use hw_config::{ConfigError, HardwareConfig};
use iidc_protocol::{BusError, VideoMode};
use thiserror::Error;

/// Errors returned by camera control operations
#[derive(Debug, Error)]
pub enum CameraError {
    /// No configuration file exists; the synthesized guess is attached
    #[error("No hardware configuration found for this camera")]
    ConfigurationNotFound { guess: Box<HardwareConfig> },

    /// A configuration file exists but cannot be used
    #[error("Invalid hardware configuration: {0}")]
    ConfigurationInvalid(ConfigError),

    /// A bus command failed
    #[error("Camera command failed: {0}")]
    Device(#[from] BusError),

    /// Argument outside the accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The camera lacks the feature needed for the request
    #[error("{0} is not supported by this camera")]
    Unsupported(&'static str),

    /// Frame-rate index outside the fixed-rate table
    #[error("Invalid frame-rate index {0}")]
    InvalidFrameRate(u32),

    /// Fixed-format mode with an empty frame-rate list
    #[error("Camera reports no supported frame rates")]
    NoFrameRates,

    /// Video mode the control layer cannot drive
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    /// The camera has been torn down
    #[error("Camera not connected")]
    NotConnected,
}

impl CameraError {
    pub(crate) fn unsupported_mode(mode: VideoMode) -> Self {
        let (format, index) = mode.format_mode();
        Self::UnsupportedFormat(format!("format {format} mode {index} ({mode:?})"))
    }
}

impl From<ConfigError> for CameraError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { guess } => Self::ConfigurationNotFound { guess },
            ConfigError::Device(e) => Self::Device(e),
            other => Self::ConfigurationInvalid(other),
        }
    }
}
