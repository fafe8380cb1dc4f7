//! Hardware Configuration Error Types

use std::path::PathBuf;

use iidc_protocol::BusError;
use thiserror::Error;

use crate::hardware::HardwareConfig;

/// Errors raised while locating, reading or synthesizing a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file exists for the camera; carries the best guess
    #[error("No hardware configuration file found for this camera")]
    NotFound { guess: Box<HardwareConfig> },

    /// The record did not scan completely
    #[error("Malformed hardware configuration: only {fields_scanned} of 12 fields scanned")]
    Parse { fields_scanned: usize },

    /// bus_speed is not a power-of-two multiple of 100 Mb/s
    #[error("Invalid bus_speed {0} in hardware configuration")]
    InvalidBusSpeed(u32),

    /// File could not be read or written
    #[error("Configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Search settings could not be loaded from the environment
    #[error("Configuration settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Camera query failed while building a best guess
    #[error("Camera query failed: {0}")]
    Device(#[from] BusError),
}

impl ConfigError {
    /// File exists but its contents are unusable
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::InvalidBusSpeed(_))
    }
}
