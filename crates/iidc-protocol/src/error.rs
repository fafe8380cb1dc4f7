//! Camera Bus Error Types

use thiserror::Error;

/// Errors reported by the register/transport layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A bus command returned a non-success status
    #[error("{verb} failed with status {code}")]
    CommandFailed { verb: &'static str, code: i32 },

    /// The camera does not implement the requested register
    #[error("{0} is not supported by this camera")]
    NotSupported(&'static str),

    /// Value rejected by the camera
    #[error("{verb}: value {value} rejected by camera")]
    ValueRejected { verb: &'static str, value: i64 },

    /// Camera has been removed from the bus
    #[error("Camera not connected")]
    NotConnected,
}
