//! IIDC Camera Control
//!
//! Normalized, shadowed control of IEEE 1394 IIDC (DCAM) cameras on top of a
//! register-level `CameraBus`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  hw-config   │───▶│    Camera    │───▶│  CameraBus   │
//! │  (resolver)  │    │  (session)   │    │ (transport)  │
//! └──────────────┘    └──────┬───────┘    └──────────────┘
//!                            │
//!            ┌───────────────┼───────────────┐
//!            ▼               ▼               ▼
//!     ┌────────────┐  ┌────────────┐  ┌────────────┐
//!     │  feature   │  │   shadow   │  │  run_stop  │
//!     │ normalizer │  │   mirror   │  │  planner   │
//!     └────────────┘  └────────────┘  └────────────┘
//! ```
//!
//! Feature values are exposed in normalized units: gain and white balance
//! in [0, 1], brightness in [-1, 1], shutter in seconds and frame rate in
//! frames per second. Every accepted write is recorded in a settings mirror
//! that serves reads while shadowing is on.

pub mod camera;
pub mod convert;
pub mod defaults;
pub mod error;
pub mod feature;
pub mod run_stop;
pub mod settings;
pub mod shadow;

pub use camera::{Camera, ConfigFallback, CreateOptions, Extras, SessionState};
pub use defaults::factory_settings;
pub use error::CameraError;
pub use feature::Probe;
pub use run_stop::{AcquisitionMode, RunAction, RunState};
pub use settings::{CameraSettings, PixelCoding, Tiling};
pub use shadow::Shadow;

use tracing_subscriber::EnvFilter;

fn init(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// Install a human-readable tracing subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Fails if a
/// global subscriber is already installed.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init(false)
}

/// Install a tracing subscriber that writes JSON lines
pub fn init_logging_json() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_logging_init_fails() {
        let _ = init_logging();
        assert!(init_logging().is_err());
        assert!(init_logging_json().is_err());
    }
}
