//! IIDC Camera Hardware Configuration
//!
//! Bus and timing details that cannot be read from an IIDC camera live in
//! small per-device text files. This crate finds the right file for a
//! camera, parses and validates it, and when none exists synthesizes a
//! best guess for the operator to save.
//!
//! ```text
//! IEEE 1394 IIDC DCAM hardware configuration:
//!   bus_speed:           400
//!   format:              0
//!   mode:                5
//!   ...
//!   dma_device_name:     /dev/video1394/0
//! ```

mod error;
mod guess;
mod hardware;
mod search;

pub use error::ConfigError;
pub use guess::{synthesize, write_report, DEFAULT_EXPOSURE_QUANTUM};
pub use hardware::{bus_speed_valid, HardwareConfig, HEADER, REQUIRED_FIELDS};
pub use search::{candidate_filenames, Resolver, SearchPaths, ENV_PREFIX, EXTENSION};
