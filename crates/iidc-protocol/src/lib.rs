//! IEEE 1394 IIDC Camera Bus Interface
//!
//! This crate describes the register-level collaborator that the camera
//! control layer talks to: the `CameraBus` trait with its command verbs,
//! the IIDC enumerations (video modes, color codings, color filters,
//! frame-rate indices, features) and raw feature capability records.
//! A recording `MockBus` is included for tests and offline use.

mod bus;
mod error;
pub mod mock;
mod types;

pub use bus::{CameraBus, FrameId};
pub use error::BusError;
pub use mock::{BusCall, MockBus};
pub use types::{
    framerate_as_float, ColorCoding, ColorFilter, ColourCorrection, DeviceIdentity, Feature,
    FeatureInfo, TriggerPolarity, VideoMode,
};

/// Frame-rate index constants (IIDC fixed-format rates)
pub mod framerate {
    /// 1.875 fps, the slowest fixed rate
    pub const MIN: u32 = 32;
    /// 240 fps, the fastest fixed rate
    pub const MAX: u32 = 39;
    /// Rate of the `MIN` index in Hz
    pub const MIN_HZ: f64 = 1.875;
}

/// Isochronous cycle period in seconds; scalable formats send one packet per cycle
pub const ISO_CYCLE_SECONDS: f64 = 125e-6;

/// Largest packets-per-frame value the PACKET_PER_FRAME register can hold
pub const MAX_PACKETS_PER_FRAME: u32 = 4095;
