//! Feature Normalizer
//!
//! Raw IIDC feature registers are integers in a camera-specific
//! `[min, max]` range. The control layer works in normalized units
//! instead: gain and white balance in [0, 1], brightness in [-1, 1] and
//! shutter in seconds using the exposure quantum and offset from the
//! hardware configuration.

use hw_config::HardwareConfig;
use iidc_protocol::{BusError, CameraBus, ColourCorrection, Feature, FeatureInfo};
use tracing::debug;

use crate::convert::color_filter_to_tiling;
use crate::error::CameraError;
use crate::settings::Tiling;

/// Outcome of probing one feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Feature can be read and written
    Usable(FeatureInfo),
    /// Feature is absent, unreadable or switched off
    Unusable(Feature),
}

impl Probe {
    pub fn usable(&self) -> Option<&FeatureInfo> {
        match self {
            Self::Usable(info) => Some(info),
            Self::Unusable(_) => None,
        }
    }

    pub fn into_usable(self) -> Option<FeatureInfo> {
        match self {
            Self::Usable(info) => Some(info),
            Self::Unusable(_) => None,
        }
    }
}

/// Available, readable and, if it can be switched, switched on
pub fn is_usable(info: &FeatureInfo) -> bool {
    info.available && info.readout_capable && (!info.on_off_capable || info.is_on)
}

/// Read a feature record and classify it
pub fn probe<B: CameraBus>(bus: &mut B, id: Feature) -> Result<Probe, BusError> {
    let info = bus.feature(id)?;
    if is_usable(&info) {
        Ok(Probe::Usable(info))
    } else {
        debug!(
            "Camera reported no usable {:?} (available={}, readable={}, on={})",
            id, info.available, info.readout_capable, info.is_on
        );
        Ok(Probe::Unusable(id))
    }
}

/// Trigger records are usable without being switched on
///
/// The on/off bit of the trigger feature selects the trigger source, so a
/// switched-off trigger still has a readable polarity.
pub fn probe_trigger<B: CameraBus>(bus: &mut B) -> Result<Probe, BusError> {
    let info = bus.feature(Feature::Trigger)?;
    if info.available && info.readout_capable {
        Ok(Probe::Usable(info))
    } else {
        debug!("Camera reported no usable trigger");
        Ok(Probe::Unusable(Feature::Trigger))
    }
}

fn fraction(value: u32, min: u32, max: u32) -> f64 {
    (f64::from(value) - f64::from(min)) / (f64::from(max) - f64::from(min))
}

/// Gain in [0, 1]; 0 when the range is empty
pub fn normalize_gain(value: u32, min: u32, max: u32) -> f64 {
    if max == min {
        return 0.0;
    }
    fraction(value, min, max)
}

/// Brightness in [-1, 1]; 0 when the range is empty
pub fn normalize_brightness(value: u32, min: u32, max: u32) -> f64 {
    if max == min {
        return 0.0;
    }
    2.0 * fraction(value, min, max) - 1.0
}

/// Blue/U and red/V levels in [0, 1]; both 0 when the range is empty
pub fn normalize_white_balance(bu: u32, rv: u32, min: u32, max: u32) -> [f64; 2] {
    if max == min {
        return [0.0, 0.0];
    }
    [fraction(bu, min, max), fraction(rv, min, max)]
}

/// Register bounds in ascending order; some cameras report them swapped
fn ordered(min: u32, max: u32) -> (f64, f64) {
    (f64::from(min.min(max)), f64::from(min.max(max)))
}

fn register_from_fraction(fraction: f64, min: u32, max: u32) -> u32 {
    let span = f64::from(max) - f64::from(min);
    let value = f64::from(min) + (fraction * span).round();
    let (low, high) = ordered(min, max);
    value.clamp(low, high) as u32
}

/// Raw register for a normalized gain
pub fn denormalize_gain(gain: f64, min: u32, max: u32) -> Result<u32, CameraError> {
    if !(0.0..=1.0).contains(&gain) {
        return Err(CameraError::InvalidArgument(format!(
            "gain {gain} outside [0, 1]"
        )));
    }
    Ok(register_from_fraction(gain, min, max))
}

/// Raw register for a normalized brightness
pub fn denormalize_brightness(brightness: f64, min: u32, max: u32) -> Result<u32, CameraError> {
    if !(-1.0..=1.0).contains(&brightness) {
        return Err(CameraError::InvalidArgument(format!(
            "brightness {brightness} outside [-1, 1]"
        )));
    }
    Ok(register_from_fraction((brightness + 1.0) / 2.0, min, max))
}

/// Raw blue/U and red/V registers for normalized white balance levels
pub fn denormalize_white_balance(
    levels: [f64; 2],
    min: u32,
    max: u32,
) -> Result<(u32, u32), CameraError> {
    if levels.iter().any(|level| !(0.0..=1.0).contains(level)) {
        return Err(CameraError::InvalidArgument(format!(
            "white balance {levels:?} outside [0, 1]"
        )));
    }
    Ok((
        register_from_fraction(levels[0], min, max),
        register_from_fraction(levels[1], min, max),
    ))
}

/// Half a frame period; used until the shutter register is known
pub fn default_shutter(frame_rate: f64) -> f64 {
    if frame_rate > 0.0 {
        0.5 / frame_rate
    } else {
        0.0
    }
}

/// Exposure time in seconds for a shutter register value
///
/// The result is limited to a whole number of quanta within one frame
/// period, then raised to the camera's minimum exposure. The lower bound
/// is applied last and wins when the two conflict.
pub fn shutter_seconds(value: u32, min: u32, config: &HardwareConfig, frame_rate: f64) -> f64 {
    let quantum = config.exposure_quantum;
    let mut shutter = config.exposure_offset + f64::from(value) * quantum;

    if frame_rate > 0.0 && quantum > 0.0 {
        let max_shutter = quantum * (1.0 / (frame_rate * quantum)).floor();
        if shutter > max_shutter {
            shutter = max_shutter;
        }
    }

    let min_shutter = config.exposure_offset + f64::from(min) * quantum;
    if shutter < min_shutter {
        shutter = min_shutter;
    }
    shutter
}

/// Shutter register value nearest to `seconds`, clamped to the feature range
pub fn shutter_register(
    seconds: f64,
    info: &FeatureInfo,
    config: &HardwareConfig,
) -> Result<u32, CameraError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(CameraError::InvalidArgument(format!(
            "shutter {seconds} s is not a valid exposure"
        )));
    }
    if config.exposure_quantum <= 0.0 {
        return Err(CameraError::InvalidArgument(
            "exposure_quantum must be positive to set the shutter".to_string(),
        ));
    }
    let steps = ((seconds - config.exposure_offset) / config.exposure_quantum).round();
    let (low, high) = ordered(info.min, info.max);
    Ok(steps.clamp(low, high) as u32)
}

/// Exposure time the camera applies for a shutter register value
///
/// Unlike `shutter_seconds` no frame-period or minimum clamp is applied.
pub fn register_seconds(value: u32, config: &HardwareConfig) -> f64 {
    config.exposure_offset + f64::from(value) * config.exposure_quantum
}

/// Vendor colour correction block, if the camera implements one
pub fn probe_colour_correction<B: CameraBus>(
    bus: &mut B,
) -> Result<Option<ColourCorrection>, BusError> {
    let correction = bus.colour_correction()?;
    if correction.is_none() {
        debug!("Camera reported no usable colour correction");
    }
    Ok(correction)
}

/// Camera implements vendor gamma correction
pub fn probe_gamma<B: CameraBus>(bus: &mut B) -> Result<bool, BusError> {
    let supported = bus.gamma()?.is_some();
    if !supported {
        debug!("Camera reported no usable gamma correction");
    }
    Ok(supported)
}

/// Bayer tiling of the sensor
pub fn probe_tiling<B: CameraBus>(bus: &mut B) -> Result<Tiling, BusError> {
    Ok(color_filter_to_tiling(bus.color_filter()?))
}
