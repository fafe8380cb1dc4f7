//! Factory default settings
//!
//! Resets the camera and reads back its power-up state, converting every
//! register into normalized units.

use std::thread;
use std::time::Duration;

use hw_config::HardwareConfig;
use iidc_protocol::{CameraBus, Feature, TriggerPolarity, VideoMode};
use tracing::{debug, warn};

use crate::convert::{
    color_coding_to_pixel_coding, index_to_frame_rate, packets_to_frame_rate,
    registers_to_coefficients, video_mode_to_pixel_coding,
};
use crate::error::CameraError;
use crate::feature::{
    default_shutter, normalize_brightness, normalize_gain, normalize_white_balance, probe,
    probe_colour_correction, probe_gamma, probe_tiling, probe_trigger, shutter_seconds,
};
use crate::settings::CameraSettings;

/// Video mode named by the configuration, if the control layer can drive it
pub(crate) fn configured_mode(config: &HardwareConfig) -> Result<VideoMode, CameraError> {
    let mode = config.video_mode().ok_or_else(|| {
        CameraError::UnsupportedFormat(format!("format {} mode {}", config.format, config.mode))
    })?;
    if mode.is_still_image() {
        return Err(CameraError::unsupported_mode(mode));
    }
    Ok(mode)
}

/// Highest rate in a fixed-format frame-rate list
pub(crate) fn max_frame_rate(indices: &[u32]) -> Result<f64, CameraError> {
    if indices.is_empty() {
        return Err(CameraError::NoFrameRates);
    }
    let mut best = 0.0;
    for &index in indices {
        let rate = index_to_frame_rate(index);
        if rate < 0.0 {
            return Err(CameraError::InvalidFrameRate(index));
        }
        if rate > best {
            best = rate;
        }
    }
    Ok(best)
}

/// Reset the camera and derive settings from its factory state
///
/// Not every camera implements reset, so a failed reset is logged and
/// followed by `reset_pause` before probing continues. Features the camera
/// cannot report keep their defaults.
pub fn factory_settings<B: CameraBus>(
    bus: &mut B,
    config: &HardwareConfig,
    reset_pause: Duration,
) -> Result<CameraSettings, CameraError> {
    if let Err(e) = bus.reset() {
        warn!(
            "Camera reset failed ({}), continuing but camera may not be properly initialized",
            e
        );
        thread::sleep(reset_pause);
    }

    let mode = configured_mode(config)?;
    let mut settings = CameraSettings::default();

    if mode.is_fixed_size() {
        let (width, height) = bus.image_size(mode)?;
        settings.width = width;
        settings.height = height;
        settings.pixel_coding = video_mode_to_pixel_coding(mode);
        settings.frame_rate = max_frame_rate(&bus.supported_framerates(mode)?)?;
    } else {
        let (left, top) = bus.format7_image_position(mode)?;
        let (width, height) = bus.format7_image_size(mode)?;
        settings.left = left;
        settings.top = top;
        settings.width = width;
        settings.height = height;
        settings.pixel_coding = color_coding_to_pixel_coding(bus.format7_color_coding(mode)?);
        let packets = bus.format7_packets_per_frame(mode)?;
        settings.frame_rate = packets_to_frame_rate(packets, config.max_packets);
    }

    settings.shutter = default_shutter(settings.frame_rate);
    if let Some(info) = probe(bus, Feature::Shutter)?.usable() {
        settings.shutter = shutter_seconds(info.value, info.min, config, settings.frame_rate);
    }

    settings.external_trigger = false;
    settings.trigger_polarity = true;
    if let Some(info) = probe_trigger(bus)?.usable() {
        settings.trigger_polarity = info.trigger_polarity != TriggerPolarity::ActiveLow;
    }

    if let Some(info) = probe(bus, Feature::Gain)?.usable() {
        settings.gain = normalize_gain(info.value, info.min, info.max);
    }
    if let Some(info) = probe(bus, Feature::Brightness)?.usable() {
        settings.brightness = normalize_brightness(info.value, info.min, info.max);
    }
    if let Some(info) = probe(bus, Feature::WhiteBalance)?.usable() {
        settings.white_balance =
            normalize_white_balance(info.bu_value, info.rv_value, info.min, info.max);
    }

    if let Some(correction) = probe_colour_correction(bus)? {
        settings.colour_correction = true;
        settings.colour_coefficients = registers_to_coefficients(&correction.registers);
    }
    settings.gamma = probe_gamma(bus)?;
    settings.tiling = probe_tiling(bus)?;

    debug!(
        "Factory settings: {}x{} {:?} at {} fps",
        settings.width, settings.height, settings.pixel_coding, settings.frame_rate
    );
    Ok(settings)
}
