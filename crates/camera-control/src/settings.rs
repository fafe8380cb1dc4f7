//! Normalized camera settings

use serde::{Deserialize, Serialize};

/// Pixel encoding of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelCoding {
    Mono8,
    Mono16,
    Mono16S,
    Yuv411,
    Yuv422,
    Yuv444,
    Rgb8,
    Rgb16,
    Rgb16S,
    Raw8,
    Raw16,
    #[default]
    Invalid,
}

impl PixelCoding {
    /// Storage bits per pixel; 0 for `Invalid`
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            Self::Mono8 | Self::Raw8 => 8,
            Self::Yuv411 => 12,
            Self::Mono16 | Self::Mono16S | Self::Raw16 | Self::Yuv422 => 16,
            Self::Yuv444 | Self::Rgb8 => 24,
            Self::Rgb16 | Self::Rgb16S => 48,
            Self::Invalid => 0,
        }
    }
}

/// Bayer tiling of the sensor's colour filter array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tiling {
    Rggb,
    Gbrg,
    Grbg,
    Bggr,
    /// Camera reported a filter id we do not know
    Invalid,
    /// Sensor has no colour filter array
    #[default]
    None,
}

/// Complete normalized camera state
///
/// Dimensionless settings are normalized: gain and white balance to
/// [0, 1], brightness to [-1, 1]. Times are in seconds and rates in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Image offset from the sensor's top-left corner, pixels
    pub left: u32,
    pub top: u32,
    /// Image size, pixels
    pub width: u32,
    pub height: u32,
    pub pixel_coding: PixelCoding,
    pub tiling: Tiling,
    /// Frames per second
    pub frame_rate: f64,
    /// Exposure time, seconds
    pub shutter: f64,
    /// Exposures are started by the trigger input
    pub external_trigger: bool,
    /// Trigger is active high
    pub trigger_polarity: bool,
    pub gain: f64,
    pub brightness: f64,
    /// Blue/U and red/V levels
    pub white_balance: [f64; 2],
    pub colour_correction: bool,
    /// Row-major colour correction matrix
    pub colour_coefficients: [f64; 9],
    pub gamma: bool,
    /// DMA ring size, at least 1
    pub num_frame_buffers: u32,
    /// Acquire one frame per run request instead of streaming
    pub single_shot: bool,
    pub running: bool,
    /// Serve reads from the mirror instead of querying the camera
    pub use_shadow: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            pixel_coding: PixelCoding::Invalid,
            tiling: Tiling::None,
            frame_rate: 0.0,
            shutter: 0.0,
            external_trigger: false,
            trigger_polarity: true,
            gain: 0.0,
            brightness: 0.0,
            white_balance: [0.0, 0.0],
            colour_correction: false,
            colour_coefficients: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            gamma: false,
            num_frame_buffers: 10,
            single_shot: false,
            running: false,
            use_shadow: true,
        }
    }
}

impl CameraSettings {
    /// Bytes in one frame at the current size and coding
    pub fn frame_bytes(&self) -> usize {
        let bits = u64::from(self.width) * u64::from(self.height) * u64::from(self.pixel_coding.bits_per_pixel());
        (bits / 8) as usize
    }

    /// Serialize for persistence
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Restore a persisted record
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CameraSettings::default();
        assert_eq!(settings.num_frame_buffers, 10);
        assert!(settings.use_shadow);
        assert!(settings.trigger_polarity);
        assert!(!settings.running);
        assert_eq!(settings.pixel_coding, PixelCoding::Invalid);
    }

    #[test]
    fn test_frame_bytes() {
        let settings = CameraSettings {
            width: 640,
            height: 480,
            pixel_coding: PixelCoding::Yuv411,
            ..Default::default()
        };
        assert_eq!(settings.frame_bytes(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_json_persistence() {
        let settings = CameraSettings {
            width: 1280,
            height: 960,
            pixel_coding: PixelCoding::Raw8,
            tiling: Tiling::Rggb,
            gain: 0.25,
            ..Default::default()
        };
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"Raw8\""));
        assert_eq!(CameraSettings::from_json(&json).unwrap(), settings);
    }
}
