//! IIDC Register Enumerations and Capability Records
//!
//! Numeric values follow the IIDC/DCAM register map as exposed by the
//! common user-space 1394 libraries.

use serde::{Deserialize, Serialize};

/// Camera identification strings read from the configuration ROM
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Vendor name
    pub vendor: String,
    /// Model name
    pub model: String,
    /// Unique chip id (GUID as a decimal string)
    pub chip: String,
}

impl DeviceIdentity {
    /// Build an identity from vendor/model strings and the 64-bit GUID
    pub fn new(vendor: impl Into<String>, model: impl Into<String>, guid: u64) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            chip: guid.to_string(),
        }
    }
}

/// IIDC video modes (formats 0, 1, 2, 6 and 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum VideoMode {
    Mode160x120Yuv444 = 64,
    Mode320x240Yuv422 = 65,
    Mode640x480Yuv411 = 66,
    Mode640x480Yuv422 = 67,
    Mode640x480Rgb8 = 68,
    Mode640x480Mono8 = 69,
    Mode640x480Mono16 = 70,
    Mode800x600Yuv422 = 71,
    Mode800x600Rgb8 = 72,
    Mode800x600Mono8 = 73,
    Mode1024x768Yuv422 = 74,
    Mode1024x768Rgb8 = 75,
    Mode1024x768Mono8 = 76,
    Mode800x600Mono16 = 77,
    Mode1024x768Mono16 = 78,
    Mode1280x960Yuv422 = 79,
    Mode1280x960Rgb8 = 80,
    Mode1280x960Mono8 = 81,
    Mode1600x1200Yuv422 = 82,
    Mode1600x1200Rgb8 = 83,
    Mode1600x1200Mono8 = 84,
    Mode1280x960Mono16 = 85,
    Mode1600x1200Mono16 = 86,
    /// Format 6 still image
    Exif = 87,
    Format7Mode0 = 88,
    Format7Mode1 = 89,
    Format7Mode2 = 90,
    Format7Mode3 = 91,
    Format7Mode4 = 92,
    Format7Mode5 = 93,
    Format7Mode6 = 94,
    Format7Mode7 = 95,
}

impl VideoMode {
    /// Every video mode in register order
    pub const ALL: [VideoMode; 32] = [
        Self::Mode160x120Yuv444,
        Self::Mode320x240Yuv422,
        Self::Mode640x480Yuv411,
        Self::Mode640x480Yuv422,
        Self::Mode640x480Rgb8,
        Self::Mode640x480Mono8,
        Self::Mode640x480Mono16,
        Self::Mode800x600Yuv422,
        Self::Mode800x600Rgb8,
        Self::Mode800x600Mono8,
        Self::Mode1024x768Yuv422,
        Self::Mode1024x768Rgb8,
        Self::Mode1024x768Mono8,
        Self::Mode800x600Mono16,
        Self::Mode1024x768Mono16,
        Self::Mode1280x960Yuv422,
        Self::Mode1280x960Rgb8,
        Self::Mode1280x960Mono8,
        Self::Mode1600x1200Yuv422,
        Self::Mode1600x1200Rgb8,
        Self::Mode1600x1200Mono8,
        Self::Mode1280x960Mono16,
        Self::Mode1600x1200Mono16,
        Self::Exif,
        Self::Format7Mode0,
        Self::Format7Mode1,
        Self::Format7Mode2,
        Self::Format7Mode3,
        Self::Format7Mode4,
        Self::Format7Mode5,
        Self::Format7Mode6,
        Self::Format7Mode7,
    ];

    /// Raw register value
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }

    /// Look up a raw register value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.as_raw() == raw)
    }

    /// Scalable (Format 7) modes carry their own geometry and color coding
    pub fn is_scalable(&self) -> bool {
        self.as_raw() >= Self::Format7Mode0.as_raw()
    }

    /// Format 6 still-image mode
    pub fn is_still_image(&self) -> bool {
        matches!(self, Self::Exif)
    }

    /// Fixed image size (formats 0-2)
    pub fn is_fixed_size(&self) -> bool {
        !self.is_scalable() && !self.is_still_image()
    }

    /// Split into the (format, mode) pair used by configuration files
    pub fn format_mode(&self) -> (u32, u32) {
        let raw = self.as_raw();
        match raw {
            64..=70 => (0, raw - 64),
            71..=78 => (1, raw - 71),
            79..=86 => (2, raw - 79),
            87 => (6, 0),
            _ => (7, raw - 88),
        }
    }

    /// Combine a (format, mode) pair; `None` for unassigned pairs
    pub fn from_format_mode(format: u32, mode: u32) -> Option<Self> {
        let raw = match (format, mode) {
            (0, 0..=6) => 64 + mode,
            (1, 0..=7) => 71 + mode,
            (2, 0..=7) => 79 + mode,
            (6, 0) => 87,
            (7, 0..=7) => 88 + mode,
            _ => return None,
        };
        Self::from_raw(raw)
    }
}

/// Color codings reported by scalable formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ColorCoding {
    Mono8 = 352,
    Yuv411 = 353,
    Yuv422 = 354,
    Yuv444 = 355,
    Rgb8 = 356,
    Mono16 = 357,
    Rgb16 = 358,
    Mono16S = 359,
    Rgb16S = 360,
    Raw8 = 361,
    Raw16 = 362,
}

impl ColorCoding {
    const ALL: [ColorCoding; 11] = [
        Self::Mono8,
        Self::Yuv411,
        Self::Yuv422,
        Self::Yuv444,
        Self::Rgb8,
        Self::Mono16,
        Self::Rgb16,
        Self::Mono16S,
        Self::Rgb16S,
        Self::Raw8,
        Self::Raw16,
    ];

    /// Raw register value
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }

    /// Look up a raw register value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|coding| coding.as_raw() == raw)
    }
}

/// Bayer color filter arrangements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ColorFilter {
    Rggb = 512,
    Gbrg = 513,
    Grbg = 514,
    Bggr = 515,
}

impl ColorFilter {
    /// Raw register value
    pub fn as_raw(&self) -> u32 {
        *self as u32
    }

    /// Look up a raw register value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            512 => Some(Self::Rggb),
            513 => Some(Self::Gbrg),
            514 => Some(Self::Grbg),
            515 => Some(Self::Bggr),
            _ => None,
        }
    }
}

/// Decode a fixed-format frame-rate index into frames per second
///
/// Index 32 is 1.875 fps and every following index doubles the rate up to
/// 240 fps at index 39. Returns `None` outside that range.
pub fn framerate_as_float(index: u32) -> Option<f32> {
    if (crate::framerate::MIN..=crate::framerate::MAX).contains(&index) {
        Some(1.875 * (1u32 << (index - crate::framerate::MIN)) as f32)
    } else {
        None
    }
}

/// Camera features used by the control layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Feature {
    /// Black level offset
    Brightness = 416,
    /// Blue/U and red/V channel gains
    WhiteBalance = 419,
    /// Integration time in camera units
    Shutter = 423,
    /// Analogue gain
    Gain = 424,
    /// External trigger enable and polarity
    Trigger = 428,
}

/// Trigger input polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerPolarity {
    ActiveLow,
    #[default]
    ActiveHigh,
}

/// Raw capability record for one feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// Feature this record describes
    pub id: Feature,
    /// Feature is implemented
    pub available: bool,
    /// Current value can be read back
    pub readout_capable: bool,
    /// Feature can be switched on and off
    pub on_off_capable: bool,
    /// Feature is switched on
    pub is_on: bool,
    /// Smallest register value
    pub min: u32,
    /// Largest register value
    pub max: u32,
    /// Current register value
    pub value: u32,
    /// White balance blue/U register
    pub bu_value: u32,
    /// White balance red/V register
    pub rv_value: u32,
    /// Trigger polarity (trigger feature only)
    pub trigger_polarity: TriggerPolarity,
}

impl FeatureInfo {
    /// A readable, switched-on feature with the given range and value
    pub fn new(id: Feature, min: u32, max: u32, value: u32) -> Self {
        Self {
            id,
            available: true,
            readout_capable: true,
            on_off_capable: false,
            is_on: true,
            min,
            max,
            value,
            bu_value: value,
            rv_value: value,
            trigger_polarity: TriggerPolarity::ActiveHigh,
        }
    }

    /// A feature the camera does not implement
    pub fn absent(id: Feature) -> Self {
        Self {
            available: false,
            readout_capable: false,
            is_on: false,
            ..Self::new(id, 0, 0, 0)
        }
    }
}

/// Vendor colour-correction register block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourCorrection {
    /// Correction matrix applied by the camera
    pub enabled: bool,
    /// Row-major 3x3 coefficients in thousandths
    pub registers: [i32; 9],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mode_roundtrip() {
        for mode in VideoMode::ALL {
            let (format, index) = mode.format_mode();
            assert_eq!(VideoMode::from_format_mode(format, index), Some(mode));
        }
        assert_eq!(VideoMode::from_format_mode(0, 7), None);
        assert_eq!(VideoMode::from_format_mode(3, 0), None);
    }

    #[test]
    fn test_mode_classes() {
        assert!(VideoMode::Mode640x480Mono8.is_fixed_size());
        assert!(VideoMode::Format7Mode3.is_scalable());
        assert!(!VideoMode::Format7Mode3.is_fixed_size());
        assert!(VideoMode::Exif.is_still_image());
        assert!(!VideoMode::Exif.is_fixed_size());
    }

    #[test]
    fn test_framerate_decoder() {
        assert_eq!(framerate_as_float(32), Some(1.875));
        assert_eq!(framerate_as_float(34), Some(7.5));
        assert_eq!(framerate_as_float(39), Some(240.0));
        assert_eq!(framerate_as_float(31), None);
        assert_eq!(framerate_as_float(40), None);
    }

    #[test]
    fn test_raw_lookups() {
        assert_eq!(ColorCoding::from_raw(361), Some(ColorCoding::Raw8));
        assert_eq!(ColorCoding::from_raw(363), None);
        assert_eq!(ColorFilter::from_raw(515), Some(ColorFilter::Bggr));
        assert_eq!(VideoMode::from_raw(63), None);
    }

    #[test]
    fn test_identity_chip_is_decimal_guid() {
        let id = DeviceIdentity::new("AVT", "Guppy F-080C", 0x000A_4701_0203_0405);
        assert_eq!(id.chip, "2892819421398021");
    }

    proptest::proptest! {
        #[test]
        fn prop_format_mode_pairs_are_stable(format in 0u32..10, index in 0u32..10) {
            if let Some(mode) = VideoMode::from_format_mode(format, index) {
                proptest::prop_assert_eq!(mode.format_mode(), (format, index));
            }
        }

        #[test]
        fn prop_framerate_indices_double(index in 32u32..39) {
            let lo = framerate_as_float(index).unwrap();
            let hi = framerate_as_float(index + 1).unwrap();
            proptest::prop_assert_eq!(hi, lo * 2.0);
        }
    }
}
