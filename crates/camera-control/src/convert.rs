//! Conversion Tables
//!
//! Mappings between IIDC register values and the normalized types exposed
//! by the control layer, plus frame-rate arithmetic for fixed and
//! scalable formats.

use iidc_protocol::{
    framerate, framerate_as_float, ColorCoding, ColorFilter, VideoMode, ISO_CYCLE_SECONDS,
};

use crate::settings::{PixelCoding, Tiling};

/// Returned by `index_to_frame_rate` for an index outside the fixed-rate table
pub const INVALID_FRAME_RATE: f64 = -1.0;

/// Pixel coding implied by a fixed-size video mode
///
/// Scalable and still-image modes carry no implied coding and map to
/// `Invalid`.
pub fn video_mode_to_pixel_coding(mode: VideoMode) -> PixelCoding {
    use VideoMode::*;
    match mode {
        Mode160x120Yuv444 => PixelCoding::Yuv444,
        Mode320x240Yuv422 | Mode640x480Yuv422 | Mode800x600Yuv422 | Mode1024x768Yuv422
        | Mode1280x960Yuv422 | Mode1600x1200Yuv422 => PixelCoding::Yuv422,
        Mode640x480Yuv411 => PixelCoding::Yuv411,
        Mode640x480Rgb8 | Mode800x600Rgb8 | Mode1024x768Rgb8 | Mode1280x960Rgb8
        | Mode1600x1200Rgb8 => PixelCoding::Rgb8,
        Mode640x480Mono8 | Mode800x600Mono8 | Mode1024x768Mono8 | Mode1280x960Mono8
        | Mode1600x1200Mono8 => PixelCoding::Mono8,
        Mode640x480Mono16 | Mode800x600Mono16 | Mode1024x768Mono16 | Mode1280x960Mono16
        | Mode1600x1200Mono16 => PixelCoding::Mono16,
        Exif | Format7Mode0 | Format7Mode1 | Format7Mode2 | Format7Mode3 | Format7Mode4
        | Format7Mode5 | Format7Mode6 | Format7Mode7 => PixelCoding::Invalid,
    }
}

/// Same as `video_mode_to_pixel_coding` for a raw register value
pub fn raw_video_mode_to_pixel_coding(raw: u32) -> PixelCoding {
    VideoMode::from_raw(raw).map_or(PixelCoding::Invalid, video_mode_to_pixel_coding)
}

/// Pixel coding of a scalable-format color coding
pub fn color_coding_to_pixel_coding(coding: ColorCoding) -> PixelCoding {
    match coding {
        ColorCoding::Mono8 => PixelCoding::Mono8,
        ColorCoding::Yuv411 => PixelCoding::Yuv411,
        ColorCoding::Yuv422 => PixelCoding::Yuv422,
        ColorCoding::Yuv444 => PixelCoding::Yuv444,
        ColorCoding::Rgb8 => PixelCoding::Rgb8,
        ColorCoding::Mono16 => PixelCoding::Mono16,
        ColorCoding::Rgb16 => PixelCoding::Rgb16,
        ColorCoding::Mono16S => PixelCoding::Mono16S,
        ColorCoding::Rgb16S => PixelCoding::Rgb16S,
        ColorCoding::Raw8 => PixelCoding::Raw8,
        ColorCoding::Raw16 => PixelCoding::Raw16,
    }
}

/// Same as `color_coding_to_pixel_coding` for a raw register value
pub fn raw_color_coding_to_pixel_coding(raw: u32) -> PixelCoding {
    ColorCoding::from_raw(raw).map_or(PixelCoding::Invalid, color_coding_to_pixel_coding)
}

/// Color coding register value for a pixel coding; `None` for `Invalid`
pub fn pixel_coding_to_color_coding(coding: PixelCoding) -> Option<ColorCoding> {
    let color = match coding {
        PixelCoding::Mono8 => ColorCoding::Mono8,
        PixelCoding::Yuv411 => ColorCoding::Yuv411,
        PixelCoding::Yuv422 => ColorCoding::Yuv422,
        PixelCoding::Yuv444 => ColorCoding::Yuv444,
        PixelCoding::Rgb8 => ColorCoding::Rgb8,
        PixelCoding::Mono16 => ColorCoding::Mono16,
        PixelCoding::Rgb16 => ColorCoding::Rgb16,
        PixelCoding::Mono16S => ColorCoding::Mono16S,
        PixelCoding::Rgb16S => ColorCoding::Rgb16S,
        PixelCoding::Raw8 => ColorCoding::Raw8,
        PixelCoding::Raw16 => ColorCoding::Raw16,
        PixelCoding::Invalid => return None,
    };
    Some(color)
}

/// Tiling of a color filter probe result; `None` means no filter array
pub fn color_filter_to_tiling(filter: Option<u32>) -> Tiling {
    match filter.map(ColorFilter::from_raw) {
        None => Tiling::None,
        Some(Some(ColorFilter::Rggb)) => Tiling::Rggb,
        Some(Some(ColorFilter::Gbrg)) => Tiling::Gbrg,
        Some(Some(ColorFilter::Grbg)) => Tiling::Grbg,
        Some(Some(ColorFilter::Bggr)) => Tiling::Bggr,
        Some(None) => Tiling::Invalid,
    }
}

/// Frames per second of a fixed-format frame-rate index
///
/// Returns `INVALID_FRAME_RATE` (negative) when the index is not in the
/// table; callers treat any negative result as failure.
pub fn index_to_frame_rate(index: u32) -> f64 {
    framerate_as_float(index).map_or(INVALID_FRAME_RATE, f64::from)
}

/// Supported frame-rate index nearest to `frame_rate` on a log2 scale
///
/// Non-positive requests are treated as the slowest rate. Ties keep the
/// first candidate in list order. An empty list yields 0, which is never a
/// valid index; callers reject empty lists before getting here.
pub fn frame_rate_to_index(frame_rate: f64, supported: &[u32]) -> u32 {
    let fps = if frame_rate > 0.0 { frame_rate } else { framerate::MIN_HZ };
    let log2f = (fps / framerate::MIN_HZ).log2();

    let mut best = f64::MAX;
    let mut nearest = None;
    for &index in supported {
        let diff = (log2f - (f64::from(index) - f64::from(framerate::MIN))).abs();
        if diff < best {
            best = diff;
            nearest = Some(index);
        }
    }
    nearest.unwrap_or(0)
}

/// Frame rate of a scalable format sending `packets` packets per frame
///
/// One packet goes out per isochronous cycle. `packets` is clamped to
/// `[1, max_packets]` first.
pub fn packets_to_frame_rate(packets: u32, max_packets: u32) -> f64 {
    let packets = packets.clamp(1, max_packets.max(1));
    1.0 / (f64::from(packets) * ISO_CYCLE_SECONDS)
}

/// Packets per frame needed for `frame_rate`, clamped to `[1, max_packets]`
pub fn frame_rate_to_packets(frame_rate: f64, max_packets: u32) -> u32 {
    let max_packets = max_packets.max(1);
    if frame_rate <= 0.0 || !frame_rate.is_finite() {
        return max_packets;
    }
    let packets = (1.0 / (frame_rate * ISO_CYCLE_SECONDS)).round();
    if packets >= f64::from(max_packets) {
        max_packets
    } else {
        (packets as u32).max(1)
    }
}

/// Vendor colour-correction registers are coefficients in thousandths
pub fn registers_to_coefficients(registers: &[i32; 9]) -> [f64; 9] {
    registers.map(|r| f64::from(r) / 1000.0)
}

pub fn coefficients_to_registers(coefficients: &[f64; 9]) -> [i32; 9] {
    coefficients.map(|c| (c * 1000.0).round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_mode_table() {
        assert_eq!(
            video_mode_to_pixel_coding(VideoMode::Mode160x120Yuv444),
            PixelCoding::Yuv444
        );
        assert_eq!(
            video_mode_to_pixel_coding(VideoMode::Mode1024x768Mono16),
            PixelCoding::Mono16
        );
        assert_eq!(
            video_mode_to_pixel_coding(VideoMode::Mode640x480Yuv411),
            PixelCoding::Yuv411
        );
        assert_eq!(
            video_mode_to_pixel_coding(VideoMode::Format7Mode1),
            PixelCoding::Invalid
        );
        assert_eq!(video_mode_to_pixel_coding(VideoMode::Exif), PixelCoding::Invalid);
        assert_eq!(raw_video_mode_to_pixel_coding(999), PixelCoding::Invalid);

        for mode in VideoMode::ALL {
            let coding = video_mode_to_pixel_coding(mode);
            assert_eq!(coding == PixelCoding::Invalid, !mode.is_fixed_size(), "{mode:?}");
        }
    }

    #[test]
    fn test_color_coding_table() {
        assert_eq!(raw_color_coding_to_pixel_coding(361), PixelCoding::Raw8);
        assert_eq!(raw_color_coding_to_pixel_coding(0), PixelCoding::Invalid);
        assert_eq!(
            pixel_coding_to_color_coding(PixelCoding::Rgb16S),
            Some(ColorCoding::Rgb16S)
        );
        assert_eq!(pixel_coding_to_color_coding(PixelCoding::Invalid), None);
    }

    #[test]
    fn test_tiling_table() {
        assert_eq!(color_filter_to_tiling(None), Tiling::None);
        assert_eq!(color_filter_to_tiling(Some(512)), Tiling::Rggb);
        assert_eq!(color_filter_to_tiling(Some(515)), Tiling::Bggr);
        assert_eq!(color_filter_to_tiling(Some(7)), Tiling::Invalid);
    }

    #[test]
    fn test_index_to_frame_rate() {
        assert!((index_to_frame_rate(32) - 1.875).abs() < 1e-9);
        assert!((index_to_frame_rate(36) - 30.0).abs() < 1e-9);
        assert!(index_to_frame_rate(40) < 0.0);
        assert!(index_to_frame_rate(0) < 0.0);
    }

    #[test]
    fn test_nearest_index() {
        assert_eq!(frame_rate_to_index(7.5, &[32, 34, 36]), 34);
        assert_eq!(frame_rate_to_index(25.0, &[32, 34, 36]), 36);
        assert_eq!(frame_rate_to_index(1000.0, &[32, 33]), 33);
        assert_eq!(frame_rate_to_index(0.0, &[35, 32]), 32);
        assert_eq!(frame_rate_to_index(-3.0, &[33, 34]), 33);
        assert_eq!(frame_rate_to_index(30.0, &[]), 0);
    }

    #[test]
    fn test_nearest_index_tie_keeps_first() {
        // 3.75 Hz sits exactly one step from both 1.875 Hz and 7.5 Hz
        assert_eq!(frame_rate_to_index(3.75, &[34, 32]), 34);
        assert_eq!(frame_rate_to_index(3.75, &[32, 34]), 32);
    }

    #[test]
    fn test_packets_frame_rate() {
        assert!((packets_to_frame_rate(800, 4095) - 10.0).abs() < 1e-9);
        assert!((packets_to_frame_rate(0, 4095) - 8000.0).abs() < 1e-9);
        assert!((packets_to_frame_rate(9000, 4000) - 2.0).abs() < 1e-9);

        assert_eq!(frame_rate_to_packets(10.0, 4095), 800);
        assert_eq!(frame_rate_to_packets(1.0, 4095), 4095);
        assert_eq!(frame_rate_to_packets(1e9, 4095), 1);
        assert_eq!(frame_rate_to_packets(0.0, 100), 100);
    }

    #[test]
    fn test_coefficient_registers() {
        let registers = [1000, -250, 0, 0, 1500, 0, 12, 0, 999];
        let coefficients = registers_to_coefficients(&registers);
        assert!((coefficients[1] + 0.25).abs() < 1e-12);
        assert!((coefficients[4] - 1.5).abs() < 1e-12);
        assert_eq!(coefficients_to_registers(&coefficients), registers);
    }
}
