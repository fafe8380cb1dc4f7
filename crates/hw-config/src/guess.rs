//! Best-guess configuration for cameras without a configuration file

use std::io::{self, Write};

use iidc_protocol::{CameraBus, DeviceIdentity, MAX_PACKETS_PER_FRAME};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::hardware::{bus_speed_valid, HardwareConfig};
use crate::search::{SearchPaths, ENV_PREFIX};

/// Conservative shutter unit when nothing is known about the camera
pub const DEFAULT_EXPOSURE_QUANTUM: f64 = 20e-6;

const DEFAULT_BUS_SPEED: u32 = 400;

const SEPARATOR: &str = "----------------------------------------------------------------";

/// Build a configuration from what the camera reports about itself
///
/// Bus speed and video format/mode come from the device; every timing
/// field is left at zero apart from the exposure quantum.
pub fn synthesize<B: CameraBus>(bus: &mut B) -> Result<HardwareConfig, ConfigError> {
    let mut bus_speed = bus.iso_speed()?;
    if !bus_speed_valid(bus_speed) {
        warn!("Camera reports unusual bus speed {}, assuming {}", bus_speed, DEFAULT_BUS_SPEED);
        bus_speed = DEFAULT_BUS_SPEED;
    }
    let (format, mode) = bus.video_mode()?.format_mode();
    debug!("Guessing configuration for format {} mode {}", format, mode);

    Ok(HardwareConfig {
        bus_speed,
        format,
        mode,
        max_packets: MAX_PACKETS_PER_FRAME,
        min_pixels: 1,
        trig_setup_time: 0.0,
        exposure_quantum: DEFAULT_EXPOSURE_QUANTUM,
        exposure_offset: 0.0,
        line_transfer_time: 0.0,
        transmit_setup_time: 0.0,
        transmit_overlap: false,
        drop_frames: false,
        dma_device_name: String::new(),
    })
}

/// Print the guess and instructions for turning it into a file
pub fn write_report(
    out: &mut dyn Write,
    guess: &HardwareConfig,
    identity: &DeviceIdentity,
    paths: &SearchPaths,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Could not find a hardware configuration file.")?;
    writeln!(out, "Generated a default configuration:")?;
    writeln!(out)?;
    writeln!(out, "{SEPARATOR}")?;
    write!(out, "{guess}")?;
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out)?;
    writeln!(out, "This is a best guess of the camera and its bus's hardware configuration.")?;
    writeln!(out)?;
    writeln!(out, "To create a configuration file, copy the text between (but not")?;
    writeln!(out, "including) the ----- lines into a file and edit as needed.")?;
    writeln!(out, "The filename must be one of the camera's ID strings with a")?;
    writeln!(out, "\".conf\" extension.")?;
    writeln!(out)?;
    writeln!(out, "For the current camera suitable filenames are:")?;
    let kinds = ["chip", "model", "vendor"];
    let names = [&identity.chip, &identity.model, &identity.vendor];
    for (kind, name) in kinds.iter().zip(names) {
        if !name.is_empty() {
            writeln!(out, "{name}.conf \t({kind})")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "Filenames are checked in this chip-model-vendor order in")?;
    writeln!(out, "{}.", paths.describe())?;
    writeln!(out, "By default that is the current working directory, then the")?;
    writeln!(out, "directory given by the {ENV_PREFIX}_CONF environment variable.")?;
    writeln!(out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use iidc_protocol::{MockBus, VideoMode};

    #[test]
    fn test_guess_follows_device() {
        let mut bus = MockBus::format7();
        bus.iso_speed = 800;
        bus.video_mode = VideoMode::Format7Mode2;

        let guess = synthesize(&mut bus).unwrap();
        assert_eq!(guess.bus_speed, 800);
        assert_eq!((guess.format, guess.mode), (7, 2));
        assert_eq!(guess.max_packets, MAX_PACKETS_PER_FRAME);
        assert!((guess.exposure_quantum - 20e-6).abs() < 1e-12);
        assert_eq!(guess.dma_device_name, "");
        assert!(guess.validate().is_ok());
    }

    #[test]
    fn test_unusual_bus_speed_replaced() {
        let mut bus = MockBus::new();
        bus.iso_speed = 0;
        assert_eq!(synthesize(&mut bus).unwrap().bus_speed, 400);
    }

    #[test]
    fn test_guess_fails_on_bus_error() {
        let mut bus = MockBus::new();
        bus.fail("video_mode");
        assert!(matches!(synthesize(&mut bus), Err(ConfigError::Device(_))));
    }

    #[test]
    fn test_report_layout() {
        let mut bus = MockBus::new();
        let guess = synthesize(&mut bus).unwrap();
        let identity = bus.identity.clone();
        let mut out = Vec::new();
        write_report(&mut out, &guess, &identity, &SearchPaths::new(["/etc/iidc"])).unwrap();

        let text = String::from_utf8(out).unwrap();
        let first = text.find(SEPARATOR).unwrap();
        let last = text.rfind(SEPARATOR).unwrap();
        assert!(first < last);
        let between = &text[first + SEPARATOR.len() + 1..last];
        assert_eq!(between, guess.to_string());
        assert!(text.contains(&format!("{}.conf \t(chip)", identity.chip)));
        assert!(text.contains("Mock Camera.conf \t(model)"));
        assert!(text.contains("Mock Vendor.conf \t(vendor)"));
        assert!(text.contains("/etc/iidc"));
    }
}
