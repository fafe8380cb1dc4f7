//! Hardware Configuration Record
//!
//! One record per file, a header line followed by labelled fields in a
//! fixed order. Reading mirrors writing exactly, so a saved record parses
//! back to the same values.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use iidc_protocol::VideoMode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// First line of every configuration file
pub const HEADER: &str = "IEEE 1394 IIDC DCAM hardware configuration:";

/// Field labels in file order; the twelfth scanned field is `drop_frames`
const LABELS: [&str; 13] = [
    "bus_speed:",
    "format:",
    "mode:",
    "max_packets:",
    "min_pixels:",
    "trig_setup_time:",
    "exposure_quantum:",
    "exposure_offset:",
    "line_transfer_time:",
    "transmit_setup_time:",
    "transmit_overlap:",
    "drop_frames:",
    "dma_device_name:",
];

/// Number of fields that must scan for a record to be accepted
pub const REQUIRED_FIELDS: usize = 12;

/// Per-device bus and timing description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Isochronous bus speed in Mb/s
    pub bus_speed: u32,
    /// IIDC format number (0-2, 6 or 7)
    pub format: u32,
    /// Mode number within the format
    pub mode: u32,
    /// Upper limit on packets per frame in scalable formats
    pub max_packets: u32,
    /// Smallest pixel count the camera accepts per frame
    pub min_pixels: u32,
    /// Delay between trigger edge and exposure start, seconds
    pub trig_setup_time: f64,
    /// Shutter register unit, seconds
    pub exposure_quantum: f64,
    /// Shutter time at register value zero, seconds
    pub exposure_offset: f64,
    /// Read-out time per image line, seconds
    pub line_transfer_time: f64,
    /// Delay before the first packet of a frame, seconds
    pub transmit_setup_time: f64,
    /// Transmission may overlap the next exposure
    pub transmit_overlap: bool,
    /// Camera drops frames when the DMA ring is full
    pub drop_frames: bool,
    /// DMA device node; empty selects the library default
    pub dma_device_name: String,
}

/// `bus_speed` must be 100 Mb/s times a power of two
pub fn bus_speed_valid(bus_speed: u32) -> bool {
    bus_speed % 100 == 0 && (bus_speed / 100).count_ones() == 1
}

fn bool_field(value: bool) -> u32 {
    u32::from(value)
}

impl HardwareConfig {
    /// Parse and validate one record
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut scanner = Scanner::new(text);
        if !scanner.header() {
            return Err(ConfigError::Parse { fields_scanned: 0 });
        }

        let bus_speed = scanner.field(0)?;
        let format = scanner.field(1)?;
        let mode = scanner.field(2)?;
        let max_packets = scanner.field(3)?;
        let min_pixels = scanner.field(4)?;
        let trig_setup_time = scanner.field(5)?;
        let exposure_quantum = scanner.field(6)?;
        let exposure_offset = scanner.field(7)?;
        let line_transfer_time = scanner.field(8)?;
        let transmit_setup_time = scanner.field(9)?;
        let transmit_overlap: i64 = scanner.field(10)?;
        let drop_frames: i64 = scanner.field(11)?;
        let dma_device_name = scanner.trailing_text();

        let config = Self {
            bus_speed,
            format,
            mode,
            max_packets,
            min_pixels,
            trig_setup_time,
            exposure_quantum,
            exposure_offset,
            line_transfer_time,
            transmit_setup_time,
            transmit_overlap: transmit_overlap != 0,
            drop_frames: drop_frames != 0,
            dma_device_name,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the bus speed constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if bus_speed_valid(self.bus_speed) {
            Ok(())
        } else {
            warn!("Invalid bus_speed {} in hardware configuration", self.bus_speed);
            Err(ConfigError::InvalidBusSpeed(self.bus_speed))
        }
    }

    /// Read and parse a configuration file
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Parsing hardware configuration {}", path.display());
        Self::parse(&text)
    }

    /// Save the record in the on-disk format
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Video mode named by the format/mode pair
    pub fn video_mode(&self) -> Option<VideoMode> {
        VideoMode::from_format_mode(self.format, self.mode)
    }
}

impl FromStr for HardwareConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HardwareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        let values: [String; 13] = [
            self.bus_speed.to_string(),
            self.format.to_string(),
            self.mode.to_string(),
            self.max_packets.to_string(),
            self.min_pixels.to_string(),
            self.trig_setup_time.to_string(),
            self.exposure_quantum.to_string(),
            self.exposure_offset.to_string(),
            self.line_transfer_time.to_string(),
            self.transmit_setup_time.to_string(),
            bool_field(self.transmit_overlap).to_string(),
            bool_field(self.drop_frames).to_string(),
            self.dma_device_name.clone(),
        ];
        for (label, value) in LABELS.iter().zip(values) {
            writeln!(f, "  {label:<21}{value}")?;
        }
        Ok(())
    }
}

/// Sequential field scanner; stops counting at the first mismatch
struct Scanner<'a> {
    lines: std::str::Lines<'a>,
    scanned: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            scanned: 0,
        }
    }

    fn next_nonblank(&mut self) -> Option<&'a str> {
        self.lines.by_ref().map(str::trim).find(|line| !line.is_empty())
    }

    fn header(&mut self) -> bool {
        self.next_nonblank() == Some(HEADER)
    }

    fn field<T: FromStr>(&mut self, index: usize) -> Result<T, ConfigError> {
        let parsed = self
            .next_nonblank()
            .and_then(|line| line.strip_prefix(LABELS[index]))
            .and_then(|value| value.trim().parse().ok());
        match parsed {
            Some(value) => {
                self.scanned += 1;
                Ok(value)
            }
            None => {
                debug!(
                    "Hardware configuration scan stopped at {} after {} fields",
                    LABELS[index], self.scanned
                );
                Err(ConfigError::Parse {
                    fields_scanned: self.scanned,
                })
            }
        }
    }

    fn trailing_text(&mut self) -> String {
        self.next_nonblank()
            .and_then(|line| line.strip_prefix(LABELS[REQUIRED_FIELDS]))
            .map(|name| name.trim().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> HardwareConfig {
        HardwareConfig {
            bus_speed: 400,
            format: 7,
            mode: 0,
            max_packets: 4095,
            min_pixels: 1,
            trig_setup_time: 0.0,
            exposure_quantum: 0.00002,
            exposure_offset: 0.0,
            line_transfer_time: 0.0,
            transmit_setup_time: 0.0,
            transmit_overlap: false,
            drop_frames: false,
            dma_device_name: "/dev/video1394/0".to_string(),
        }
    }

    #[test]
    fn test_write_layout() {
        let text = sample().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 14);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "  bus_speed:           400");
        assert_eq!(lines[7], "  exposure_quantum:    0.00002");
        assert_eq!(lines[10], "  transmit_setup_time: 0");
        assert_eq!(lines[13], "  dma_device_name:     /dev/video1394/0");
    }

    #[test]
    fn test_parse_written_record() {
        let parsed = HardwareConfig::parse(&sample().to_string()).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(parsed.video_mode(), Some(VideoMode::Format7Mode0));
    }

    #[test]
    fn test_empty_device_name_is_accepted() {
        let mut config = sample();
        config.dma_device_name.clear();
        let parsed: HardwareConfig = config.to_string().parse().unwrap();
        assert_eq!(parsed.dma_device_name, "");
    }

    #[test]
    fn test_blank_line_before_device_name() {
        let text = sample()
            .to_string()
            .replace("  dma_device_name:", "\n  dma_device_name:");
        let parsed = HardwareConfig::parse(&text).unwrap();
        assert_eq!(parsed.dma_device_name, sample().dma_device_name);
        assert!(!parsed.dma_device_name.is_empty());
    }

    #[test]
    fn test_truncated_record_reports_scanned_fields() {
        let text: String = sample().to_string().lines().take(6).map(|l| format!("{l}\n")).collect();
        match HardwareConfig::parse(&text) {
            Err(ConfigError::Parse { fields_scanned }) => assert_eq!(fields_scanned, 5),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_bad_value_stops_scan() {
        let text = sample().to_string().replace("min_pixels:          1", "min_pixels:          x");
        match HardwareConfig::parse(&text) {
            Err(ConfigError::Parse { fields_scanned }) => assert_eq!(fields_scanned, 4),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_header() {
        let text = sample().to_string().replacen("IEEE", "USB", 1);
        assert!(matches!(
            HardwareConfig::parse(&text),
            Err(ConfigError::Parse { fields_scanned: 0 })
        ));
    }

    #[test]
    fn test_bus_speed_validation() {
        for speed in [100, 200, 400, 800, 1600, 3200] {
            assert!(bus_speed_valid(speed), "{speed} should be accepted");
        }
        for speed in [0, 150, 300, 900] {
            assert!(!bus_speed_valid(speed), "{speed} should be rejected");
        }

        let mut config = sample();
        config.bus_speed = 300;
        let err = HardwareConfig::parse(&config.to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBusSpeed(300)));
        assert!(err.is_invalid());
    }

    #[test]
    fn test_nonzero_flags_read_as_true() {
        let text = sample()
            .to_string()
            .replace("transmit_overlap:    0", "transmit_overlap:    2");
        assert!(HardwareConfig::parse(&text).unwrap().transmit_overlap);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            shift in 0u32..6,
            format in prop_oneof![Just(0u32), Just(1), Just(2), Just(7)],
            mode in 0u32..7,
            max_packets in 1u32..4096,
            min_pixels in 0u32..10_000,
            times in proptest::array::uniform5(0.0f64..1.0),
            transmit_overlap: bool,
            drop_frames: bool,
            name in "[a-z0-9/_]{0,20}",
        ) {
            let config = HardwareConfig {
                bus_speed: 100 << shift,
                format,
                mode,
                max_packets,
                min_pixels,
                trig_setup_time: times[0],
                exposure_quantum: times[1],
                exposure_offset: times[2],
                line_transfer_time: times[3],
                transmit_setup_time: times[4],
                transmit_overlap,
                drop_frames,
                dma_device_name: name,
            };
            let parsed = HardwareConfig::parse(&config.to_string()).unwrap();
            prop_assert_eq!(parsed, config);
        }
    }
}
