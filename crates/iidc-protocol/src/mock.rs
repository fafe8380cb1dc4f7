//! Mock camera bus for testing without hardware
//!
//! Keeps an in-memory register file, records every command it receives and
//! can be told to fail selected verbs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::bus::{CameraBus, FrameId};
use crate::error::BusError;
use crate::types::{
    ColorCoding, ColorFilter, ColourCorrection, DeviceIdentity, Feature, FeatureInfo,
    TriggerPolarity, VideoMode,
};
use crate::MAX_PACKETS_PER_FRAME;

/// One command received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Identity,
    Reset,
    IsoSpeed,
    SetIsoSpeed(u32),
    VideoMode,
    SetVideoMode(VideoMode),
    CaptureSetup(u32),
    CaptureStop,
    IsoReleaseAll,
    CaptureEnqueue(FrameId),
    DmaBufferCount,
    ImageSize,
    SupportedFramerates,
    Framerate,
    SetFramerate(u32),
    Format7ImagePosition,
    SetFormat7ImagePosition(u32, u32),
    Format7ImageSize,
    SetFormat7ImageSize(u32, u32),
    Format7ColorCoding,
    SetFormat7ColorCoding(ColorCoding),
    Format7PacketsPerFrame,
    SetFormat7PacketsPerFrame(u32),
    Feature(Feature),
    SetFeature(Feature),
    Transmission,
    SetTransmission(bool),
    OneShotCapable,
    OneShot,
    SetOneShot(bool),
    ColourCorrection,
    SetColourCorrection,
    Gamma,
    SetGamma(bool),
    ColorFilter,
}

impl BusCall {
    /// Name of the bus verb, as used by `MockBus::fail`
    pub fn verb(&self) -> &'static str {
        match self {
            BusCall::Identity => "identity",
            BusCall::Reset => "reset",
            BusCall::IsoSpeed => "iso_speed",
            BusCall::SetIsoSpeed(_) => "set_iso_speed",
            BusCall::VideoMode => "video_mode",
            BusCall::SetVideoMode(_) => "set_video_mode",
            BusCall::CaptureSetup(_) => "capture_setup",
            BusCall::CaptureStop => "capture_stop",
            BusCall::IsoReleaseAll => "iso_release_all",
            BusCall::CaptureEnqueue(_) => "capture_enqueue",
            BusCall::DmaBufferCount => "dma_buffer_count",
            BusCall::ImageSize => "image_size",
            BusCall::SupportedFramerates => "supported_framerates",
            BusCall::Framerate => "framerate",
            BusCall::SetFramerate(_) => "set_framerate",
            BusCall::Format7ImagePosition => "format7_image_position",
            BusCall::SetFormat7ImagePosition(..) => "set_format7_image_position",
            BusCall::Format7ImageSize => "format7_image_size",
            BusCall::SetFormat7ImageSize(..) => "set_format7_image_size",
            BusCall::Format7ColorCoding => "format7_color_coding",
            BusCall::SetFormat7ColorCoding(_) => "set_format7_color_coding",
            BusCall::Format7PacketsPerFrame => "format7_packets_per_frame",
            BusCall::SetFormat7PacketsPerFrame(_) => "set_format7_packets_per_frame",
            BusCall::Feature(_) => "feature",
            BusCall::SetFeature(_) => "set_feature",
            BusCall::Transmission => "transmission",
            BusCall::SetTransmission(_) => "set_transmission",
            BusCall::OneShotCapable => "one_shot_capable",
            BusCall::OneShot => "one_shot",
            BusCall::SetOneShot(_) => "set_one_shot",
            BusCall::ColourCorrection => "colour_correction",
            BusCall::SetColourCorrection => "set_colour_correction",
            BusCall::Gamma => "gamma",
            BusCall::SetGamma(_) => "set_gamma",
            BusCall::ColorFilter => "color_filter",
        }
    }
}

/// In-memory IIDC camera
#[derive(Debug, Clone)]
pub struct MockBus {
    pub identity: DeviceIdentity,
    pub iso_speed: u32,
    pub video_mode: VideoMode,
    pub dma_buffers: u32,
    pub capturing: bool,
    pub supported_framerates: Vec<u32>,
    pub framerate: u32,
    pub format7_position: (u32, u32),
    pub format7_size: (u32, u32),
    pub format7_coding: ColorCoding,
    pub format7_packets: u32,
    pub features: HashMap<Feature, FeatureInfo>,
    pub transmission: bool,
    pub one_shot_capable: bool,
    pub one_shot: bool,
    pub colour_correction: Option<ColourCorrection>,
    pub gamma: Option<bool>,
    pub color_filter: Option<u32>,
    /// Every command received, in order
    pub calls: Vec<BusCall>,
    failing: HashSet<&'static str>,
    journal: Option<Arc<Mutex<Vec<BusCall>>>>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBus {
    /// A fixed-format 640x480 monochrome camera
    pub fn new() -> Self {
        let mut trigger = FeatureInfo::new(Feature::Trigger, 0, 0, 0);
        trigger.on_off_capable = true;
        trigger.is_on = false;

        let mut white_balance = FeatureInfo::new(Feature::WhiteBalance, 0, 1023, 0);
        white_balance.bu_value = 512;
        white_balance.rv_value = 256;

        let features = [
            FeatureInfo::new(Feature::Brightness, 0, 255, 64),
            FeatureInfo::new(Feature::Gain, 0, 680, 170),
            FeatureInfo::new(Feature::Shutter, 1, 4095, 500),
            white_balance,
            trigger,
        ]
        .into_iter()
        .map(|info| (info.id, info))
        .collect();

        Self {
            identity: DeviceIdentity::new("Mock Vendor", "Mock Camera", 0x0814_4360_0000_0001),
            iso_speed: 400,
            video_mode: VideoMode::Mode640x480Mono8,
            dma_buffers: 0,
            capturing: false,
            supported_framerates: vec![32, 33, 34, 35, 36, 37],
            framerate: 36,
            format7_position: (0, 0),
            format7_size: (1280, 960),
            format7_coding: ColorCoding::Raw8,
            format7_packets: 800,
            features,
            transmission: false,
            one_shot_capable: true,
            one_shot: false,
            colour_correction: None,
            gamma: None,
            color_filter: None,
            calls: Vec::new(),
            failing: HashSet::new(),
            journal: None,
        }
    }

    /// A Format 7 colour camera with vendor colour correction and gamma
    pub fn format7() -> Self {
        Self {
            identity: DeviceIdentity::new("Mock Vendor", "Mock Scalable", 0x0814_4360_0000_0002),
            video_mode: VideoMode::Format7Mode0,
            supported_framerates: Vec::new(),
            colour_correction: Some(ColourCorrection {
                enabled: true,
                registers: [1000, 0, 0, 0, 1000, 0, 0, 0, 1000],
            }),
            gamma: Some(false),
            color_filter: Some(ColorFilter::Rggb.as_raw()),
            ..Self::new()
        }
    }

    /// Make every later call of `verb` fail
    pub fn fail(&mut self, verb: &'static str) {
        self.failing.insert(verb);
    }

    /// Stop failing `verb`
    pub fn heal(&mut self, verb: &'static str) {
        self.failing.remove(verb);
    }

    /// Emulate the end of a one-shot exposure: the register self-clears
    pub fn complete_one_shot(&mut self) {
        self.one_shot = false;
    }

    /// Replace a feature record
    pub fn set_feature_info(&mut self, info: FeatureInfo) {
        self.features.insert(info.id, info);
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: &BusCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Call log shared with the caller
    ///
    /// Stays readable after the mock has been moved into, and dropped by,
    /// its owner. Only calls made after the first request are logged.
    pub fn journal(&mut self) -> Arc<Mutex<Vec<BusCall>>> {
        Arc::clone(self.journal.get_or_insert_with(Default::default))
    }

    fn record(&mut self, call: BusCall) -> Result<(), BusError> {
        let verb = call.verb();
        debug!("mock bus: {:?}", call);
        if let Some(journal) = &self.journal {
            if let Ok(mut log) = journal.lock() {
                log.push(call.clone());
            }
        }
        self.calls.push(call);
        if self.failing.contains(verb) {
            return Err(BusError::CommandFailed { verb, code: -1 });
        }
        Ok(())
    }
}

impl CameraBus for MockBus {
    fn identity(&mut self) -> Result<DeviceIdentity, BusError> {
        self.record(BusCall::Identity)?;
        Ok(self.identity.clone())
    }

    fn reset(&mut self) -> Result<(), BusError> {
        self.record(BusCall::Reset)?;
        self.transmission = false;
        self.one_shot = false;
        Ok(())
    }

    fn iso_speed(&mut self) -> Result<u32, BusError> {
        self.record(BusCall::IsoSpeed)?;
        Ok(self.iso_speed)
    }

    fn set_iso_speed(&mut self, mbps: u32) -> Result<(), BusError> {
        self.record(BusCall::SetIsoSpeed(mbps))?;
        self.iso_speed = mbps;
        Ok(())
    }

    fn video_mode(&mut self) -> Result<VideoMode, BusError> {
        self.record(BusCall::VideoMode)?;
        Ok(self.video_mode)
    }

    fn set_video_mode(&mut self, mode: VideoMode) -> Result<(), BusError> {
        self.record(BusCall::SetVideoMode(mode))?;
        self.video_mode = mode;
        Ok(())
    }

    fn capture_setup(&mut self, _dma_device: &str, num_buffers: u32) -> Result<(), BusError> {
        self.record(BusCall::CaptureSetup(num_buffers))?;
        self.dma_buffers = num_buffers;
        self.capturing = true;
        Ok(())
    }

    fn capture_stop(&mut self) -> Result<(), BusError> {
        self.record(BusCall::CaptureStop)?;
        self.capturing = false;
        Ok(())
    }

    fn iso_release_all(&mut self) -> Result<(), BusError> {
        self.record(BusCall::IsoReleaseAll)
    }

    fn capture_enqueue(&mut self, frame: FrameId) -> Result<(), BusError> {
        self.record(BusCall::CaptureEnqueue(frame))
    }

    fn dma_buffer_count(&mut self) -> Result<u32, BusError> {
        self.record(BusCall::DmaBufferCount)?;
        Ok(self.dma_buffers)
    }

    fn image_size(&mut self, mode: VideoMode) -> Result<(u32, u32), BusError> {
        self.record(BusCall::ImageSize)?;
        let size = match mode {
            VideoMode::Mode160x120Yuv444 => (160, 120),
            VideoMode::Mode320x240Yuv422 => (320, 240),
            VideoMode::Mode640x480Yuv411
            | VideoMode::Mode640x480Yuv422
            | VideoMode::Mode640x480Rgb8
            | VideoMode::Mode640x480Mono8
            | VideoMode::Mode640x480Mono16 => (640, 480),
            VideoMode::Mode800x600Yuv422
            | VideoMode::Mode800x600Rgb8
            | VideoMode::Mode800x600Mono8
            | VideoMode::Mode800x600Mono16 => (800, 600),
            VideoMode::Mode1024x768Yuv422
            | VideoMode::Mode1024x768Rgb8
            | VideoMode::Mode1024x768Mono8
            | VideoMode::Mode1024x768Mono16 => (1024, 768),
            VideoMode::Mode1280x960Yuv422
            | VideoMode::Mode1280x960Rgb8
            | VideoMode::Mode1280x960Mono8
            | VideoMode::Mode1280x960Mono16 => (1280, 960),
            VideoMode::Mode1600x1200Yuv422
            | VideoMode::Mode1600x1200Rgb8
            | VideoMode::Mode1600x1200Mono8
            | VideoMode::Mode1600x1200Mono16 => (1600, 1200),
            _ => return Err(BusError::NotSupported("image size of a non-fixed mode")),
        };
        Ok(size)
    }

    fn supported_framerates(&mut self, _mode: VideoMode) -> Result<Vec<u32>, BusError> {
        self.record(BusCall::SupportedFramerates)?;
        Ok(self.supported_framerates.clone())
    }

    fn framerate(&mut self) -> Result<u32, BusError> {
        self.record(BusCall::Framerate)?;
        Ok(self.framerate)
    }

    fn set_framerate(&mut self, index: u32) -> Result<(), BusError> {
        self.record(BusCall::SetFramerate(index))?;
        if !self.supported_framerates.contains(&index) {
            return Err(BusError::ValueRejected {
                verb: "set_framerate",
                value: i64::from(index),
            });
        }
        self.framerate = index;
        Ok(())
    }

    fn format7_image_position(&mut self, _mode: VideoMode) -> Result<(u32, u32), BusError> {
        self.record(BusCall::Format7ImagePosition)?;
        Ok(self.format7_position)
    }

    fn set_format7_image_position(
        &mut self,
        _mode: VideoMode,
        left: u32,
        top: u32,
    ) -> Result<(), BusError> {
        self.record(BusCall::SetFormat7ImagePosition(left, top))?;
        self.format7_position = (left, top);
        Ok(())
    }

    fn format7_image_size(&mut self, _mode: VideoMode) -> Result<(u32, u32), BusError> {
        self.record(BusCall::Format7ImageSize)?;
        Ok(self.format7_size)
    }

    fn set_format7_image_size(
        &mut self,
        _mode: VideoMode,
        width: u32,
        height: u32,
    ) -> Result<(), BusError> {
        self.record(BusCall::SetFormat7ImageSize(width, height))?;
        self.format7_size = (width, height);
        Ok(())
    }

    fn format7_color_coding(&mut self, _mode: VideoMode) -> Result<ColorCoding, BusError> {
        self.record(BusCall::Format7ColorCoding)?;
        Ok(self.format7_coding)
    }

    fn set_format7_color_coding(
        &mut self,
        _mode: VideoMode,
        coding: ColorCoding,
    ) -> Result<(), BusError> {
        self.record(BusCall::SetFormat7ColorCoding(coding))?;
        self.format7_coding = coding;
        Ok(())
    }

    fn format7_packets_per_frame(&mut self, _mode: VideoMode) -> Result<u32, BusError> {
        self.record(BusCall::Format7PacketsPerFrame)?;
        Ok(self.format7_packets)
    }

    fn set_format7_packets_per_frame(
        &mut self,
        _mode: VideoMode,
        packets: u32,
    ) -> Result<u32, BusError> {
        self.record(BusCall::SetFormat7PacketsPerFrame(packets))?;
        self.format7_packets = packets.clamp(1, MAX_PACKETS_PER_FRAME);
        Ok(self.format7_packets)
    }

    fn feature(&mut self, id: Feature) -> Result<FeatureInfo, BusError> {
        self.record(BusCall::Feature(id))?;
        Ok(self
            .features
            .get(&id)
            .cloned()
            .unwrap_or_else(|| FeatureInfo::absent(id)))
    }

    fn set_feature(&mut self, info: &FeatureInfo) -> Result<(), BusError> {
        self.record(BusCall::SetFeature(info.id))?;
        let stored = self
            .features
            .get_mut(&info.id)
            .filter(|stored| stored.available)
            .ok_or(BusError::NotSupported("feature"))?;

        let checked = if info.id == Feature::WhiteBalance {
            vec![info.bu_value, info.rv_value]
        } else {
            vec![info.value]
        };
        let (low, high) = (stored.min.min(stored.max), stored.min.max(stored.max));
        for value in checked {
            if value < low || value > high {
                return Err(BusError::ValueRejected {
                    verb: "set_feature",
                    value: i64::from(value),
                });
            }
        }

        stored.value = info.value;
        stored.bu_value = info.bu_value;
        stored.rv_value = info.rv_value;
        if stored.on_off_capable {
            stored.is_on = info.is_on;
        }
        stored.trigger_polarity = info.trigger_polarity;
        Ok(())
    }

    fn transmission(&mut self) -> Result<bool, BusError> {
        self.record(BusCall::Transmission)?;
        Ok(self.transmission)
    }

    fn set_transmission(&mut self, on: bool) -> Result<(), BusError> {
        self.record(BusCall::SetTransmission(on))?;
        self.transmission = on;
        Ok(())
    }

    fn one_shot_capable(&mut self) -> Result<bool, BusError> {
        self.record(BusCall::OneShotCapable)?;
        Ok(self.one_shot_capable)
    }

    fn one_shot(&mut self) -> Result<bool, BusError> {
        self.record(BusCall::OneShot)?;
        Ok(self.one_shot)
    }

    fn set_one_shot(&mut self, on: bool) -> Result<(), BusError> {
        self.record(BusCall::SetOneShot(on))?;
        if !self.one_shot_capable {
            return Err(BusError::NotSupported("one-shot"));
        }
        self.one_shot = on;
        Ok(())
    }

    fn colour_correction(&mut self) -> Result<Option<ColourCorrection>, BusError> {
        self.record(BusCall::ColourCorrection)?;
        Ok(self.colour_correction)
    }

    fn set_colour_correction(&mut self, correction: &ColourCorrection) -> Result<(), BusError> {
        self.record(BusCall::SetColourCorrection)?;
        match self.colour_correction.as_mut() {
            Some(current) => {
                *current = *correction;
                Ok(())
            }
            None => Err(BusError::NotSupported("colour correction")),
        }
    }

    fn gamma(&mut self) -> Result<Option<bool>, BusError> {
        self.record(BusCall::Gamma)?;
        Ok(self.gamma)
    }

    fn set_gamma(&mut self, on: bool) -> Result<(), BusError> {
        self.record(BusCall::SetGamma(on))?;
        match self.gamma.as_mut() {
            Some(current) => {
                *current = on;
                Ok(())
            }
            None => Err(BusError::NotSupported("gamma")),
        }
    }

    fn color_filter(&mut self) -> Result<Option<u32>, BusError> {
        self.record(BusCall::ColorFilter)?;
        Ok(self.color_filter)
    }
}

/// Trigger polarity helper for building mock trigger records
pub fn trigger_feature(polarity: TriggerPolarity, is_on: bool) -> FeatureInfo {
    let mut trigger = FeatureInfo::new(Feature::Trigger, 0, 0, 0);
    trigger.on_off_capable = true;
    trigger.is_on = is_on;
    trigger.trigger_polarity = polarity;
    trigger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mut bus = MockBus::new();
        bus.set_transmission(true).unwrap();
        assert!(bus.transmission().unwrap());
        assert_eq!(
            bus.calls,
            vec![BusCall::SetTransmission(true), BusCall::Transmission]
        );
    }

    #[test]
    fn test_journal_outlives_mock() {
        let mut bus = MockBus::new();
        bus.reset().unwrap();
        let journal = bus.journal();
        bus.capture_stop().unwrap();
        drop(bus);
        assert_eq!(*journal.lock().unwrap(), vec![BusCall::CaptureStop]);
    }

    #[test]
    fn test_mock_failure_injection() {
        let mut bus = MockBus::new();
        bus.fail("set_one_shot");
        let err = bus.set_one_shot(true).unwrap_err();
        assert_eq!(
            err,
            BusError::CommandFailed {
                verb: "set_one_shot",
                code: -1
            }
        );
        assert!(!bus.one_shot);

        bus.heal("set_one_shot");
        bus.set_one_shot(true).unwrap();
        assert!(bus.one_shot);
    }

    #[test]
    fn test_mock_rejects_out_of_range_feature() {
        let mut bus = MockBus::new();
        let mut gain = bus.feature(Feature::Gain).unwrap();
        gain.value = gain.max + 1;
        assert!(bus.set_feature(&gain).is_err());
    }

    #[test]
    fn test_one_shot_self_clear() {
        let mut bus = MockBus::new();
        bus.set_one_shot(true).unwrap();
        bus.complete_one_shot();
        assert!(!bus.one_shot().unwrap());
    }

    #[test]
    fn test_absent_feature() {
        let mut bus = MockBus::new();
        bus.features.remove(&Feature::Gain);
        let gain = bus.feature(Feature::Gain).unwrap();
        assert!(!gain.available);
    }
}
