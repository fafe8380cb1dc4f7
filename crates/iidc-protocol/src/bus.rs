//! Camera Bus Command Interface
//!
//! The verbs the control layer needs from the register/transport library.
//! Every call is synchronous and either completes or reports a `BusError`.

use crate::error::BusError;
use crate::types::{ColorCoding, ColourCorrection, DeviceIdentity, Feature, FeatureInfo, VideoMode};

/// Opaque handle of a captured frame buffer owned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// Register-level access to one IIDC camera
pub trait CameraBus {
    /// Vendor, model and GUID of the camera
    fn identity(&mut self) -> Result<DeviceIdentity, BusError>;

    /// Reset the camera to factory defaults (not supported by every camera)
    fn reset(&mut self) -> Result<(), BusError>;

    /// Isochronous bus speed in Mb/s
    fn iso_speed(&mut self) -> Result<u32, BusError>;

    /// Set the isochronous bus speed in Mb/s
    fn set_iso_speed(&mut self, mbps: u32) -> Result<(), BusError>;

    /// Current video mode
    fn video_mode(&mut self) -> Result<VideoMode, BusError>;

    /// Select a video mode
    fn set_video_mode(&mut self, mode: VideoMode) -> Result<(), BusError>;

    /// Set up DMA capture with the given number of frame buffers
    fn capture_setup(&mut self, dma_device: &str, num_buffers: u32) -> Result<(), BusError>;

    /// Stop DMA capture
    fn capture_stop(&mut self) -> Result<(), BusError>;

    /// Release every isochronous channel and bandwidth allocation
    fn iso_release_all(&mut self) -> Result<(), BusError>;

    /// Hand a captured frame buffer back to the DMA ring
    fn capture_enqueue(&mut self, frame: FrameId) -> Result<(), BusError>;

    /// Number of frame buffers in the DMA ring
    fn dma_buffer_count(&mut self) -> Result<u32, BusError>;

    /// Image width and height of a fixed-size video mode
    fn image_size(&mut self, mode: VideoMode) -> Result<(u32, u32), BusError>;

    /// Frame-rate indices supported in a fixed-size video mode
    fn supported_framerates(&mut self, mode: VideoMode) -> Result<Vec<u32>, BusError>;

    /// Current fixed-format frame-rate index
    fn framerate(&mut self) -> Result<u32, BusError>;

    /// Select a fixed-format frame-rate index
    fn set_framerate(&mut self, index: u32) -> Result<(), BusError>;

    /// Format 7 image offset (left, top)
    fn format7_image_position(&mut self, mode: VideoMode) -> Result<(u32, u32), BusError>;

    /// Set the Format 7 image offset
    fn set_format7_image_position(
        &mut self,
        mode: VideoMode,
        left: u32,
        top: u32,
    ) -> Result<(), BusError>;

    /// Format 7 image size (width, height)
    fn format7_image_size(&mut self, mode: VideoMode) -> Result<(u32, u32), BusError>;

    /// Set the Format 7 image size
    fn set_format7_image_size(
        &mut self,
        mode: VideoMode,
        width: u32,
        height: u32,
    ) -> Result<(), BusError>;

    /// Format 7 color coding
    fn format7_color_coding(&mut self, mode: VideoMode) -> Result<ColorCoding, BusError>;

    /// Set the Format 7 color coding
    fn set_format7_color_coding(
        &mut self,
        mode: VideoMode,
        coding: ColorCoding,
    ) -> Result<(), BusError>;

    /// Isochronous packets needed per Format 7 frame
    fn format7_packets_per_frame(&mut self, mode: VideoMode) -> Result<u32, BusError>;

    /// Request a packets-per-frame value; returns the value the camera accepted
    fn set_format7_packets_per_frame(
        &mut self,
        mode: VideoMode,
        packets: u32,
    ) -> Result<u32, BusError>;

    /// Raw capability record of one feature
    fn feature(&mut self, id: Feature) -> Result<FeatureInfo, BusError>;

    /// Write value, on/off state and trigger polarity of one feature
    fn set_feature(&mut self, info: &FeatureInfo) -> Result<(), BusError>;

    /// Continuous isochronous transmission state
    fn transmission(&mut self) -> Result<bool, BusError>;

    /// Switch continuous isochronous transmission on or off
    fn set_transmission(&mut self, on: bool) -> Result<(), BusError>;

    /// Camera implements the one-shot register
    fn one_shot_capable(&mut self) -> Result<bool, BusError>;

    /// One-shot register; self-clears after the frame is sent
    fn one_shot(&mut self) -> Result<bool, BusError>;

    /// Set or clear the one-shot register
    fn set_one_shot(&mut self, on: bool) -> Result<(), BusError>;

    /// Vendor colour-correction registers, `None` when not implemented
    fn colour_correction(&mut self) -> Result<Option<ColourCorrection>, BusError>;

    /// Write the vendor colour-correction registers
    fn set_colour_correction(&mut self, correction: &ColourCorrection) -> Result<(), BusError>;

    /// Vendor gamma state, `None` when not implemented
    fn gamma(&mut self) -> Result<Option<bool>, BusError>;

    /// Switch vendor gamma correction on or off
    fn set_gamma(&mut self, on: bool) -> Result<(), BusError>;

    /// Raw color filter id of the sensor, `None` for sensors without a filter array
    fn color_filter(&mut self) -> Result<Option<u32>, BusError>;
}
