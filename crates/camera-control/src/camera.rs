//! Camera Session
//!
//! `Camera` owns one camera bus handle together with its session state:
//! the resolved hardware configuration, the probed vendor extras and the
//! settings shadow. Creating a camera resolves its configuration, resets
//! it, applies settings and connects the capture path. Tearing it down
//! stops acquisition and releases the capture path exactly once.

use std::fmt;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use hw_config::{ConfigError, HardwareConfig, Resolver, SearchPaths};
use iidc_protocol::{
    CameraBus, DeviceIdentity, Feature, FeatureInfo, FrameId, TriggerPolarity, VideoMode,
};
use tracing::{debug, error, info, warn};

use crate::convert::{
    coefficients_to_registers, color_coding_to_pixel_coding, frame_rate_to_index,
    frame_rate_to_packets, index_to_frame_rate, packets_to_frame_rate,
    pixel_coding_to_color_coding, registers_to_coefficients, video_mode_to_pixel_coding,
};
use crate::defaults::{configured_mode, factory_settings};
use crate::error::CameraError;
use crate::feature::{
    default_shutter, denormalize_brightness, denormalize_gain, denormalize_white_balance,
    normalize_brightness, normalize_gain, normalize_white_balance, probe, probe_colour_correction,
    probe_gamma, probe_tiling, probe_trigger, register_seconds, shutter_register,
};
use crate::run_stop::{
    plan_from_device, plan_from_shadow, plan_mode_switch, AcquisitionMode, RunState,
};
use crate::settings::{CameraSettings, PixelCoding, Tiling};
use crate::shadow::Shadow;

/// Frame periods to wait after stopping before the capture path is released
const TEARDOWN_FRAME_PERIODS: f64 = 1.5;

/// What to do when no configuration file exists for the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFallback {
    /// Fail with `ConfigurationNotFound`
    #[default]
    Abort,
    /// Carry on with the synthesized guess
    UseGuess,
}

/// Options for `Camera::create`
pub struct CreateOptions {
    pub fallback: ConfigFallback,
    /// Pause after a failed reset to let the camera recover
    pub reset_pause: Duration,
    /// Configuration search directories; `None` reads the environment
    pub search_paths: Option<SearchPaths>,
    /// Where the best-guess report goes; `None` is standard error
    pub report: Option<Box<dyn Write + Send>>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            fallback: ConfigFallback::Abort,
            reset_pause: Duration::from_secs(1),
            search_paths: None,
            report: None,
        }
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("fallback", &self.fallback)
            .field("reset_pause", &self.reset_pause)
            .field("search_paths", &self.search_paths)
            .field("report", &self.report.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl CreateOptions {
    pub fn with_fallback(mut self, fallback: ConfigFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_reset_pause(mut self, pause: Duration) -> Self {
        self.reset_pause = pause;
        self
    }

    pub fn with_search_paths(mut self, paths: SearchPaths) -> Self {
        self.search_paths = Some(paths);
        self
    }

    pub fn with_report(mut self, report: Box<dyn Write + Send>) -> Self {
        self.report = Some(report);
        self
    }
}

/// Vendor and optional capabilities probed at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extras {
    pub single_shot_capable: bool,
    pub colour_correction: bool,
    pub gamma: bool,
    pub tiling: Tiling,
}

impl Extras {
    pub fn probe<B: CameraBus>(bus: &mut B) -> Result<Self, CameraError> {
        Ok(Self {
            single_shot_capable: bus.one_shot_capable()?,
            colour_correction: probe_colour_correction(bus)?.is_some(),
            gamma: probe_gamma(bus)?,
            tiling: probe_tiling(bus)?,
        })
    }
}

/// Per-handle state
#[derive(Debug, Clone)]
pub struct SessionState {
    pub extras: Extras,
    /// Resolved once and never re-read during the session
    pub config: HardwareConfig,
    pub mode: VideoMode,
    pub shadow: Shadow,
    pub connected: bool,
    /// Frame handed out to the caller and not yet returned
    pub held_frame: Option<FrameId>,
}

/// An open IIDC camera
pub struct Camera<B: CameraBus> {
    bus: B,
    session: SessionState,
    torn_down: bool,
}

impl<B: CameraBus> fmt::Debug for Camera<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("session", &self.session)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

fn skip_unsupported(result: Result<(), CameraError>) -> Result<(), CameraError> {
    match result {
        Err(CameraError::Unsupported(what)) => {
            debug!("Skipping setting: {} not supported", what);
            Ok(())
        }
        other => other,
    }
}

impl<B: CameraBus> Camera<B> {
    /// Open a camera with its factory default settings
    pub fn create(mut bus: B, mut options: CreateOptions) -> Result<Self, CameraError> {
        let config = resolve_config(&mut bus, &mut options)?;
        let settings = factory_settings(&mut bus, &config, options.reset_pause)?;
        Self::open(bus, config, settings)
    }

    /// Open a camera and apply the given settings
    pub fn create_with_settings(
        mut bus: B,
        settings: CameraSettings,
        mut options: CreateOptions,
    ) -> Result<Self, CameraError> {
        if settings.num_frame_buffers < 1 {
            return Err(CameraError::InvalidArgument(
                "num_frame_buffers must be at least 1".to_string(),
            ));
        }
        let config = resolve_config(&mut bus, &mut options)?;
        Self::open(bus, config, settings)
    }

    fn open(bus: B, config: HardwareConfig, settings: CameraSettings) -> Result<Self, CameraError> {
        let mode = configured_mode(&config)?;
        let mut camera = Self {
            bus,
            session: SessionState {
                extras: Extras::default(),
                config,
                mode,
                shadow: Shadow::new(settings.clone()),
                connected: false,
                held_frame: None,
            },
            torn_down: false,
        };

        if let Err(e) = camera.connect(&settings) {
            error!("Failed to connect camera: {}", e);
            camera.torn_down = true;
            camera.disconnect();
            return Err(e);
        }
        info!(
            "Camera connected: {:?}, {} frame buffers",
            camera.session.mode,
            camera.session.shadow.get().num_frame_buffers
        );
        Ok(camera)
    }

    fn connect(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        // A previous process may have left the camera streaming
        if let Err(e) = self.bus.capture_stop() {
            debug!("Stale capture stop: {}", e);
        }
        if let Err(e) = self.bus.iso_release_all() {
            debug!("Stale isochronous release: {}", e);
        }

        self.session.extras = Extras::probe(&mut self.bus)?;
        let mode = self.session.mode;
        self.bus.set_iso_speed(self.session.config.bus_speed)?;
        self.bus.set_video_mode(mode)?;

        let mut initial = CameraSettings {
            tiling: self.session.extras.tiling,
            external_trigger: false,
            colour_correction: false,
            gamma: false,
            single_shot: false,
            running: false,
            ..settings.clone()
        };
        if mode.is_fixed_size() {
            let (width, height) = self.bus.image_size(mode)?;
            initial.left = 0;
            initial.top = 0;
            initial.width = width;
            initial.height = height;
            initial.pixel_coding = video_mode_to_pixel_coding(mode);
        }
        self.session.shadow.replace(initial);

        let dma_device = self.session.config.dma_device_name.clone();
        self.bus.capture_setup(&dma_device, settings.num_frame_buffers)?;
        self.session.connected = true;

        self.apply_settings(settings)
    }

    /// Stop acquisition and release the capture path
    ///
    /// Safe to call more than once; only the first call touches the camera.
    /// Dropping the camera performs the same teardown if it has not run.
    pub fn destroy(&mut self) -> Result<(), CameraError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let mut result = Ok(());
        if self.session.connected {
            if let Err(e) = self.set_run_stop(false) {
                warn!("Failed to stop camera during teardown: {}", e);
                result = Err(e);
            }
            if let Err(e) = self.sleep_frametime(TEARDOWN_FRAME_PERIODS) {
                warn!("Teardown wait failed: {}", e);
            }
        }
        self.disconnect();
        info!("Camera disconnected");
        result
    }

    fn disconnect(&mut self) {
        if !self.session.connected {
            return;
        }
        if let Some(frame) = self.session.held_frame.take() {
            if let Err(e) = self.bus.capture_enqueue(frame) {
                warn!("Failed to return held frame {:?}: {}", frame, e);
            }
        }
        if let Err(e) = self.bus.capture_stop() {
            warn!("Failed to stop capture: {}", e);
        }
        self.session.connected = false;
    }

    fn ensure_connected(&self) -> Result<(), CameraError> {
        if self.session.connected {
            Ok(())
        } else {
            Err(CameraError::NotConnected)
        }
    }

    fn shadowed(&self) -> bool {
        self.session.shadow.enabled()
    }

    fn mirror(&self) -> &CameraSettings {
        self.session.shadow.get()
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    /// Cached hardware configuration
    pub fn config(&self) -> &HardwareConfig {
        &self.session.config
    }

    pub fn extras(&self) -> &Extras {
        &self.session.extras
    }

    pub fn video_mode(&self) -> VideoMode {
        self.session.mode
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn identity(&mut self) -> Result<DeviceIdentity, CameraError> {
        Ok(self.bus.identity()?)
    }

    // ----- whole-state access -----

    /// Current settings, from the mirror or the camera
    pub fn settings(&mut self) -> Result<CameraSettings, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.session.shadow.read(&mut self.bus)?);
        }

        self.frame_offset()?;
        self.frame_size()?;
        self.pixel_coding()?;
        self.pixel_tiling()?;
        self.frame_rate()?;
        self.shutter()?;
        self.trigger_source()?;
        self.trigger_polarity()?;
        self.gain()?;
        self.brightness()?;
        self.white_balance()?;
        self.colour_correction()?;
        self.colour_coefficients()?;
        self.gamma()?;
        self.num_frame_buffers()?;
        self.single_shot()?;
        self.run_stop()?;
        Ok(self.mirror().clone())
    }

    /// Write every setting; features the camera lacks are skipped
    pub fn apply_settings(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if self.session.mode.is_scalable() {
            self.set_pixel_coding(settings.pixel_coding)?;
            self.set_frame_size(settings.width, settings.height)?;
            self.set_frame_offset(settings.left, settings.top)?;
        }
        self.set_frame_rate(settings.frame_rate)?;
        skip_unsupported(self.set_shutter(settings.shutter))?;
        skip_unsupported(self.set_trigger_source(settings.external_trigger))?;
        skip_unsupported(self.set_trigger_polarity(settings.trigger_polarity))?;
        skip_unsupported(self.set_gain(settings.gain))?;
        skip_unsupported(self.set_brightness(settings.brightness))?;
        skip_unsupported(self.set_white_balance(settings.white_balance))?;
        skip_unsupported(self.set_gamma(settings.gamma))?;
        skip_unsupported(self.set_colour_correction(settings.colour_correction))?;
        skip_unsupported(self.set_colour_coefficients(settings.colour_coefficients))?;
        if settings.num_frame_buffers != self.mirror().num_frame_buffers {
            self.set_num_frame_buffers(settings.num_frame_buffers)?;
        }
        skip_unsupported(self.set_single_shot(settings.single_shot))?;
        self.set_state_shadow(settings.use_shadow);
        self.set_run_stop(settings.running)
    }

    // ----- run/stop -----

    /// Camera is acquiring
    pub fn run_stop(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.session.shadow.reconcile_one_shot(&mut self.bus)?);
        }

        let running = if self.bus.transmission()? {
            self.session.shadow.commit(|s| s.single_shot = false);
            true
        } else if self.session.extras.single_shot_capable && self.bus.one_shot()? {
            self.session.shadow.commit(|s| s.single_shot = true);
            true
        } else {
            false
        };
        self.session.shadow.commit(|s| s.running = running);
        Ok(running)
    }

    /// Start or stop acquisition
    pub fn set_run_stop(&mut self, run: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let action = if self.shadowed() {
            let mirror = self.mirror();
            plan_from_shadow(self.session.shadow.mode(), mirror.running, run)
        } else {
            let plan = plan_from_device(
                &mut self.bus,
                self.session.extras.single_shot_capable,
                self.session.shadow.mode(),
                run,
            )?;
            if let Some(mode) = plan.observed_mode {
                self.session
                    .shadow
                    .commit(|s| s.single_shot = mode.is_single_shot());
            }
            plan.action
        };

        if let Some(action) = action {
            action.apply(&mut self.bus)?;
        }
        self.session.shadow.commit(|s| s.running = run);
        Ok(())
    }

    /// Acquisition state with any self-cleared one-shot accounted for
    pub fn run_state(&mut self) -> Result<RunState, CameraError> {
        let running = self.run_stop()?;
        Ok(RunState::new(self.session.shadow.mode(), running))
    }

    pub fn single_shot(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() || !self.session.extras.single_shot_capable {
            return Ok(self.session.extras.single_shot_capable && self.mirror().single_shot);
        }
        if self.bus.transmission()? {
            self.session.shadow.commit(|s| s.single_shot = false);
        } else if self.bus.one_shot()? {
            self.session.shadow.commit(|s| s.single_shot = true);
        }
        Ok(self.mirror().single_shot)
    }

    /// Switch between single-shot and continuous acquisition
    ///
    /// A running camera is moved to the new mechanism immediately.
    pub fn set_single_shot(&mut self, single_shot: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if single_shot && !self.session.extras.single_shot_capable {
            return Err(CameraError::Unsupported("single-shot acquisition"));
        }
        let running = self.run_stop()?;
        let from = self.session.shadow.mode();
        let to = AcquisitionMode::from_single_shot(single_shot);
        for action in plan_mode_switch(from, to, running) {
            action.apply(&mut self.bus)?;
        }
        self.session.shadow.commit(|s| s.single_shot = single_shot);
        Ok(())
    }

    pub fn state_shadow(&self) -> bool {
        self.shadowed()
    }

    /// Serve reads from the mirror (`true`) or the camera (`false`)
    pub fn set_state_shadow(&mut self, use_shadow: bool) {
        self.session.shadow.commit(|s| s.use_shadow = use_shadow);
    }

    // ----- geometry and coding -----

    pub fn frame_offset(&mut self) -> Result<(u32, u32), CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok((self.mirror().left, self.mirror().top));
        }
        let mode = self.session.mode;
        let (left, top) = if mode.is_scalable() {
            self.bus.format7_image_position(mode)?
        } else {
            (0, 0)
        };
        self.session.shadow.commit(|s| {
            s.left = left;
            s.top = top;
        });
        Ok((left, top))
    }

    /// Move the region of interest (scalable formats only)
    pub fn set_frame_offset(&mut self, left: u32, top: u32) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mode = self.session.mode;
        if !mode.is_scalable() {
            if (left, top) == (0, 0) {
                return Ok(());
            }
            return Err(CameraError::Unsupported("frame offset in fixed-size formats"));
        }
        self.bus.set_format7_image_position(mode, left, top)?;
        self.session.shadow.commit(|s| {
            s.left = left;
            s.top = top;
        });
        Ok(())
    }

    pub fn frame_size(&mut self) -> Result<(u32, u32), CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok((self.mirror().width, self.mirror().height));
        }
        let mode = self.session.mode;
        let (width, height) = if mode.is_scalable() {
            self.bus.format7_image_size(mode)?
        } else {
            self.bus.image_size(mode)?
        };
        self.session.shadow.commit(|s| {
            s.width = width;
            s.height = height;
        });
        Ok((width, height))
    }

    /// Resize the region of interest (scalable formats only)
    ///
    /// Packets per frame follow the image size, so the frame rate is read
    /// back afterwards.
    pub fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mode = self.session.mode;
        if !mode.is_scalable() {
            if (width, height) == (self.mirror().width, self.mirror().height) {
                return Ok(());
            }
            return Err(CameraError::Unsupported("frame size in fixed-size formats"));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels == 0 || pixels < u64::from(self.session.config.min_pixels) {
            return Err(CameraError::InvalidArgument(format!(
                "frame size {width}x{height} below minimum of {} pixels",
                self.session.config.min_pixels
            )));
        }
        self.bus.set_format7_image_size(mode, width, height)?;
        let packets = self.bus.format7_packets_per_frame(mode)?;
        let frame_rate = packets_to_frame_rate(packets, self.session.config.max_packets);
        self.session.shadow.commit(|s| {
            s.width = width;
            s.height = height;
            s.frame_rate = frame_rate;
        });
        Ok(())
    }

    pub fn pixel_coding(&mut self) -> Result<PixelCoding, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().pixel_coding);
        }
        let mode = self.session.mode;
        let coding = if mode.is_scalable() {
            color_coding_to_pixel_coding(self.bus.format7_color_coding(mode)?)
        } else {
            video_mode_to_pixel_coding(mode)
        };
        self.session.shadow.commit(|s| s.pixel_coding = coding);
        Ok(coding)
    }

    /// Change the pixel coding (scalable formats only)
    pub fn set_pixel_coding(&mut self, coding: PixelCoding) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mode = self.session.mode;
        if !mode.is_scalable() {
            if coding == video_mode_to_pixel_coding(mode) {
                return Ok(());
            }
            return Err(CameraError::Unsupported("pixel coding change in fixed-size formats"));
        }
        let color = pixel_coding_to_color_coding(coding)
            .ok_or_else(|| CameraError::InvalidArgument(format!("pixel coding {coding:?}")))?;
        self.bus.set_format7_color_coding(mode, color)?;
        self.session.shadow.commit(|s| s.pixel_coding = coding);
        Ok(())
    }

    pub fn pixel_tiling(&mut self) -> Result<Tiling, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().tiling);
        }
        let tiling = probe_tiling(&mut self.bus)?;
        self.session.shadow.commit(|s| s.tiling = tiling);
        Ok(tiling)
    }

    // ----- timing -----

    pub fn frame_rate(&mut self) -> Result<f64, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().frame_rate);
        }
        let mode = self.session.mode;
        let frame_rate = if mode.is_scalable() {
            let packets = self.bus.format7_packets_per_frame(mode)?;
            packets_to_frame_rate(packets, self.session.config.max_packets)
        } else {
            let index = self.bus.framerate()?;
            let rate = index_to_frame_rate(index);
            if rate < 0.0 {
                return Err(CameraError::InvalidFrameRate(index));
            }
            rate
        };
        self.session.shadow.commit(|s| s.frame_rate = frame_rate);
        Ok(frame_rate)
    }

    /// Select the supported frame rate nearest to `frame_rate`
    pub fn set_frame_rate(&mut self, frame_rate: f64) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if frame_rate.is_nan() {
            return Err(CameraError::InvalidArgument("frame rate is NaN".to_string()));
        }
        let mode = self.session.mode;
        let actual = if mode.is_scalable() {
            let max_packets = self.session.config.max_packets;
            let packets = frame_rate_to_packets(frame_rate, max_packets);
            let accepted = self.bus.set_format7_packets_per_frame(mode, packets)?;
            packets_to_frame_rate(accepted, max_packets)
        } else {
            let supported = self.bus.supported_framerates(mode)?;
            if supported.is_empty() {
                return Err(CameraError::NoFrameRates);
            }
            let index = frame_rate_to_index(frame_rate, &supported);
            let actual = index_to_frame_rate(index);
            if actual < 0.0 {
                return Err(CameraError::InvalidFrameRate(index));
            }
            self.bus.set_framerate(index)?;
            actual
        };
        debug!("Frame rate {} requested, {} set", frame_rate, actual);
        self.session.shadow.commit(|s| s.frame_rate = actual);
        Ok(())
    }

    /// Exposure time in seconds
    pub fn shutter(&mut self) -> Result<f64, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().shutter);
        }
        let shutter = match probe(&mut self.bus, Feature::Shutter)?.into_usable() {
            Some(info) => register_seconds(info.value, &self.session.config),
            None => default_shutter(self.frame_rate()?),
        };
        self.session.shadow.commit(|s| s.shutter = shutter);
        Ok(shutter)
    }

    /// Set the exposure time; the camera's quantized value is mirrored
    pub fn set_shutter(&mut self, seconds: f64) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.usable_feature(Feature::Shutter, "shutter")?;
        let register = shutter_register(seconds, &info, &self.session.config)?;
        info.value = register;
        self.bus.set_feature(&info)?;
        let actual = register_seconds(register, &self.session.config);
        self.session.shadow.commit(|s| s.shutter = actual);
        Ok(())
    }

    /// Exposures are started by the external trigger input
    pub fn trigger_source(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().external_trigger);
        }
        let external = probe_trigger(&mut self.bus)?
            .usable()
            .map_or(false, |info| info.is_on);
        self.session.shadow.commit(|s| s.external_trigger = external);
        Ok(external)
    }

    pub fn set_trigger_source(&mut self, external: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.trigger_feature()?;
        if external && !info.on_off_capable {
            return Err(CameraError::Unsupported("external trigger"));
        }
        info.is_on = external;
        self.bus.set_feature(&info)?;
        self.session.shadow.commit(|s| s.external_trigger = external);
        Ok(())
    }

    /// Trigger input is active high
    pub fn trigger_polarity(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().trigger_polarity);
        }
        let active_high = probe_trigger(&mut self.bus)?
            .usable()
            .map_or(true, |info| info.trigger_polarity != TriggerPolarity::ActiveLow);
        self.session.shadow.commit(|s| s.trigger_polarity = active_high);
        Ok(active_high)
    }

    pub fn set_trigger_polarity(&mut self, active_high: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.trigger_feature()?;
        info.trigger_polarity = if active_high {
            TriggerPolarity::ActiveHigh
        } else {
            TriggerPolarity::ActiveLow
        };
        self.bus.set_feature(&info)?;
        self.session.shadow.commit(|s| s.trigger_polarity = active_high);
        Ok(())
    }

    /// Sleep for `multiple` frame periods at the current frame rate
    pub fn sleep_frametime(&mut self, multiple: f64) -> Result<(), CameraError> {
        if !multiple.is_finite() || multiple < 0.0 {
            return Err(CameraError::InvalidArgument(format!(
                "frame period multiple {multiple}"
            )));
        }
        let frame_rate = self.frame_rate()?;
        if frame_rate > 0.0 {
            let pause = Duration::try_from_secs_f64(multiple / frame_rate).map_err(|e| {
                CameraError::InvalidArgument(format!("frame period multiple {multiple}: {e}"))
            })?;
            thread::sleep(pause);
        }
        Ok(())
    }

    // ----- image features -----

    fn usable_feature(&mut self, id: Feature, name: &'static str) -> Result<FeatureInfo, CameraError> {
        probe(&mut self.bus, id)?
            .into_usable()
            .ok_or(CameraError::Unsupported(name))
    }

    fn trigger_feature(&mut self) -> Result<FeatureInfo, CameraError> {
        probe_trigger(&mut self.bus)?
            .into_usable()
            .ok_or(CameraError::Unsupported("trigger"))
    }

    /// Gain in [0, 1]
    pub fn gain(&mut self) -> Result<f64, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().gain);
        }
        let gain = probe(&mut self.bus, Feature::Gain)?
            .usable()
            .map_or(0.0, |info| normalize_gain(info.value, info.min, info.max));
        self.session.shadow.commit(|s| s.gain = gain);
        Ok(gain)
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.usable_feature(Feature::Gain, "gain")?;
        info.value = denormalize_gain(gain, info.min, info.max)?;
        self.bus.set_feature(&info)?;
        let actual = normalize_gain(info.value, info.min, info.max);
        self.session.shadow.commit(|s| s.gain = actual);
        Ok(())
    }

    /// Brightness in [-1, 1]
    pub fn brightness(&mut self) -> Result<f64, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().brightness);
        }
        let brightness = probe(&mut self.bus, Feature::Brightness)?
            .usable()
            .map_or(0.0, |info| normalize_brightness(info.value, info.min, info.max));
        self.session.shadow.commit(|s| s.brightness = brightness);
        Ok(brightness)
    }

    pub fn set_brightness(&mut self, brightness: f64) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.usable_feature(Feature::Brightness, "brightness")?;
        info.value = denormalize_brightness(brightness, info.min, info.max)?;
        self.bus.set_feature(&info)?;
        let actual = normalize_brightness(info.value, info.min, info.max);
        self.session.shadow.commit(|s| s.brightness = actual);
        Ok(())
    }

    /// Blue/U and red/V levels in [0, 1]
    pub fn white_balance(&mut self) -> Result<[f64; 2], CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().white_balance);
        }
        let levels = probe(&mut self.bus, Feature::WhiteBalance)?
            .usable()
            .map_or([0.0, 0.0], |info| {
                normalize_white_balance(info.bu_value, info.rv_value, info.min, info.max)
            });
        self.session.shadow.commit(|s| s.white_balance = levels);
        Ok(levels)
    }

    pub fn set_white_balance(&mut self, levels: [f64; 2]) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let mut info = self.usable_feature(Feature::WhiteBalance, "white balance")?;
        let (bu, rv) = denormalize_white_balance(levels, info.min, info.max)?;
        info.bu_value = bu;
        info.rv_value = rv;
        self.bus.set_feature(&info)?;
        let actual = normalize_white_balance(bu, rv, info.min, info.max);
        self.session.shadow.commit(|s| s.white_balance = actual);
        Ok(())
    }

    // ----- vendor extras -----

    pub fn gamma(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() || !self.session.extras.gamma {
            return Ok(self.session.extras.gamma && self.mirror().gamma);
        }
        let gamma = self.bus.gamma()?.unwrap_or(false);
        self.session.shadow.commit(|s| s.gamma = gamma);
        Ok(gamma)
    }

    pub fn set_gamma(&mut self, gamma: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if !self.session.extras.gamma {
            if gamma {
                return Err(CameraError::Unsupported("gamma correction"));
            }
            self.session.shadow.commit(|s| s.gamma = false);
            return Ok(());
        }
        self.bus.set_gamma(gamma)?;
        self.session.shadow.commit(|s| s.gamma = gamma);
        Ok(())
    }

    pub fn colour_correction(&mut self) -> Result<bool, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() || !self.session.extras.colour_correction {
            return Ok(self.session.extras.colour_correction && self.mirror().colour_correction);
        }
        let enabled = self
            .bus
            .colour_correction()?
            .map_or(false, |correction| correction.enabled);
        self.session.shadow.commit(|s| s.colour_correction = enabled);
        Ok(enabled)
    }

    pub fn set_colour_correction(&mut self, enabled: bool) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if !self.session.extras.colour_correction {
            if enabled {
                return Err(CameraError::Unsupported("colour correction"));
            }
            self.session.shadow.commit(|s| s.colour_correction = false);
            return Ok(());
        }
        let mut correction = self
            .bus
            .colour_correction()?
            .ok_or(CameraError::Unsupported("colour correction"))?;
        correction.enabled = enabled;
        self.bus.set_colour_correction(&correction)?;
        self.session.shadow.commit(|s| s.colour_correction = enabled);
        Ok(())
    }

    /// Row-major colour correction matrix
    pub fn colour_coefficients(&mut self) -> Result<[f64; 9], CameraError> {
        self.ensure_connected()?;
        if self.shadowed() || !self.session.extras.colour_correction {
            return Ok(self.mirror().colour_coefficients);
        }
        if let Some(correction) = self.bus.colour_correction()? {
            let coefficients = registers_to_coefficients(&correction.registers);
            self.session.shadow.commit(|s| s.colour_coefficients = coefficients);
        }
        Ok(self.mirror().colour_coefficients)
    }

    pub fn set_colour_coefficients(&mut self, coefficients: [f64; 9]) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if !self.session.extras.colour_correction {
            return Err(CameraError::Unsupported("colour correction"));
        }
        let limit = f64::from(i32::MAX) / 1000.0;
        if coefficients.iter().any(|c| !c.is_finite() || c.abs() > limit) {
            return Err(CameraError::InvalidArgument(format!(
                "colour coefficients {coefficients:?}"
            )));
        }
        let mut correction = self
            .bus
            .colour_correction()?
            .ok_or(CameraError::Unsupported("colour correction"))?;
        correction.registers = coefficients_to_registers(&coefficients);
        self.bus.set_colour_correction(&correction)?;
        let actual = registers_to_coefficients(&correction.registers);
        self.session.shadow.commit(|s| s.colour_coefficients = actual);
        Ok(())
    }

    // ----- frame buffers -----

    pub fn num_frame_buffers(&mut self) -> Result<u32, CameraError> {
        self.ensure_connected()?;
        if self.shadowed() {
            return Ok(self.mirror().num_frame_buffers);
        }
        let count = self.bus.dma_buffer_count()?;
        self.session.shadow.commit(|s| s.num_frame_buffers = count);
        Ok(count)
    }

    /// Resize the DMA ring; capture is restarted
    pub fn set_num_frame_buffers(&mut self, count: u32) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if count < 1 {
            return Err(CameraError::InvalidArgument(
                "num_frame_buffers must be at least 1".to_string(),
            ));
        }
        if self.session.held_frame.is_some() {
            return Err(CameraError::InvalidArgument(
                "cannot resize the frame ring while a frame is held".to_string(),
            ));
        }
        let dma_device = self.session.config.dma_device_name.clone();
        self.bus.capture_stop()?;
        self.bus.capture_setup(&dma_device, count)?;
        self.session.shadow.commit(|s| s.num_frame_buffers = count);
        Ok(())
    }

    /// Record a frame handed out to the caller
    pub fn hold_frame(&mut self, frame: FrameId) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if let Some(held) = self.session.held_frame {
            return Err(CameraError::InvalidArgument(format!(
                "frame {held:?} is still held"
            )));
        }
        self.session.held_frame = Some(frame);
        Ok(())
    }

    /// Return the held frame to the DMA ring
    pub fn release_frame(&mut self) -> Result<(), CameraError> {
        self.ensure_connected()?;
        if let Some(frame) = self.session.held_frame {
            self.bus.capture_enqueue(frame)?;
            self.session.held_frame = None;
        }
        Ok(())
    }
}

impl<B: CameraBus> Drop for Camera<B> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!("Camera teardown on drop failed: {}", e);
        }
    }
}

fn resolve_config<B: CameraBus>(
    bus: &mut B,
    options: &mut CreateOptions,
) -> Result<HardwareConfig, CameraError> {
    let paths = match options.search_paths.take() {
        Some(paths) => paths,
        None => SearchPaths::from_env()?,
    };
    let mut report: Box<dyn Write + Send> = options
        .report
        .take()
        .unwrap_or_else(|| Box::new(io::stderr()));

    match Resolver::new(paths).resolve(bus, report.as_mut()) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound { guess }) if options.fallback == ConfigFallback::UseGuess => {
            warn!("Proceeding with a guessed hardware configuration");
            Ok(*guess)
        }
        Err(e) => {
            error!("Hardware configuration unavailable: {}", e);
            Err(e.into())
        }
    }
}
