//! State Shadow Store
//!
//! Software mirror of the camera settings. Writes always land in the mirror
//! once the camera has accepted them; reads are served from it while
//! `use_shadow` is set.

use iidc_protocol::{BusError, CameraBus};
use tracing::debug;

use crate::run_stop::{AcquisitionMode, RunState};
use crate::settings::CameraSettings;

/// Mirror of the last settings written to or read from the camera
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    settings: CameraSettings,
}

impl Shadow {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }

    /// Reads are served from the mirror
    pub fn enabled(&self) -> bool {
        self.settings.use_shadow
    }

    pub fn get(&self) -> &CameraSettings {
        &self.settings
    }

    /// Record a change the camera has accepted
    pub fn commit(&mut self, update: impl FnOnce(&mut CameraSettings)) {
        update(&mut self.settings);
    }

    /// Replace the whole mirror
    pub fn replace(&mut self, settings: CameraSettings) {
        self.settings = settings;
    }

    pub fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::from_single_shot(self.settings.single_shot)
    }

    pub fn run_state(&self) -> RunState {
        RunState::new(self.mode(), self.settings.running)
    }

    /// Catch up with a self-cleared ONE_SHOT register
    ///
    /// A single-shot exposure ends without telling the host, so a mirror
    /// that says "running in single-shot" is checked against the register.
    /// When the register has cleared, the mirror is corrected. Returns the
    /// (possibly corrected) running flag.
    pub fn reconcile_one_shot<B: CameraBus>(&mut self, bus: &mut B) -> Result<bool, BusError> {
        if self.settings.running && self.settings.single_shot && !bus.one_shot()? {
            debug!("One-shot register has self-cleared, camera stopped");
            self.settings.running = false;
        }
        Ok(self.settings.running)
    }

    /// Mirror contents with the run state reconciled
    pub fn read<B: CameraBus>(&mut self, bus: &mut B) -> Result<CameraSettings, BusError> {
        self.reconcile_one_shot(bus)?;
        Ok(self.settings.clone())
    }
}
