//! Run/Stop Controller
//!
//! Acquisition is started and stopped through one of two registers:
//! ISO_EN for continuous transmission, or the self-clearing ONE_SHOT
//! register for single frames. Planning is separated from execution so the
//! decision table can be checked without a camera.

use iidc_protocol::{BusError, CameraBus};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How frames are requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode {
    Continuous,
    SingleShot,
}

impl AcquisitionMode {
    pub fn from_single_shot(single_shot: bool) -> Self {
        if single_shot {
            Self::SingleShot
        } else {
            Self::Continuous
        }
    }

    pub fn is_single_shot(&self) -> bool {
        matches!(self, Self::SingleShot)
    }
}

/// Acquisition state of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    RunningContinuous,
    RunningSingleShot,
}

impl RunState {
    pub fn new(mode: AcquisitionMode, running: bool) -> Self {
        match (running, mode) {
            (false, _) => Self::Stopped,
            (true, AcquisitionMode::Continuous) => Self::RunningContinuous,
            (true, AcquisitionMode::SingleShot) => Self::RunningSingleShot,
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Register write that starts or stops acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    StartTransmission,
    StopTransmission,
    StartOneShot,
    StopOneShot,
}

impl RunAction {
    pub fn apply<B: CameraBus>(self, bus: &mut B) -> Result<(), BusError> {
        debug!("Run/stop: {:?}", self);
        match self {
            Self::StartTransmission => bus.set_transmission(true),
            Self::StopTransmission => bus.set_transmission(false),
            Self::StartOneShot => bus.set_one_shot(true),
            Self::StopOneShot => bus.set_one_shot(false),
        }
    }
}

/// Decide the register write from mirrored state alone
///
/// A single-shot run request always writes ONE_SHOT, even when the mirror
/// says the camera is already running, because the register may have
/// self-cleared. A stop request in single-shot mode writes ONE_SHOT off
/// only when the mirror says running.
pub fn plan_from_shadow(mode: AcquisitionMode, running: bool, run: bool) -> Option<RunAction> {
    match mode {
        AcquisitionMode::SingleShot if running && !run => Some(RunAction::StopOneShot),
        AcquisitionMode::SingleShot if run => Some(RunAction::StartOneShot),
        AcquisitionMode::Continuous if running && !run => Some(RunAction::StopTransmission),
        AcquisitionMode::Continuous if !running && run => Some(RunAction::StartTransmission),
        _ => None,
    }
}

/// Result of planning against the camera's registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePlan {
    /// Acquisition mode observed on the camera, if it was running
    pub observed_mode: Option<AcquisitionMode>,
    pub action: Option<RunAction>,
}

/// Decide the register write by querying the camera
///
/// ISO_EN on means continuous acquisition. Otherwise, on cameras with a
/// ONE_SHOT register, a set register means a single-shot exposure is in
/// progress. When the camera is idle the mirrored mode picks the
/// mechanism for a run request.
pub fn plan_from_device<B: CameraBus>(
    bus: &mut B,
    single_shot_capable: bool,
    mirrored_mode: AcquisitionMode,
    run: bool,
) -> Result<DevicePlan, BusError> {
    if bus.transmission()? {
        return Ok(DevicePlan {
            observed_mode: Some(AcquisitionMode::Continuous),
            action: (!run).then_some(RunAction::StopTransmission),
        });
    }

    if single_shot_capable && bus.one_shot()? {
        return Ok(DevicePlan {
            observed_mode: Some(AcquisitionMode::SingleShot),
            action: (!run).then_some(RunAction::StopOneShot),
        });
    }

    let action = match (run, single_shot_capable, mirrored_mode) {
        (false, _, _) => None,
        (true, true, AcquisitionMode::SingleShot) => Some(RunAction::StartOneShot),
        (true, _, _) => Some(RunAction::StartTransmission),
    };
    Ok(DevicePlan {
        observed_mode: None,
        action,
    })
}

/// Register writes that move a running camera from one mode to another
///
/// Nothing is written while stopped; the new mode takes effect on the next
/// run request.
pub fn plan_mode_switch(from: AcquisitionMode, to: AcquisitionMode, running: bool) -> Vec<RunAction> {
    if !running || from == to {
        return Vec::new();
    }
    match to {
        AcquisitionMode::SingleShot => vec![RunAction::StopTransmission, RunAction::StartOneShot],
        AcquisitionMode::Continuous => vec![RunAction::StopOneShot, RunAction::StartTransmission],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iidc_protocol::{BusCall, MockBus};
    use super::AcquisitionMode::*;

    #[test]
    fn test_shadow_table() {
        assert_eq!(plan_from_shadow(SingleShot, true, false), Some(RunAction::StopOneShot));
        assert_eq!(plan_from_shadow(SingleShot, false, true), Some(RunAction::StartOneShot));
        assert_eq!(plan_from_shadow(SingleShot, true, true), Some(RunAction::StartOneShot));
        assert_eq!(plan_from_shadow(SingleShot, false, false), None);
        assert_eq!(plan_from_shadow(Continuous, true, false), Some(RunAction::StopTransmission));
        assert_eq!(plan_from_shadow(Continuous, false, true), Some(RunAction::StartTransmission));
        assert_eq!(plan_from_shadow(Continuous, true, true), None);
        assert_eq!(plan_from_shadow(Continuous, false, false), None);
    }

    #[test]
    fn test_device_plan_continuous_running() {
        let mut bus = MockBus::new();
        bus.transmission = true;
        let plan = plan_from_device(&mut bus, true, SingleShot, false).unwrap();
        assert_eq!(plan.observed_mode, Some(Continuous));
        assert_eq!(plan.action, Some(RunAction::StopTransmission));
        // ONE_SHOT is not consulted when ISO_EN is on
        assert_eq!(bus.count(&BusCall::OneShot), 0);

        let plan = plan_from_device(&mut bus, true, SingleShot, true).unwrap();
        assert_eq!(plan.action, None);
    }

    #[test]
    fn test_device_plan_single_shot_in_progress() {
        let mut bus = MockBus::new();
        bus.one_shot = true;
        let plan = plan_from_device(&mut bus, true, Continuous, false).unwrap();
        assert_eq!(plan.observed_mode, Some(SingleShot));
        assert_eq!(plan.action, Some(RunAction::StopOneShot));
    }

    #[test]
    fn test_device_plan_idle_uses_mirror() {
        let mut bus = MockBus::new();
        let plan = plan_from_device(&mut bus, true, SingleShot, true).unwrap();
        assert_eq!(plan.observed_mode, None);
        assert_eq!(plan.action, Some(RunAction::StartOneShot));

        let plan = plan_from_device(&mut bus, true, Continuous, true).unwrap();
        assert_eq!(plan.action, Some(RunAction::StartTransmission));

        let plan = plan_from_device(&mut bus, true, Continuous, false).unwrap();
        assert_eq!(plan.action, None);
    }

    #[test]
    fn test_device_plan_without_one_shot_register() {
        let mut bus = MockBus::new();
        bus.one_shot_capable = false;
        let plan = plan_from_device(&mut bus, false, SingleShot, true).unwrap();
        assert_eq!(plan.action, Some(RunAction::StartTransmission));
        assert_eq!(bus.count(&BusCall::OneShot), 0);
    }

    #[test]
    fn test_mode_switch() {
        assert!(plan_mode_switch(Continuous, SingleShot, false).is_empty());
        assert!(plan_mode_switch(SingleShot, SingleShot, true).is_empty());
        assert_eq!(
            plan_mode_switch(Continuous, SingleShot, true),
            vec![RunAction::StopTransmission, RunAction::StartOneShot]
        );
        assert_eq!(
            plan_mode_switch(SingleShot, Continuous, true),
            vec![RunAction::StopOneShot, RunAction::StartTransmission]
        );
    }

    #[test]
    fn test_run_state() {
        assert_eq!(RunState::new(SingleShot, false), RunState::Stopped);
        assert_eq!(RunState::new(SingleShot, true), RunState::RunningSingleShot);
        assert!(RunState::new(Continuous, true).is_running());
    }

    #[test]
    fn test_apply_writes_register() {
        let mut bus = MockBus::new();
        RunAction::StartOneShot.apply(&mut bus).unwrap();
        RunAction::StopTransmission.apply(&mut bus).unwrap();
        assert_eq!(
            bus.calls,
            vec![BusCall::SetOneShot(true), BusCall::SetTransmission(false)]
        );
    }
}
