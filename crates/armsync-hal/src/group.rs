//! [`ActuatorGroup`] – the synchronized-transaction core shared by
//! [`JointGroupActuator`][crate::joint_group::JointGroupActuator] and
//! [`ToolActuator`][crate::tool::ToolActuator].
//!
//! A group is an ordered list of bus ids on one exclusively owned bus
//! session.  Per-id operations (mode changes, register writes, torque) walk
//! the ids in order and stop at the first failure without rolling back;
//! the error names the ids that were applied and the ids never attempted.
//! Goal writes and feedback reads are one batched transaction each,
//! regardless of how many ids take part.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──set_operating_mode──▶ ModeSet
//!     ──set_sdk_handler──▶ HandlersReady ──enable──▶ Operational
//! ```
//!
//! `disable` only drops torque (`Operational` → `HandlersReady`).  Changing
//! the mode later keeps the registered handlers: the feedback block and the
//! goal-position register sit at the same addresses in every mode.  Handler
//! registration happens once; later calls keep the existing handlers.
//!
//! Dropping a group turns torque off on every member that may be energized,
//! including after a partially failed `enable`, and closes the bus.

use armsync_types::{
    ActuatorError, ActuatorId, BusError, FeedbackFrame, JointFeedback, LifecycleState,
    ModeCommand, OperatingMode, UnitFailure,
};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::{ActuatorBus, HandlerRef, ModeKind};
use crate::control_table::{ADDR_FEEDBACK_BLOCK, GOAL_POSITION, LEN_FEEDBACK_BLOCK};

/// Ordered set of actuators driven through one bus session.
pub struct ActuatorGroup<B: ActuatorBus> {
    bus: B,
    ids: Vec<ActuatorId>,
    model_number: Option<u16>,
    mode: Option<OperatingMode>,
    /// Highest configuration stage reached; never `Operational`.
    stage: LifecycleState,
    torque_enabled: bool,
    /// Some member may be energized, including after a partial `enable`
    /// or `disable`.
    torque_maybe_on: bool,
    write_handler: Option<HandlerRef>,
    read_handler: Option<HandlerRef>,
    bus_open: bool,
}

impl<B: ActuatorBus> ActuatorGroup<B> {
    /// Wrap an unopened bus.  The group is `Uninitialized` until
    /// [`initialize`][Self::initialize] succeeds.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            ids: Vec::new(),
            model_number: None,
            mode: None,
            stage: LifecycleState::Uninitialized,
            torque_enabled: false,
            torque_maybe_on: false,
            write_handler: None,
            read_handler: None,
            bus_open: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        if self.stage == LifecycleState::HandlersReady && self.torque_enabled {
            LifecycleState::Operational
        } else {
            self.stage
        }
    }

    /// Member ids in group order.  Empty until initialized.
    pub fn ids(&self) -> &[ActuatorId] {
        &self.ids
    }

    pub fn operating_mode(&self) -> Option<OperatingMode> {
        self.mode
    }

    /// Model number every member reported during discovery.
    pub fn model_number(&self) -> Option<u16> {
        self.model_number
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Open the bus and ping every id in order.
    ///
    /// Re-initializing closes the previous session first and resets the
    /// group to `Uninitialized`; it only leaves that stage on full success.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::InvalidCommand`] – `ids` is empty or has duplicates.
    /// - [`ActuatorError::DeviceOpen`] – the device could not be opened.
    /// - [`ActuatorError::NoResponse`] – an id did not answer its ping.
    /// - [`ActuatorError::ModelMismatch`] – members report different models.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub fn initialize(
        &mut self,
        ids: &[ActuatorId],
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError> {
        validate_ids(ids)?;
        self.release();

        self.bus.open(device_name, baud_rate).map_err(|e| {
            error!(device = device_name, baud_rate, error = %e, "failed to open bus");
            ActuatorError::DeviceOpen {
                device: device_name.to_string(),
                details: e.details,
            }
        })?;
        self.bus_open = true;

        let mut model_number = None;
        for &id in ids {
            let found = match self.bus.ping(id) {
                Ok(found) => found,
                Err(e) => {
                    error!(id, error = %e, "actuator did not answer ping; check its id");
                    self.release();
                    return Err(ActuatorError::NoResponse {
                        id,
                        details: e.details,
                    });
                }
            };
            match model_number {
                None => model_number = Some(found),
                Some(expected) if expected != found => {
                    error!(id, expected, found, "mixed actuator models in one group");
                    self.release();
                    return Err(ActuatorError::ModelMismatch {
                        id,
                        expected,
                        found,
                    });
                }
                Some(_) => {}
            }
            let model = self
                .bus
                .model_name(id)
                .unwrap_or_else(|| format!("model {found}"));
            info!(id, model = %model, "actuator found");
        }

        self.ids = ids.to_vec();
        self.model_number = model_number;
        self.stage = LifecycleState::Initialized;
        Ok(())
    }

    /// Put every member into `mode` with device-default profile limits.
    ///
    /// # Errors
    ///
    /// [`ActuatorError::ModeSet`] at the first id that rejects the change;
    /// earlier ids keep the new mode.
    #[instrument(skip(self))]
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), ActuatorError> {
        self.require("set_operating_mode", LifecycleState::Initialized)?;
        let kind = ModeKind::with_device_defaults(mode);
        self.for_each_id("set_operating_mode", |bus, id| bus.set_mode(id, kind))
            .map_err(ActuatorError::ModeSet)?;

        self.mode = Some(mode);
        self.stage = self.stage.max(LifecycleState::ModeSet);
        Ok(())
    }

    /// Write `value` to the named register of every member.
    ///
    /// # Errors
    ///
    /// [`ActuatorError::RegisterWrite`] at the first id that fails; earlier
    /// ids keep the new value.
    #[instrument(skip(self))]
    pub fn write_profile_value(&mut self, register: &str, value: i32) -> Result<(), ActuatorError> {
        self.require("write_profile_value", LifecycleState::Initialized)?;
        self.for_each_id("write_profile_value", |bus, id| {
            bus.write_register(id, register, value)
        })
        .map_err(ActuatorError::RegisterWrite)
    }

    /// Apply a parsed mode command, then make sure the transaction handlers
    /// exist once a mode has been set.
    pub fn apply(&mut self, command: &ModeCommand) -> Result<(), ActuatorError> {
        match command {
            ModeCommand::SetMode { mode } => self.set_operating_mode(*mode)?,
            ModeCommand::SetRegister { name, value } => self.write_profile_value(name, *value)?,
        }
        if self.stage < LifecycleState::ModeSet {
            debug!("no operating mode set yet; handler registration deferred");
            return Ok(());
        }
        let representative = self.ids[0];
        self.set_sdk_handler(representative)
    }

    /// Register the goal-position write handler and the feedback-block read
    /// handler, using `representative` as the model reference for the group.
    ///
    /// Already-registered handlers are kept.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::NotReady`] – no mode has been set.
    /// - [`ActuatorError::UnknownId`] – `representative` is not a member.
    /// - [`ActuatorError::HandlerRegistration`] – the bus refused a handler.
    #[instrument(skip(self))]
    pub fn set_sdk_handler(&mut self, representative: ActuatorId) -> Result<(), ActuatorError> {
        self.require("set_sdk_handler", LifecycleState::ModeSet)?;
        if !self.ids.contains(&representative) {
            return Err(ActuatorError::UnknownId(representative));
        }
        if self.write_handler.is_some() && self.read_handler.is_some() {
            debug!("transaction handlers already registered");
            return Ok(());
        }

        if self.write_handler.is_none() {
            let handler = self
                .bus
                .register_write_handler(representative, GOAL_POSITION)
                .map_err(|e| handler_failure("goal-position write", e))?;
            self.write_handler = Some(handler);
        }
        if self.read_handler.is_none() {
            let handler = self
                .bus
                .register_read_handler(ADDR_FEEDBACK_BLOCK, LEN_FEEDBACK_BLOCK)
                .map_err(|e| handler_failure("feedback read", e))?;
            self.read_handler = Some(handler);
        }

        self.stage = LifecycleState::HandlersReady;
        Ok(())
    }

    /// Whether both transaction handlers are registered.
    pub fn handlers_ready(&self) -> bool {
        self.write_handler.is_some() && self.read_handler.is_some()
    }

    /// Turn torque on for every member, in order.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::NotReady`] – handlers are not registered.
    /// - [`ActuatorError::Torque`] – an id failed; later ids are untouched.
    #[instrument(skip(self))]
    pub fn enable(&mut self) -> Result<(), ActuatorError> {
        self.require("enable", LifecycleState::HandlersReady)?;
        self.torque_maybe_on = true;
        self.for_each_id("enable", |bus, id| bus.torque_on(id))
            .map_err(ActuatorError::Torque)?;
        self.torque_enabled = true;
        Ok(())
    }

    /// Turn torque off for every member, in order.  Disabling a limp group
    /// succeeds again.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::NotReady`] – the group was never initialized.
    /// - [`ActuatorError::Torque`] – an id failed; later ids keep torque.
    #[instrument(skip(self))]
    pub fn disable(&mut self) -> Result<(), ActuatorError> {
        self.require("disable", LifecycleState::Initialized)?;
        self.for_each_id("disable", |bus, id| bus.torque_off(id))
            .map_err(ActuatorError::Torque)?;
        self.torque_enabled = false;
        self.torque_maybe_on = false;
        Ok(())
    }

    /// Convert `angles_rad[i]` for `ids[i]` and write all of them in one
    /// batched transaction.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::NotReady`] – handlers are not registered.
    /// - [`ActuatorError::LengthMismatch`] / [`ActuatorError::UnknownId`] –
    ///   the request does not line up with the group.
    /// - [`ActuatorError::BatchedWrite`] – the transaction failed.
    pub fn write_goal_positions(
        &mut self,
        ids: &[ActuatorId],
        angles_rad: &[f64],
    ) -> Result<(), ActuatorError> {
        let handler = self.ready_handler("send_value", self.write_handler)?;
        if ids.len() != angles_rad.len() {
            return Err(ActuatorError::LengthMismatch {
                expected: ids.len(),
                found: angles_rad.len(),
            });
        }
        self.check_members(ids)?;

        let raw: Vec<i32> = ids
            .iter()
            .zip(angles_rad)
            .map(|(&id, &rad)| self.bus.radian_to_raw(id, rad))
            .collect();
        self.bus.batched_write(handler, ids, &raw).map_err(|e| {
            warn!(ids = ?ids, error = %e, "batched goal write failed");
            ActuatorError::BatchedWrite(e.details)
        })
    }

    /// Read current, velocity and position of `ids` in one batched
    /// transaction and decode them in `ids` order.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::NotReady`] – handlers are not registered.
    /// - [`ActuatorError::UnknownId`] – an id is not a member.
    /// - [`ActuatorError::BatchedRead`] – the transaction failed or returned
    ///   the wrong number of samples.
    pub fn read_feedback(&mut self, ids: &[ActuatorId]) -> Result<FeedbackFrame, ActuatorError> {
        let handler = self.ready_handler("receive_value", self.read_handler)?;
        self.check_members(ids)?;

        let samples = self.bus.batched_read(handler, ids).map_err(|e| {
            warn!(ids = ?ids, error = %e, "batched feedback read failed");
            ActuatorError::BatchedRead(e.details)
        })?;
        let sampled_at = Utc::now();
        if samples.len() != ids.len() {
            return Err(ActuatorError::BatchedRead(format!(
                "asked for {} actuators, bus returned {}",
                ids.len(),
                samples.len()
            )));
        }

        let joints = ids
            .iter()
            .zip(&samples)
            .map(|(&id, raw)| JointFeedback {
                id,
                position_rad: self.bus.raw_to_radian(id, raw.position),
                velocity_rad_s: self.bus.raw_to_velocity(id, raw.velocity),
                current_ma: self.bus.raw_to_current(id, raw.current),
            })
            .collect();
        Ok(FeedbackFrame { sampled_at, joints })
    }

    /// Positions of `ids` in radians.  Empty when the read failed, so a
    /// missed cycle is never mistaken for a zero angle.
    pub fn read_positions(&mut self, ids: &[ActuatorId]) -> Vec<f64> {
        match self.read_feedback(ids) {
            Ok(frame) => frame.positions(),
            Err(e) => {
                debug!(error = %e, "no fresh feedback this cycle");
                Vec::new()
            }
        }
    }

    // ── internals ──────────────────────────────────────────────────────────

    fn require(&self, operation: &str, required: LifecycleState) -> Result<(), ActuatorError> {
        if self.stage >= required {
            Ok(())
        } else {
            Err(ActuatorError::NotReady {
                operation: operation.to_string(),
                required,
                current: self.state(),
            })
        }
    }

    fn ready_handler(
        &self,
        operation: &str,
        handler: Option<HandlerRef>,
    ) -> Result<HandlerRef, ActuatorError> {
        self.require(operation, LifecycleState::HandlersReady)?;
        handler.ok_or_else(|| ActuatorError::NotReady {
            operation: operation.to_string(),
            required: LifecycleState::HandlersReady,
            current: self.state(),
        })
    }

    fn check_members(&self, ids: &[ActuatorId]) -> Result<(), ActuatorError> {
        match ids.iter().find(|id| !self.ids.contains(id)) {
            Some(&id) => Err(ActuatorError::UnknownId(id)),
            None => Ok(()),
        }
    }

    /// Run `op` on each member in order, stopping at the first failure.
    fn for_each_id<F>(&mut self, operation: &str, mut op: F) -> Result<(), UnitFailure>
    where
        F: FnMut(&mut B, ActuatorId) -> Result<(), BusError>,
    {
        for (index, &id) in self.ids.iter().enumerate() {
            if let Err(e) = op(&mut self.bus, id) {
                error!(operation, id, error = %e, "per-actuator operation failed");
                return Err(UnitFailure {
                    id,
                    details: e.details,
                    applied: self.ids[..index].to_vec(),
                    skipped: self.ids[index + 1..].to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Best-effort torque off and bus close; resets the group to
    /// `Uninitialized`.
    fn release(&mut self) {
        if !self.bus_open {
            return;
        }
        if self.torque_maybe_on {
            for &id in &self.ids {
                if let Err(e) = self.bus.torque_off(id) {
                    warn!(id, error = %e, "torque off during teardown failed");
                }
            }
        }
        self.bus.close();
        self.bus_open = false;
        self.ids.clear();
        self.model_number = None;
        self.mode = None;
        self.stage = LifecycleState::Uninitialized;
        self.torque_enabled = false;
        self.torque_maybe_on = false;
        self.write_handler = None;
        self.read_handler = None;
    }
}

impl<B: ActuatorBus> Drop for ActuatorGroup<B> {
    fn drop(&mut self) {
        self.release();
    }
}

fn validate_ids(ids: &[ActuatorId]) -> Result<(), ActuatorError> {
    if ids.is_empty() {
        return Err(ActuatorError::InvalidCommand(
            "an actuator group needs at least one id".to_string(),
        ));
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(ActuatorError::InvalidCommand(format!(
                "actuator id {id} appears twice"
            )));
        }
    }
    Ok(())
}

fn handler_failure(what: &str, e: BusError) -> ActuatorError {
    error!(handler = what, error = %e, "handler registration failed");
    ActuatorError::HandlerRegistration(format!("{what} handler: {}", e.details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_table::{XL430_W250, XM430_W350};
    use crate::sim::{BusCall, SimBus, SimHandle};

    fn group(ids: &[ActuatorId]) -> (ActuatorGroup<SimBus>, SimHandle) {
        let bus = SimBus::new().with_servos(ids, XM430_W350);
        let handle = bus.handle();
        (ActuatorGroup::new(bus), handle)
    }

    fn ready(ids: &[ActuatorId]) -> (ActuatorGroup<SimBus>, SimHandle) {
        let (mut g, handle) = group(ids);
        g.initialize(ids, "/dev/sim", 1_000_000).unwrap();
        g.apply(&ModeCommand::SetMode {
            mode: OperatingMode::Position,
        })
        .unwrap();
        (g, handle)
    }

    #[test]
    fn walks_through_lifecycle() {
        let (mut g, _) = group(&[1, 2]);
        assert_eq!(g.state(), LifecycleState::Uninitialized);
        g.initialize(&[1, 2], "/dev/sim", 57_600).unwrap();
        assert_eq!(g.state(), LifecycleState::Initialized);
        g.set_operating_mode(OperatingMode::Position).unwrap();
        assert_eq!(g.state(), LifecycleState::ModeSet);
        g.set_sdk_handler(2).unwrap();
        assert_eq!(g.state(), LifecycleState::HandlersReady);
        g.enable().unwrap();
        assert_eq!(g.state(), LifecycleState::Operational);
        g.disable().unwrap();
        assert_eq!(g.state(), LifecycleState::HandlersReady);
    }

    #[test]
    fn rejects_empty_and_duplicate_ids() {
        let (mut g, _) = group(&[1]);
        assert!(matches!(
            g.initialize(&[], "/dev/sim", 57_600),
            Err(ActuatorError::InvalidCommand(_))
        ));
        assert!(matches!(
            g.initialize(&[1, 1], "/dev/sim", 57_600),
            Err(ActuatorError::InvalidCommand(_))
        ));
    }

    #[test]
    fn mixed_models_are_rejected() {
        let bus = SimBus::new()
            .with_servo(1, XM430_W350)
            .with_servo(2, XL430_W250);
        let handle = bus.handle();
        let mut g = ActuatorGroup::new(bus);
        let err = g.initialize(&[1, 2], "/dev/sim", 57_600).unwrap_err();
        assert_eq!(
            err,
            ActuatorError::ModelMismatch {
                id: 2,
                expected: 1020,
                found: 1060
            }
        );
        assert_eq!(g.state(), LifecycleState::Uninitialized);
        assert!(!handle.is_open());
    }

    #[test]
    fn handler_needs_mode_and_member_id() {
        let (mut g, _) = group(&[1, 2]);
        g.initialize(&[1, 2], "/dev/sim", 57_600).unwrap();
        assert!(matches!(
            g.set_sdk_handler(1),
            Err(ActuatorError::NotReady { .. })
        ));
        g.set_operating_mode(OperatingMode::Position).unwrap();
        assert_eq!(g.set_sdk_handler(5), Err(ActuatorError::UnknownId(5)));
    }

    #[test]
    fn handlers_are_registered_once() {
        let (mut g, handle) = ready(&[1, 2]);
        assert!(g.handlers_ready());
        assert_eq!(handle.handler_count(), 2);
        g.set_sdk_handler(1).unwrap();
        g.apply(&ModeCommand::SetRegister {
            name: "Profile_Velocity".to_string(),
            value: 40,
        })
        .unwrap();
        assert_eq!(handle.handler_count(), 2);
    }

    #[test]
    fn register_command_before_mode_defers_handlers() {
        let (mut g, handle) = group(&[1]);
        g.initialize(&[1], "/dev/sim", 57_600).unwrap();
        g.apply(&ModeCommand::SetRegister {
            name: "Profile_Acceleration".to_string(),
            value: 10,
        })
        .unwrap();
        assert_eq!(handle.register(1, "Profile_Acceleration"), Some(10));
        assert_eq!(g.state(), LifecycleState::Initialized);
        assert!(!g.handlers_ready());
        assert_eq!(handle.handler_count(), 0);
    }

    #[test]
    fn mode_change_while_operational_keeps_handlers() {
        let (mut g, handle) = ready(&[1, 2]);
        g.enable().unwrap();
        g.set_operating_mode(OperatingMode::CurrentBasedPosition)
            .unwrap();
        assert_eq!(g.state(), LifecycleState::Operational);
        assert_eq!(handle.handler_count(), 2);
        g.write_goal_positions(&[1, 2], &[0.1, 0.2]).unwrap();
    }

    #[test]
    fn torque_failure_reports_progress() {
        let (mut g, handle) = ready(&[1, 2, 3]);
        handle.fail_torque(2);
        let err = g.enable().unwrap_err();
        let failure = err.unit_failure().unwrap();
        assert_eq!(failure.id, 2);
        assert_eq!(failure.applied, vec![1]);
        assert_eq!(failure.skipped, vec![3]);
        assert_eq!(handle.torque(1), Some(true));
        assert_eq!(handle.torque(3), Some(false));
        assert_eq!(g.state(), LifecycleState::HandlersReady);
    }

    #[test]
    fn write_checks_lengths_and_membership() {
        let (mut g, _) = ready(&[1, 2]);
        assert_eq!(
            g.write_goal_positions(&[1, 2], &[0.0]),
            Err(ActuatorError::LengthMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            g.write_goal_positions(&[1, 9], &[0.0, 0.0]),
            Err(ActuatorError::UnknownId(9))
        );
    }

    #[test]
    fn batched_ops_need_handlers() {
        let (mut g, _) = group(&[1]);
        g.initialize(&[1], "/dev/sim", 57_600).unwrap();
        g.set_operating_mode(OperatingMode::Position).unwrap();
        assert!(matches!(
            g.write_goal_positions(&[1], &[0.0]),
            Err(ActuatorError::NotReady { .. })
        ));
        assert!(matches!(
            g.read_feedback(&[1]),
            Err(ActuatorError::NotReady { .. })
        ));
        assert!(g.read_positions(&[1]).is_empty());
    }

    #[test]
    fn feedback_carries_all_three_quantities() {
        let (mut g, handle) = ready(&[1]);
        g.enable().unwrap();
        g.write_goal_positions(&[1], &[0.5]).unwrap();
        let frame = g.read_feedback(&[1]).unwrap();
        let joint = frame.joints[0];
        assert_eq!(joint.id, 1);
        assert!((joint.position_rad - 0.5).abs() <= XM430_W350.radians_per_tick());
        assert_eq!(joint.velocity_rad_s, 0.0);
        assert!(joint.current_ma > 0.0);
        assert_eq!(handle.goal_raw(1), Some(XM430_W350.radian_to_raw(0.5)));
    }

    #[test]
    fn one_transaction_per_batched_call() {
        let (mut g, handle) = ready(&[1, 2, 3, 4]);
        g.enable().unwrap();
        handle.clear_calls();
        g.write_goal_positions(&[1, 2, 3, 4], &[0.0; 4]).unwrap();
        g.read_feedback(&[1, 2, 3, 4]).unwrap();
        let calls = handle.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], BusCall::BatchedWrite { .. }));
        assert!(matches!(calls[1], BusCall::BatchedRead { .. }));
    }

    #[test]
    fn reinitialize_resets_configuration() {
        let (mut g, handle) = ready(&[1, 2]);
        g.enable().unwrap();
        g.initialize(&[1, 2], "/dev/sim", 57_600).unwrap();
        assert_eq!(g.state(), LifecycleState::Initialized);
        assert_eq!(g.operating_mode(), None);
        assert_eq!(handle.torque(1), Some(false));
    }

    #[test]
    fn drop_disables_torque_and_closes_bus() {
        let (mut g, handle) = ready(&[1, 2]);
        g.enable().unwrap();
        drop(g);
        assert_eq!(handle.torque(1), Some(false));
        assert_eq!(handle.torque(2), Some(false));
        assert!(!handle.is_open());
        assert_eq!(handle.calls().last(), Some(&BusCall::Close));
    }

    #[test]
    fn drop_after_partial_enable_turns_energized_ids_off() {
        let (mut g, handle) = ready(&[1, 2, 3]);
        handle.fail_torque(2);
        assert!(g.enable().is_err());
        assert_eq!(handle.torque(1), Some(true));
        drop(g);
        assert_eq!(handle.torque(1), Some(false));
        assert!(handle.calls().contains(&BusCall::TorqueOff(1)));
        assert!(handle.calls().contains(&BusCall::TorqueOff(3)));
        assert!(!handle.is_open());
    }

    #[test]
    fn reinitialize_after_partial_enable_turns_energized_ids_off() {
        let (mut g, handle) = ready(&[1, 2, 3]);
        handle.fail_torque(2);
        assert!(g.enable().is_err());
        handle.clear_faults();
        g.initialize(&[1, 2, 3], "/dev/sim", 57_600).unwrap();
        assert_eq!(g.state(), LifecycleState::Initialized);
        for id in [1, 2, 3] {
            assert_eq!(handle.torque(id), Some(false));
        }
    }

    #[test]
    fn drop_after_partial_disable_retries_torque_off() {
        let (mut g, handle) = ready(&[1, 2, 3]);
        g.enable().unwrap();
        handle.fail_torque(1);
        assert!(g.disable().is_err());
        assert_eq!(handle.torque(2), Some(true));
        handle.clear_faults();
        drop(g);
        for id in [1, 2, 3] {
            assert_eq!(handle.torque(id), Some(false));
        }
    }

    #[test]
    fn drop_of_uninitialized_group_touches_nothing() {
        let (g, handle) = group(&[1]);
        drop(g);
        assert!(handle.calls().is_empty());
    }
}
