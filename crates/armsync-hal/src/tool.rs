//! [`ToolActuator`] – a single-actuator end effector such as a gripper jaw.
//!
//! Same lifecycle and transactions as a joint group, with one id.  Goal
//! writes and feedback reads still go through the batched handlers so the
//! tool and the joints share one transaction primitive.

use armsync_types::{
    ActuatorError, ActuatorId, JointFeedback, LifecycleState, ModeCommand, OperatingMode,
};

use crate::bus::ActuatorBus;
use crate::group::ActuatorGroup;

/// A one-actuator tool on its own bus session.
pub struct ToolActuator<B: ActuatorBus> {
    group: ActuatorGroup<B>,
}

impl<B: ActuatorBus> ToolActuator<B> {
    pub fn new(bus: B) -> Self {
        Self {
            group: ActuatorGroup::new(bus),
        }
    }

    /// Open the bus and ping `id`.
    pub fn initialize(
        &mut self,
        id: ActuatorId,
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError> {
        self.group.initialize(&[id], device_name, baud_rate)
    }

    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), ActuatorError> {
        self.group.set_operating_mode(mode)
    }

    pub fn write_profile_value(&mut self, register: &str, value: i32) -> Result<(), ActuatorError> {
        self.group.write_profile_value(register, value)
    }

    pub fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError> {
        self.group.apply(command)
    }

    /// Register the batched-transaction handlers for the tool's own id.
    pub fn set_sdk_handler(&mut self) -> Result<(), ActuatorError> {
        let id = self.require_id("set_sdk_handler")?;
        self.group.set_sdk_handler(id)
    }

    pub fn enable(&mut self) -> Result<(), ActuatorError> {
        self.group.enable()
    }

    pub fn disable(&mut self) -> Result<(), ActuatorError> {
        self.group.disable()
    }

    /// Move the tool to `angle_rad`.
    pub fn send_value(&mut self, angle_rad: f64) -> Result<(), ActuatorError> {
        let id = self.require_id("send_value")?;
        self.group.write_goal_positions(&[id], &[angle_rad])
    }

    /// Present tool angle in radians, or `None` when there is no fresh data
    /// this cycle.
    pub fn receive_value(&mut self) -> Option<f64> {
        let id = self.id()?;
        self.group.read_positions(&[id]).first().copied()
    }

    /// Position, velocity and current of the tool from one batched read.
    pub fn read_feedback(&mut self) -> Result<JointFeedback, ActuatorError> {
        let id = self.require_id("read_feedback")?;
        let frame = self.group.read_feedback(&[id])?;
        frame
            .joints
            .first()
            .copied()
            .ok_or_else(|| ActuatorError::BatchedRead("empty feedback frame".to_string()))
    }

    /// The tool's bus id, once initialized.
    pub fn id(&self) -> Option<ActuatorId> {
        self.group.ids().first().copied()
    }

    pub fn state(&self) -> LifecycleState {
        self.group.state()
    }

    pub fn operating_mode(&self) -> Option<OperatingMode> {
        self.group.operating_mode()
    }

    pub fn bus(&self) -> &B {
        self.group.bus()
    }

    fn require_id(&self, operation: &str) -> Result<ActuatorId, ActuatorError> {
        self.id().ok_or_else(|| ActuatorError::NotReady {
            operation: operation.to_string(),
            required: LifecycleState::Initialized,
            current: self.state(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ModeKind;
    use crate::control_table::XM430_W350;
    use crate::sim::{BusCall, SimBus, SimHandle};

    const GRIPPER: ActuatorId = 15;

    fn gripper() -> (ToolActuator<SimBus>, SimHandle) {
        let bus = SimBus::new().with_servo(GRIPPER, XM430_W350);
        let handle = bus.handle();
        (ToolActuator::new(bus), handle)
    }

    fn operational() -> (ToolActuator<SimBus>, SimHandle) {
        let (mut tool, handle) = gripper();
        tool.initialize(GRIPPER, "/dev/sim", 1_000_000).unwrap();
        tool.set_operating_mode(OperatingMode::CurrentBasedPosition)
            .unwrap();
        tool.set_sdk_handler().unwrap();
        tool.enable().unwrap();
        (tool, handle)
    }

    #[test]
    fn lifecycle_with_single_id() {
        let (tool, handle) = operational();
        assert_eq!(tool.id(), Some(GRIPPER));
        assert_eq!(tool.state(), LifecycleState::Operational);
        assert!(handle.calls().contains(&BusCall::SetMode(
            GRIPPER,
            ModeKind::CurrentBasedPosition { current_limit: 0 }
        )));
    }

    #[test]
    fn missing_tool_fails_initialize() {
        let (mut tool, handle) = gripper();
        handle.disconnect(GRIPPER);
        assert!(matches!(
            tool.initialize(GRIPPER, "/dev/sim", 1_000_000),
            Err(ActuatorError::NoResponse { .. })
        ));
        assert_eq!(tool.id(), None);
        assert!(tool.enable().is_err());
        assert_eq!(tool.receive_value(), None);
    }

    #[test]
    fn send_uses_batched_transaction() {
        let (mut tool, handle) = operational();
        handle.clear_calls();
        tool.send_value(0.01).unwrap();
        assert_eq!(
            handle.calls(),
            vec![BusCall::BatchedWrite {
                ids: vec![GRIPPER],
                values: vec![XM430_W350.radian_to_raw(0.01)],
            }]
        );
    }

    #[test]
    fn receive_returns_present_angle() {
        let (mut tool, _) = operational();
        tool.send_value(-0.3).unwrap();
        let angle = tool.receive_value().expect("fresh data");
        assert!((angle + 0.3).abs() <= XM430_W350.radians_per_tick());
    }

    #[test]
    fn failed_read_is_none_not_zero() {
        let (mut tool, handle) = operational();
        handle.fail_batched_read(true);
        assert_eq!(tool.receive_value(), None);
        assert!(matches!(
            tool.read_feedback(),
            Err(ActuatorError::BatchedRead(_))
        ));
    }

    #[test]
    fn profile_value_is_written_as_full_integer() {
        let (mut tool, handle) = gripper();
        tool.initialize(GRIPPER, "/dev/sim", 1_000_000).unwrap();
        tool.write_profile_value("Profile_Velocity", 300).unwrap();
        assert_eq!(handle.register(GRIPPER, "Profile_Velocity"), Some(300));
    }

    #[test]
    fn handler_before_initialize_is_not_ready() {
        let (mut tool, _) = gripper();
        assert!(matches!(
            tool.set_sdk_handler(),
            Err(ActuatorError::NotReady { .. })
        ));
        assert!(matches!(
            tool.send_value(0.0),
            Err(ActuatorError::NotReady { .. })
        ));
    }

    #[test]
    fn disable_twice_is_harmless() {
        let (mut tool, handle) = operational();
        tool.disable().unwrap();
        tool.disable().unwrap();
        assert_eq!(handle.torque(GRIPPER), Some(false));
    }
}
