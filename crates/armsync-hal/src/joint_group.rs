//! [`JointGroupActuator`] – one actuator per arm joint, driven in lock-step.
//!
//! All joints of a group share one bus session and one hardware model.  Each
//! control tick issues exactly one batched goal write and one batched
//! feedback read for the whole group, so every joint starts moving in the
//! same bus transaction and every sample comes from the same instant.
//!
//! # Example
//!
//! ```rust
//! use armsync_hal::control_table::XM430_W350;
//! use armsync_hal::joint_group::JointGroupActuator;
//! use armsync_hal::sim::SimBus;
//! use armsync_types::OperatingMode;
//!
//! let ids = [11, 12, 13, 14];
//! let mut joints = JointGroupActuator::new(SimBus::new().with_servos(&ids, XM430_W350));
//!
//! joints.initialize(&ids, "/dev/ttyUSB0", 1_000_000).unwrap();
//! joints.set_operating_mode(OperatingMode::Position).unwrap();
//! joints.set_sdk_handler(ids[0]).unwrap();
//! joints.enable().unwrap();
//!
//! joints.send_group_values(&ids, &[0.0, -0.5, 0.3, 0.7]).unwrap();
//! let angles = joints.receive_group_values(&ids);
//! assert_eq!(angles.len(), 4);
//! ```

use armsync_types::{
    ActuatorError, ActuatorId, FeedbackFrame, LifecycleState, ModeCommand, OperatingMode,
};

use crate::bus::ActuatorBus;
use crate::group::ActuatorGroup;

/// An ordered group of joint actuators on one bus.
pub struct JointGroupActuator<B: ActuatorBus> {
    group: ActuatorGroup<B>,
}

impl<B: ActuatorBus> JointGroupActuator<B> {
    /// Wrap an unopened bus.
    pub fn new(bus: B) -> Self {
        Self {
            group: ActuatorGroup::new(bus),
        }
    }

    /// Open the bus and ping every joint id in order.  Any silent id fails
    /// the whole group; there is no partial-group operation.
    pub fn initialize(
        &mut self,
        ids: &[ActuatorId],
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError> {
        self.group.initialize(ids, device_name, baud_rate)
    }

    /// Switch every joint to `mode`, stopping at the first failure.
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), ActuatorError> {
        self.group.set_operating_mode(mode)
    }

    /// Write a named profile register (e.g. `Profile_Velocity`) on every
    /// joint, stopping at the first failure.
    pub fn write_profile_value(&mut self, register: &str, value: i32) -> Result<(), ActuatorError> {
        self.group.write_profile_value(register, value)
    }

    /// Apply a mode or register command and register handlers once a mode
    /// is in place.
    pub fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError> {
        self.group.apply(command)
    }

    /// Register the batched-transaction handlers, using `representative` as
    /// the model reference for every joint.
    pub fn set_sdk_handler(&mut self, representative: ActuatorId) -> Result<(), ActuatorError> {
        self.group.set_sdk_handler(representative)
    }

    pub fn enable(&mut self) -> Result<(), ActuatorError> {
        self.group.enable()
    }

    pub fn disable(&mut self) -> Result<(), ActuatorError> {
        self.group.disable()
    }

    /// Write one goal angle per id (radians, `angles_rad[i]` for `ids[i]`) in
    /// a single batched transaction.
    pub fn send_group_values(
        &mut self,
        ids: &[ActuatorId],
        angles_rad: &[f64],
    ) -> Result<(), ActuatorError> {
        self.group.write_goal_positions(ids, angles_rad)
    }

    /// Present angles of `ids` in radians, in `ids` order.  An empty vector
    /// means the read failed and there is no fresh data this cycle.
    pub fn receive_group_values(&mut self, ids: &[ActuatorId]) -> Vec<f64> {
        self.group.read_positions(ids)
    }

    /// Full position/velocity/current feedback of `ids` from one batched read.
    pub fn read_group_feedback(&mut self, ids: &[ActuatorId]) -> Result<FeedbackFrame, ActuatorError> {
        self.group.read_feedback(ids)
    }

    pub fn ids(&self) -> &[ActuatorId] {
        self.group.ids()
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
}
