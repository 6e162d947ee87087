//! Driver traits for the actuator command surface.
//!
//! [`JointDriver`] and [`ToolDriver`] are what the command layer and the
//! control loop talk to.  [`JointGroupActuator`] and [`ToolActuator`]
//! implement them for any [`ActuatorBus`], so callers can hold boxed drivers
//! without knowing which bus sits underneath.

use armsync_types::{ActuatorError, ActuatorId, LifecycleState, ModeCommand};

use crate::bus::ActuatorBus;
use crate::joint_group::JointGroupActuator;
use crate::tool::ToolActuator;

/// A multi-joint actuator group.
pub trait JointDriver: Send {
    /// Open `device_name` at `baud_rate` and discover every id.
    ///
    /// # Errors
    ///
    /// [`ActuatorError::DeviceOpen`], [`ActuatorError::NoResponse`] or
    /// [`ActuatorError::ModelMismatch`]; the group is unusable afterwards
    /// until a later `init` succeeds.
    fn init(
        &mut self,
        ids: &[ActuatorId],
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError>;

    /// Apply a mode or register command to every joint.
    fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError>;

    /// Member ids in group order.
    fn ids(&self) -> Vec<ActuatorId>;

    fn enable(&mut self) -> Result<(), ActuatorError>;

    fn disable(&mut self) -> Result<(), ActuatorError>;

    /// One batched goal write; `angles_rad[i]` targets `ids[i]`.
    fn send_values(&mut self, ids: &[ActuatorId], angles_rad: &[f64]) -> Result<(), ActuatorError>;

    /// One batched read; empty when there is no fresh data.
    fn receive_values(&mut self, ids: &[ActuatorId]) -> Vec<f64>;

    fn state(&self) -> LifecycleState;
}

/// A single-actuator tool.
pub trait ToolDriver: Send {
    fn init(&mut self, id: ActuatorId, device_name: &str, baud_rate: u32)
    -> Result<(), ActuatorError>;

    fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError>;

    fn id(&self) -> Option<ActuatorId>;

    fn enable(&mut self) -> Result<(), ActuatorError>;

    fn disable(&mut self) -> Result<(), ActuatorError>;

    fn send_value(&mut self, angle_rad: f64) -> Result<(), ActuatorError>;

    /// `None` when there is no fresh data.
    fn receive_value(&mut self) -> Option<f64>;

    fn state(&self) -> LifecycleState;
}

impl<B: ActuatorBus> JointDriver for JointGroupActuator<B> {
    fn init(
        &mut self,
        ids: &[ActuatorId],
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError> {
        self.initialize(ids, device_name, baud_rate)
    }

    fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError> {
        JointGroupActuator::set_mode(self, command)
    }

    fn ids(&self) -> Vec<ActuatorId> {
        JointGroupActuator::ids(self).to_vec()
    }

    fn enable(&mut self) -> Result<(), ActuatorError> {
        JointGroupActuator::enable(self)
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        JointGroupActuator::disable(self)
    }

    fn send_values(&mut self, ids: &[ActuatorId], angles_rad: &[f64]) -> Result<(), ActuatorError> {
        self.send_group_values(ids, angles_rad)
    }

    fn receive_values(&mut self, ids: &[ActuatorId]) -> Vec<f64> {
        self.receive_group_values(ids)
    }

    fn state(&self) -> LifecycleState {
        JointGroupActuator::state(self)
    }
}

impl<B: ActuatorBus> ToolDriver for ToolActuator<B> {
    fn init(
        &mut self,
        id: ActuatorId,
        device_name: &str,
        baud_rate: u32,
    ) -> Result<(), ActuatorError> {
        self.initialize(id, device_name, baud_rate)
    }

    fn set_mode(&mut self, command: &ModeCommand) -> Result<(), ActuatorError> {
        ToolActuator::set_mode(self, command)
    }

    fn id(&self) -> Option<ActuatorId> {
        ToolActuator::id(self)
    }

    fn enable(&mut self) -> Result<(), ActuatorError> {
        ToolActuator::enable(self)
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        ToolActuator::disable(self)
    }

    fn send_value(&mut self, angle_rad: f64) -> Result<(), ActuatorError> {
        ToolActuator::send_value(self, angle_rad)
    }

    fn receive_value(&mut self) -> Option<f64> {
        ToolActuator::receive_value(self)
    }

    fn state(&self) -> LifecycleState {
        ToolActuator::state(self)
    }
}
