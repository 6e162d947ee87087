//! [`ActuatorRegistry`] – maps logical names to drivers and dispatches
//! [`ActuatorCommand`]s.
//!
//! A manipulator usually registers its joint group as `"joint"` and its
//! gripper as `"gripper"`.  Every command names its target; the registry
//! resolves it, checks that the command fits the driver's cardinality and
//! forwards it.

use std::collections::HashMap;

use armsync_types::{ActuatorCommand, ActuatorError, ActuatorId, CommandReply};
use tracing::{debug, warn};

use crate::actuator::{JointDriver, ToolDriver};

enum Driver {
    Joint(Box<dyn JointDriver>),
    Tool(Box<dyn ToolDriver>),
}

/// Named actuator drivers and the command dispatcher over them.
#[derive(Default)]
pub struct ActuatorRegistry {
    drivers: HashMap<String, Driver>,
}

impl ActuatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a joint group under `name`, replacing any driver with the
    /// same name.
    pub fn register_joint_group(&mut self, name: impl Into<String>, driver: Box<dyn JointDriver>) {
        self.drivers.insert(name.into(), Driver::Joint(driver));
    }

    /// Register a tool under `name`, replacing any driver with the same name.
    pub fn register_tool(&mut self, name: impl Into<String>, driver: Box<dyn ToolDriver>) {
        self.drivers.insert(name.into(), Driver::Tool(driver));
    }

    pub fn joint_group_mut(&mut self, name: &str) -> Option<&mut (dyn JointDriver + 'static)> {
        match self.drivers.get_mut(name) {
            Some(Driver::Joint(d)) => Some(d.as_mut()),
            _ => None,
        }
    }

    pub fn tool_mut(&mut self, name: &str) -> Option<&mut (dyn ToolDriver + 'static)> {
        match self.drivers.get_mut(name) {
            Some(Driver::Tool(d)) => Some(d.as_mut()),
            _ => None,
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Execute `command` on its target driver.
    ///
    /// # Errors
    ///
    /// - [`ActuatorError::UnknownTarget`] – nothing is registered under the
    ///   command's target.
    /// - [`ActuatorError::InvalidCommand`] – a tool command that does not
    ///   carry exactly one id/angle, or an id other than the tool's.
    /// - anything the driver itself returns.
    pub fn dispatch(&mut self, command: ActuatorCommand) -> Result<CommandReply, ActuatorError> {
        let target = command.target().to_string();
        debug!(target = %target, command = ?command, "dispatching actuator command");
        match self.drivers.get_mut(&target) {
            Some(Driver::Joint(driver)) => dispatch_joint(driver.as_mut(), command),
            Some(Driver::Tool(driver)) => dispatch_tool(driver.as_mut(), command),
            None => Err(ActuatorError::UnknownTarget(target)),
        }
    }

    /// Disable torque on every registered driver, continuing past failures.
    /// Returns the drivers that failed, with their errors.
    pub fn disable_all(&mut self) -> Vec<(String, ActuatorError)> {
        let mut failures = Vec::new();
        for name in self.names() {
            let result = match self.drivers.get_mut(&name) {
                Some(Driver::Joint(d)) => d.disable(),
                Some(Driver::Tool(d)) => d.disable(),
                None => continue,
            };
            if let Err(e) = result {
                warn!(target = %name, error = %e, "disable failed");
                failures.push((name, e));
            }
        }
        failures
    }
}

fn dispatch_joint(
    driver: &mut dyn JointDriver,
    command: ActuatorCommand,
) -> Result<CommandReply, ActuatorError> {
    match command {
        ActuatorCommand::Init {
            ids,
            device_name,
            baud_rate,
            ..
        } => driver
            .init(&ids, &device_name, baud_rate)
            .map(|()| CommandReply::Done),
        ActuatorCommand::SetMode { command, .. } => {
            driver.set_mode(&command).map(|()| CommandReply::Done)
        }
        ActuatorCommand::GetId { .. } => Ok(CommandReply::Ids(driver.ids())),
        ActuatorCommand::Enable { .. } => driver.enable().map(|()| CommandReply::Done),
        ActuatorCommand::Disable { .. } => driver.disable().map(|()| CommandReply::Done),
        ActuatorCommand::SendValue {
            ids, angles_rad, ..
        } => driver
            .send_values(&ids, &angles_rad)
            .map(|()| CommandReply::Done),
        ActuatorCommand::ReceiveValue { ids, .. } => {
            Ok(CommandReply::Values(driver.receive_values(&ids)))
        }
    }
}

fn dispatch_tool(
    driver: &mut dyn ToolDriver,
    command: ActuatorCommand,
) -> Result<CommandReply, ActuatorError> {
    match command {
        ActuatorCommand::Init {
            ids,
            device_name,
            baud_rate,
            ..
        } => {
            let id = single_id(&ids)?;
            driver
                .init(id, &device_name, baud_rate)
                .map(|()| CommandReply::Done)
        }
        ActuatorCommand::SetMode { command, .. } => {
            driver.set_mode(&command).map(|()| CommandReply::Done)
        }
        ActuatorCommand::GetId { .. } => Ok(CommandReply::Ids(driver.id().into_iter().collect())),
        ActuatorCommand::Enable { .. } => driver.enable().map(|()| CommandReply::Done),
        ActuatorCommand::Disable { .. } => driver.disable().map(|()| CommandReply::Done),
        ActuatorCommand::SendValue {
            ids, angles_rad, ..
        } => {
            let id = single_id(&ids)?;
            check_tool_id(driver, id)?;
            let [angle] = angles_rad.as_slice() else {
                return Err(ActuatorError::LengthMismatch {
                    expected: 1,
                    found: angles_rad.len(),
                });
            };
            driver.send_value(*angle).map(|()| CommandReply::Done)
        }
        ActuatorCommand::ReceiveValue { ids, .. } => {
            let id = single_id(&ids)?;
            check_tool_id(driver, id)?;
            Ok(CommandReply::Values(driver.receive_value().into_iter().collect()))
        }
    }
}

fn single_id(ids: &[ActuatorId]) -> Result<ActuatorId, ActuatorError> {
    match ids {
        [id] => Ok(*id),
        _ => Err(ActuatorError::InvalidCommand(format!(
            "a tool takes exactly one id, got {}",
            ids.len()
        ))),
    }
}

fn check_tool_id(driver: &dyn ToolDriver, id: ActuatorId) -> Result<(), ActuatorError> {
    match driver.id() {
        Some(own) if own == id => Ok(()),
        _ => Err(ActuatorError::UnknownId(id)),
    }
}
