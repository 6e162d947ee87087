//! Arm assembly – builds the actuator registry and brings every component
//! to `Operational` through the command surface.

use armsync_hal::{ActuatorRegistry, JointGroupActuator, SimBus, ToolActuator, XM430_W350};
use armsync_types::{ActuatorCommand, ActuatorError, ModeCommand};
use tracing::info;

use crate::config::Config;

pub const JOINT: &str = "joint";
pub const GRIPPER: &str = "gripper";

/// Registry with the configured joints and tool on in-process simulated
/// buses.
pub fn sim_registry(cfg: &Config) -> ActuatorRegistry {
    let mut registry = ActuatorRegistry::new();
    registry.register_joint_group(
        JOINT,
        Box::new(JointGroupActuator::new(
            SimBus::new().with_servos(&cfg.joint_ids, XM430_W350),
        )),
    );
    registry.register_tool(
        GRIPPER,
        Box::new(ToolActuator::new(
            SimBus::new().with_servo(cfg.tool_id, XM430_W350),
        )),
    );
    registry
}

/// Initialize, configure and enable the joints and the tool.
///
/// Profile registers go to the joints after their mode is set.
pub fn bring_up(registry: &mut ActuatorRegistry, cfg: &Config) -> Result<(), ActuatorError> {
    let joint_mode = ModeCommand::parse(&[cfg.joint_mode.as_str()], cfg.unknown_mode_policy)?;
    let tool_mode = ModeCommand::parse(&[cfg.tool_mode.as_str()], cfg.unknown_mode_policy)?;

    registry.dispatch(ActuatorCommand::Init {
        target: JOINT.to_string(),
        ids: cfg.joint_ids.clone(),
        device_name: cfg.device_name.clone(),
        baud_rate: cfg.baud_rate,
    })?;
    registry.dispatch(ActuatorCommand::SetMode {
        target: JOINT.to_string(),
        command: joint_mode,
    })?;
    for entry in &cfg.profile {
        registry.dispatch(ActuatorCommand::SetMode {
            target: JOINT.to_string(),
            command: ModeCommand::SetRegister {
                name: entry.register.clone(),
                value: entry.value,
            },
        })?;
    }

    registry.dispatch(ActuatorCommand::Init {
        target: GRIPPER.to_string(),
        ids: vec![cfg.tool_id],
        device_name: cfg.device_name.clone(),
        baud_rate: cfg.baud_rate,
    })?;
    registry.dispatch(ActuatorCommand::SetMode {
        target: GRIPPER.to_string(),
        command: tool_mode,
    })?;

    registry.dispatch(ActuatorCommand::Enable {
        target: JOINT.to_string(),
    })?;
    registry.dispatch(ActuatorCommand::Enable {
        target: GRIPPER.to_string(),
    })?;
    info!(joints = cfg.joint_ids.len(), tool = cfg.tool_id, "arm operational");
    Ok(())
}
