//! [`ControlLoop`] – fixed-rate waypoint playback over an
//! [`ActuatorRegistry`].
//!
//! Each tick emits at most one waypoint of the loaded plan (one batched
//! joint write, then one tool write), then samples the arm (one batched
//! joint read, then one tool read).  The loop keeps sampling while idle so
//! callers always get a fresh [`ArmState`].
//!
//! A new plan is refused while the current one still has waypoints left.
//! A failed write abandons the rest of the plan; a failed read only leaves
//! that tick's sample empty.
//!
//! # Example
//!
//! ```rust
//! use armsync_hal::{ActuatorRegistry, JointGroupActuator, SimBus, ToolActuator, XM430_W350};
//! use armsync_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//! use armsync_types::{ActuatorCommand, ModeCommand, OperatingMode};
//!
//! let mut registry = ActuatorRegistry::new();
//! registry.register_joint_group(
//!     "joint",
//!     Box::new(JointGroupActuator::new(SimBus::new().with_servos(&[1, 2], XM430_W350))),
//! );
//! registry.register_tool(
//!     "gripper",
//!     Box::new(ToolActuator::new(SimBus::new().with_servo(3, XM430_W350))),
//! );
//! for (target, ids) in [("joint", vec![1, 2]), ("gripper", vec![3])] {
//!     let target = target.to_string();
//!     registry.dispatch(ActuatorCommand::Init {
//!         target: target.clone(),
//!         ids,
//!         device_name: "/dev/sim".into(),
//!         baud_rate: 1_000_000,
//!     }).unwrap();
//!     registry.dispatch(ActuatorCommand::SetMode {
//!         target: target.clone(),
//!         command: ModeCommand::SetMode { mode: OperatingMode::Position },
//!     }).unwrap();
//!     registry.dispatch(ActuatorCommand::Enable { target }).unwrap();
//! }
//!
//! let mut control = ControlLoop::new(registry, ControlLoopConfig::default()).unwrap();
//! control.command_gripper("grip_on").unwrap();
//! let report = control.tick().unwrap();
//! assert!(report.waypoint_applied);
//! assert_eq!(report.state.joint_positions_rad.len(), 2);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use armsync_hal::ActuatorRegistry;
use armsync_types::{ActuatorError, ActuatorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::gripper::{GripCommand, GripperPositions, UnknownGripCommand};
use crate::trajectory::{PlannedPath, Playback, Waypoint};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopConfig {
    /// Registry name of the joint group.
    pub joint_target: String,
    /// Registry name of the tool, if the arm has one.
    pub tool_target: Option<String>,
    /// Ticks per second.
    pub iteration_frequency_hz: u32,
    pub gripper: GripperPositions,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            joint_target: "joint".to_string(),
            tool_target: Some("gripper".to_string()),
            iteration_frequency_hz: 100,
            gripper: GripperPositions::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors and reports
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("robot is working: {remaining} waypoint(s) of the current plan left")]
    Busy { remaining: usize },

    #[error("waypoint {index} has {found} joint goals, the group has {expected} joints")]
    WaypointWidth {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("plan moves the tool but no tool is configured")]
    NoTool,

    #[error("no joint group registered as {0:?}")]
    MissingJointGroup(String),

    #[error("no tool registered as {0:?}")]
    MissingTool(String),

    #[error("iteration frequency must be at least 1 Hz")]
    InvalidFrequency,

    #[error(transparent)]
    Grip(#[from] UnknownGripCommand),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

/// One sample of the arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    pub sampled_at: DateTime<Utc>,
    /// Joint angles in group order; empty when the read failed.
    pub joint_positions_rad: Vec<f64>,
    pub tool_position_rad: Option<f64>,
}

/// Outcome of one [`ControlLoop::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// A waypoint was written this tick.
    pub waypoint_applied: bool,
    /// The plan ran out on this tick.
    pub completed: bool,
    /// Waypoints still queued.
    pub remaining: usize,
    pub state: ArmState,
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct ControlLoop {
    registry: ActuatorRegistry,
    config: ControlLoopConfig,
    period: Duration,
    playback: Playback,
    joint_ids: Vec<ActuatorId>,
    tool_id: Option<ActuatorId>,
}

impl ControlLoop {
    /// Take ownership of an initialized registry.
    ///
    /// The joint and tool ids are read here and stay fixed while the loop
    /// owns the registry; re-initialize through [`ControlLoop::into_registry`]
    /// and build a new loop.
    ///
    /// # Errors
    ///
    /// [`ControlError::MissingJointGroup`] / [`ControlError::MissingTool`]
    /// when a configured target is not registered, and
    /// [`ControlError::InvalidFrequency`] for a zero frequency.
    pub fn new(
        mut registry: ActuatorRegistry,
        config: ControlLoopConfig,
    ) -> Result<Self, ControlError> {
        if config.iteration_frequency_hz == 0 {
            return Err(ControlError::InvalidFrequency);
        }
        let joint_ids = registry
            .joint_group_mut(&config.joint_target)
            .ok_or_else(|| ControlError::MissingJointGroup(config.joint_target.clone()))?
            .ids();
        let tool_id = match &config.tool_target {
            Some(name) => registry
                .tool_mut(name)
                .ok_or_else(|| ControlError::MissingTool(name.clone()))?
                .id(),
            None => None,
        };
        let period = Duration::from_nanos(1_000_000_000 / u64::from(config.iteration_frequency_hz));
        Ok(Self {
            registry,
            config,
            period,
            playback: Playback::default(),
            joint_ids,
            tool_id,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// A plan is executing.
    pub fn is_moving(&self) -> bool {
        self.playback.is_moving()
    }

    /// Queue `path` for playback from the next tick.
    ///
    /// # Errors
    ///
    /// - [`ControlError::Busy`] – the previous plan has not finished.
    /// - [`ControlError::WaypointWidth`] – a waypoint's joint vector is
    ///   neither empty nor as wide as the group.
    /// - [`ControlError::NoTool`] – a waypoint moves the tool on an arm
    ///   without one.
    pub fn load_path(&mut self, path: PlannedPath) -> Result<(), ControlError> {
        if self.playback.is_moving() {
            let remaining = self.playback.remaining();
            warn!(remaining, "robot is working; plan rejected");
            return Err(ControlError::Busy { remaining });
        }
        if let Some((index, found)) = path.first_bad_width(self.joint_ids.len()) {
            return Err(ControlError::WaypointWidth {
                index,
                expected: self.joint_ids.len(),
                found,
            });
        }
        if self.config.tool_target.is_none() && path.waypoints.iter().any(|w| w.tool_rad.is_some())
        {
            return Err(ControlError::NoTool);
        }
        info!(waypoints = path.len(), "plan loaded");
        self.playback.start(path);
        Ok(())
    }

    /// Move the gripper to the angle configured for `command`
    /// (`grip_on`, `grip_off` or `neutral`).
    pub fn command_gripper(&mut self, command: &str) -> Result<(), ControlError> {
        let command: GripCommand = command.parse()?;
        let angle = self.config.gripper.angle(command);
        debug!(%command, angle, "gripper command");
        self.load_path(PlannedPath::new(vec![Waypoint::tool(angle)]))
    }

    /// Drop the rest of the current plan.
    pub fn cancel(&mut self) {
        if self.playback.is_moving() {
            info!(remaining = self.playback.remaining(), "plan cancelled");
        }
        self.playback.cancel();
    }

    /// Emit the next waypoint, if any, then sample the arm.
    ///
    /// # Errors
    ///
    /// The write error of a failed waypoint; the plan is abandoned.
    pub fn tick(&mut self) -> Result<TickReport, ControlError> {
        let was_moving = self.playback.is_moving();
        let waypoint = self.playback.advance().cloned();
        let waypoint_applied = waypoint.is_some();

        if let Some(waypoint) = waypoint {
            if let Err(e) = self.write_waypoint(&waypoint) {
                error!(error = %e, "waypoint write failed; abandoning plan");
                self.playback.cancel();
                return Err(e);
            }
        }

        let state = self.sample()?;
        let completed = was_moving && !self.playback.is_moving();
        if completed {
            info!("plan complete");
        }
        Ok(TickReport {
            waypoint_applied,
            completed,
            remaining: self.playback.remaining(),
            state,
        })
    }

    /// Tick every [`period`][Self::period] until `shutdown` is set.
    ///
    /// Tick errors are logged and the loop keeps going.  Returns the number
    /// of ticks run.
    pub fn run(&mut self, shutdown: &AtomicBool) -> u64 {
        info!(period_ms = self.period.as_millis() as u64, "control loop started");
        let mut ticks = 0u64;
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            if let Err(e) = self.tick() {
                warn!(error = %e, "tick failed");
            }
            ticks += 1;
            match self.period.checked_sub(started.elapsed()) {
                Some(rest) => std::thread::sleep(rest),
                None => debug!(tick = ticks, "tick overran its period"),
            }
        }
        info!(ticks, "control loop stopped");
        ticks
    }

    /// Disable torque on every registered actuator.
    pub fn shutdown(&mut self) -> Vec<(String, ActuatorError)> {
        self.cancel();
        self.registry.disable_all()
    }

    pub fn into_registry(self) -> ActuatorRegistry {
        self.registry
    }

    fn write_waypoint(&mut self, waypoint: &Waypoint) -> Result<(), ControlError> {
        if !waypoint.joints_rad.is_empty() {
            let joints = self
                .registry
                .joint_group_mut(&self.config.joint_target)
                .ok_or_else(|| ControlError::MissingJointGroup(self.config.joint_target.clone()))?;
            joints.send_values(&self.joint_ids, &waypoint.joints_rad)?;
        }
        if let Some(angle) = waypoint.tool_rad {
            let name = self.config.tool_target.as_deref().ok_or(ControlError::NoTool)?;
            let tool = self
                .registry
                .tool_mut(name)
                .ok_or_else(|| ControlError::MissingTool(name.to_string()))?;
            tool.send_value(angle)?;
        }
        Ok(())
    }

    fn sample(&mut self) -> Result<ArmState, ControlError> {
        let joint_positions_rad = self
            .registry
            .joint_group_mut(&self.config.joint_target)
            .ok_or_else(|| ControlError::MissingJointGroup(self.config.joint_target.clone()))?
            .receive_values(&self.joint_ids);
        let tool_position_rad = match (&self.config.tool_target, self.tool_id) {
            (Some(name), Some(_)) => self
                .registry
                .tool_mut(name)
                .and_then(|tool| tool.receive_value()),
            _ => None,
        };
        Ok(ArmState {
            sampled_at: Utc::now(),
            joint_positions_rad,
            tool_position_rad,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use armsync_hal::{JointGroupActuator, SimBus, SimHandle, ToolActuator, XM430_W350};
    use armsync_types::{ActuatorCommand, ModeCommand, OperatingMode};

    const JOINTS: [ActuatorId; 4] = [11, 12, 13, 14];
    const GRIPPER: ActuatorId = 15;

    fn bring_up(registry: &mut ActuatorRegistry, target: &str, ids: Vec<ActuatorId>) {
        registry
            .dispatch(ActuatorCommand::Init {
                target: target.to_string(),
                ids,
                device_name: "/dev/sim".to_string(),
                baud_rate: 1_000_000,
            })
            .unwrap();
        registry
            .dispatch(ActuatorCommand::SetMode {
                target: target.to_string(),
                command: ModeCommand::SetMode {
                    mode: OperatingMode::Position,
                },
            })
            .unwrap();
        registry
            .dispatch(ActuatorCommand::Enable {
                target: target.to_string(),
            })
            .unwrap();
    }

    fn arm(config: ControlLoopConfig) -> (ControlLoop, SimHandle, SimHandle) {
        let joint_bus = SimBus::new().with_servos(&JOINTS, XM430_W350);
        let tool_bus = SimBus::new().with_servo(GRIPPER, XM430_W350);
        let (jh, th) = (joint_bus.handle(), tool_bus.handle());
        let mut registry = ActuatorRegistry::new();
        registry.register_joint_group("joint", Box::new(JointGroupActuator::new(joint_bus)));
        registry.register_tool("gripper", Box::new(ToolActuator::new(tool_bus)));
        bring_up(&mut registry, "joint", JOINTS.to_vec());
        bring_up(&mut registry, "gripper", vec![GRIPPER]);
        (ControlLoop::new(registry, config).unwrap(), jh, th)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= XM430_W350.radians_per_tick()
    }

    #[test]
    fn plays_one_waypoint_per_tick() {
        let (mut control, jh, _) = arm(ControlLoopConfig::default());
        control
            .load_path(PlannedPath::new(vec![
                Waypoint::joints(vec![0.1, 0.2, 0.3, 0.4]),
                Waypoint::joints(vec![0.2, 0.3, 0.4, 0.5]),
            ]))
            .unwrap();

        let first = control.tick().unwrap();
        assert!(first.waypoint_applied);
        assert!(!first.completed);
        assert_eq!(first.remaining, 1);
        assert!(close(first.state.joint_positions_rad[0], 0.1));

        let second = control.tick().unwrap();
        assert!(second.completed);
        assert!(close(second.state.joint_positions_rad[3], 0.5));
        assert_eq!(jh.goal_raw(14), Some(XM430_W350.radian_to_raw(0.5)));

        let idle = control.tick().unwrap();
        assert!(!idle.waypoint_applied);
        assert!(!idle.completed);
        assert_eq!(idle.state.joint_positions_rad.len(), 4);
    }

    #[test]
    fn rejects_new_plan_while_moving() {
        let (mut control, _, _) = arm(ControlLoopConfig::default());
        control
            .load_path(PlannedPath::new(vec![Waypoint::tool(0.0); 2]))
            .unwrap();
        assert_eq!(
            control.command_gripper("grip_on"),
            Err(ControlError::Busy { remaining: 2 })
        );
        control.tick().unwrap();
        control.tick().unwrap();
        assert!(!control.is_moving());
        control.command_gripper("grip_on").unwrap();
    }

    #[test]
    fn gripper_commands_map_to_configured_angles() {
        let (mut control, _, th) = arm(ControlLoopConfig::default());
        control.command_gripper("grip_off").unwrap();
        let report = control.tick().unwrap();
        assert!(close(report.state.tool_position_rad.unwrap(), -0.01));
        assert_eq!(th.goal_raw(GRIPPER), Some(XM430_W350.radian_to_raw(-0.01)));

        assert!(matches!(
            control.command_gripper("squeeze"),
            Err(ControlError::Grip(_))
        ));
    }

    #[test]
    fn rejects_waypoints_of_the_wrong_width() {
        let (mut control, _, _) = arm(ControlLoopConfig::default());
        let err = control
            .load_path(PlannedPath::new(vec![Waypoint::joints(vec![0.0; 3])]))
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::WaypointWidth {
                index: 0,
                expected: 4,
                found: 3
            }
        );
        assert!(!control.is_moving());
    }

    #[test]
    fn failed_write_abandons_the_plan() {
        let (mut control, jh, _) = arm(ControlLoopConfig::default());
        control
            .load_path(PlannedPath::new(vec![Waypoint::joints(vec![0.1; 4]); 3]))
            .unwrap();
        jh.fail_batched_write(true);
        assert!(matches!(
            control.tick(),
            Err(ControlError::Actuator(ActuatorError::BatchedWrite(_)))
        ));
        assert!(!control.is_moving());
    }

    #[test]
    fn failed_read_leaves_an_empty_sample() {
        let (mut control, jh, _) = arm(ControlLoopConfig::default());
        jh.fail_batched_read(true);
        let report = control.tick().unwrap();
        assert!(report.state.joint_positions_rad.is_empty());
        assert!(report.state.tool_position_rad.is_some());
    }

    #[test]
    fn missing_targets_are_reported() {
        let registry = ActuatorRegistry::new();
        assert_eq!(
            ControlLoop::new(registry, ControlLoopConfig::default()).err(),
            Some(ControlError::MissingJointGroup("joint".to_string()))
        );

        let (control, _, _) = arm(ControlLoopConfig::default());
        let registry = control.into_registry();
        let config = ControlLoopConfig {
            tool_target: Some("wrist".to_string()),
            ..ControlLoopConfig::default()
        };
        assert_eq!(
            ControlLoop::new(registry, config).err(),
            Some(ControlError::MissingTool("wrist".to_string()))
        );
    }

    #[test]
    fn rebuilt_loop_uses_reinitialized_ids() {
        let (control, jh, _) = arm(ControlLoopConfig::default());
        let mut registry = control.into_registry();
        bring_up(&mut registry, "joint", vec![11, 12]);
        assert_eq!(jh.torque(13), Some(false));

        let mut control = ControlLoop::new(registry, ControlLoopConfig::default()).unwrap();
        assert!(matches!(
            control.load_path(PlannedPath::new(vec![Waypoint::joints(vec![0.0; 4])])),
            Err(ControlError::WaypointWidth { expected: 2, .. })
        ));
        control
            .load_path(PlannedPath::new(vec![Waypoint::joints(vec![0.1, 0.2])]))
            .unwrap();
        let report = control.tick().unwrap();
        assert!(report.waypoint_applied);
        assert_eq!(report.state.joint_positions_rad.len(), 2);
    }

    #[test]
    fn zero_frequency_is_invalid() {
        let config = ControlLoopConfig {
            iteration_frequency_hz: 0,
            ..ControlLoopConfig::default()
        };
        assert_eq!(
            ControlLoop::new(ActuatorRegistry::new(), config).err(),
            Some(ControlError::InvalidFrequency)
        );
    }

    #[test]
    fn run_stops_on_shutdown_flag() {
        let config = ControlLoopConfig {
            iteration_frequency_hz: 1000,
            ..ControlLoopConfig::default()
        };
        let (mut control, _, _) = arm(config);
        assert_eq!(control.period(), Duration::from_millis(1));

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::SeqCst);
        });
        let ticks = control.run(&shutdown);
        stopper.join().unwrap();
        assert!(ticks > 0);

        shutdown.store(true, Ordering::SeqCst);
        assert_eq!(control.run(&shutdown), 0);
    }

    #[test]
    fn shutdown_disables_every_actuator() {
        let (mut control, jh, th) = arm(ControlLoopConfig::default());
        assert!(control.shutdown().is_empty());
        for id in JOINTS {
            assert_eq!(jh.torque(id), Some(false));
        }
        assert_eq!(th.torque(GRIPPER), Some(false));
    }
}
