use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Bus address of a single actuator.
pub type ActuatorId = u8;

/// Control law an actuator group runs under.  Applied uniformly to every id
/// of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Plain (extended-range disabled) position control.
    Position,
    /// Position control with a current ceiling, used for compliant grippers.
    CurrentBasedPosition,
    /// Continuous rotation under velocity control.
    Velocity,
}

impl OperatingMode {
    /// Command-surface name of the mode, e.g. `"position_mode"`.
    pub const fn name(self) -> &'static str {
        match self {
            OperatingMode::Position => "position_mode",
            OperatingMode::CurrentBasedPosition => "current_based_position_mode",
            OperatingMode::Velocity => "velocity_mode",
        }
    }

    /// Resolve a command-surface mode name.  Returns `None` for anything that
    /// is not a predefined mode (which the parser treats as a register name).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "position_mode" => Some(OperatingMode::Position),
            "current_based_position_mode" => Some(OperatingMode::CurrentBasedPosition),
            "velocity_mode" => Some(OperatingMode::Velocity),
            _ => None,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with a lone mode argument that names neither a predefined mode
/// nor carries a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownModePolicy {
    /// Treat it as [`OperatingMode::Position`] and log a warning.
    #[default]
    FallbackToPosition,
    /// Reject it with [`ActuatorError::InvalidCommand`].
    Reject,
}

/// A configuration command for an actuator group: either switch to a
/// predefined operating mode or write one named control-table register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModeCommand {
    SetMode { mode: OperatingMode },
    SetRegister { name: String, value: i32 },
}

impl ModeCommand {
    /// Parse the positional argument list of a `set_mode` command.
    ///
    /// | args | result |
    /// |---|---|
    /// | `["position_mode"]` | `SetMode { Position }` |
    /// | `["Profile_Velocity", "50"]` | `SetRegister { "Profile_Velocity", 50 }` |
    /// | `["bogus"]` | per `policy` |
    ///
    /// # Errors
    ///
    /// [`ActuatorError::InvalidCommand`] for an empty list, a register value
    /// that is not an integer, or an unknown lone name under
    /// [`UnknownModePolicy::Reject`].
    pub fn parse<S: AsRef<str>>(
        args: &[S],
        policy: UnknownModePolicy,
    ) -> Result<Self, ActuatorError> {
        let Some(head) = args.first().map(|s| s.as_ref().trim()) else {
            return Err(ActuatorError::InvalidCommand("empty mode command".to_string()));
        };

        if let Some(mode) = OperatingMode::from_name(head) {
            return Ok(ModeCommand::SetMode { mode });
        }

        match args.get(1).map(|s| s.as_ref().trim()) {
            Some(raw) => {
                let value = raw.parse::<i32>().map_err(|e| {
                    ActuatorError::InvalidCommand(format!(
                        "register '{head}' value '{raw}' is not an integer: {e}"
                    ))
                })?;
                Ok(ModeCommand::SetRegister {
                    name: head.to_string(),
                    value,
                })
            }
            None => match policy {
                UnknownModePolicy::FallbackToPosition => {
                    warn!(mode = head, "unrecognised mode name; falling back to position_mode");
                    Ok(ModeCommand::SetMode {
                        mode: OperatingMode::Position,
                    })
                }
                UnknownModePolicy::Reject => Err(ActuatorError::InvalidCommand(format!(
                    "unknown mode '{head}' and no register value given"
                ))),
            },
        }
    }
}

/// Commands accepted by the actuator registry.  `target` is the logical name
/// a driver was registered under (e.g. `"joint"` or `"gripper"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum ActuatorCommand {
    Init {
        target: String,
        ids: Vec<ActuatorId>,
        device_name: String,
        baud_rate: u32,
    },
    SetMode {
        target: String,
        command: ModeCommand,
    },
    GetId {
        target: String,
    },
    Enable {
        target: String,
    },
    Disable {
        target: String,
    },
    SendValue {
        target: String,
        ids: Vec<ActuatorId>,
        angles_rad: Vec<f64>,
    },
    ReceiveValue {
        target: String,
        ids: Vec<ActuatorId>,
    },
}

impl ActuatorCommand {
    /// Logical name of the driver this command is addressed to.
    pub fn target(&self) -> &str {
        match self {
            ActuatorCommand::Init { target, .. }
            | ActuatorCommand::SetMode { target, .. }
            | ActuatorCommand::GetId { target }
            | ActuatorCommand::Enable { target }
            | ActuatorCommand::Disable { target }
            | ActuatorCommand::SendValue { target, .. }
            | ActuatorCommand::ReceiveValue { target, .. } => target,
        }
    }
}

/// Result payload of a dispatched [`ActuatorCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "data", rename_all = "snake_case")]
pub enum CommandReply {
    Done,
    Ids(Vec<ActuatorId>),
    /// Angles in radians.  Empty when the read produced no fresh data.
    Values(Vec<f64>),
}

/// Lifecycle stage of an actuator group.  Stages are ordered; an operation
/// that needs a stage is allowed in every later stage too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    ModeSet,
    HandlersReady,
    /// Handlers registered and torque enabled on every id.
    Operational,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::ModeSet => "mode-set",
            LifecycleState::HandlersReady => "handlers-ready",
            LifecycleState::Operational => "operational",
        };
        f.write_str(s)
    }
}

/// Decoded feedback of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointFeedback {
    pub id: ActuatorId,
    pub position_rad: f64,
    pub velocity_rad_s: f64,
    pub current_ma: f64,
}

/// Feedback of a whole group taken in one batched read, in group id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackFrame {
    pub sampled_at: DateTime<Utc>,
    pub joints: Vec<JointFeedback>,
}

impl FeedbackFrame {
    /// Positions in radians, in the same order as [`FeedbackFrame::joints`].
    pub fn positions(&self) -> Vec<f64> {
        self.joints.iter().map(|j| j.position_rad).collect()
    }
}

/// Diagnostic returned by a bus transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{details}")]
pub struct BusError {
    pub details: String,
}

impl BusError {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
        }
    }
}

/// Outcome of a per-id loop that stopped at its first failing id.
///
/// Ids in `applied` were changed and are not rolled back; ids in `skipped`
/// were never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub id: ActuatorId,
    pub details: String,
    pub applied: Vec<ActuatorId>,
    pub skipped: Vec<ActuatorId>,
}

/// Error type of the actuator synchronization layer.
///
/// None of these are fatal to the process; the caller decides whether to
/// retry on a later tick.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorError {
    #[error("Connection failure on {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Actuator {id} did not answer ping: {details}")]
    NoResponse { id: ActuatorId, details: String },

    #[error("Actuator {id} reports model {found}, group expects model {expected}")]
    ModelMismatch {
        id: ActuatorId,
        expected: u16,
        found: u16,
    },

    #[error("Mode set failed on actuator {}: {}", .0.id, .0.details)]
    ModeSet(UnitFailure),

    #[error("Register write failed on actuator {}: {}", .0.id, .0.details)]
    RegisterWrite(UnitFailure),

    #[error("Torque toggle failed on actuator {}: {}", .0.id, .0.details)]
    Torque(UnitFailure),

    #[error("Handler registration failed: {0}")]
    HandlerRegistration(String),

    #[error("Batched write failed: {0}")]
    BatchedWrite(String),

    #[error("Batched read failed: {0}")]
    BatchedRead(String),

    #[error("`{operation}` requires the group to be {required}, but it is {current}")]
    NotReady {
        operation: String,
        required: LifecycleState,
        current: LifecycleState,
    },

    #[error("Expected {expected} values, got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Actuator {0} is not a member of this group")]
    UnknownId(ActuatorId),

    #[error("No driver registered under '{0}'")]
    UnknownTarget(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl ActuatorError {
    /// The structured partial-failure report, for per-id loop failures.
    pub fn unit_failure(&self) -> Option<&UnitFailure> {
        match self {
            ActuatorError::ModeSet(f) | ActuatorError::RegisterWrite(f) | ActuatorError::Torque(f) => {
                Some(f)
            }
            _ => None,
        }
    }
}
