//! Gripper command vocabulary.
//!
//! Operators and planners address the gripper with three words:
//! `grip_on`, `grip_off` and `neutral`.  [`GripperPositions`] maps each to a
//! jaw angle in radians.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GripCommand {
    GripOn,
    GripOff,
    Neutral,
}

impl GripCommand {
    pub fn name(self) -> &'static str {
        match self {
            GripCommand::GripOn => "grip_on",
            GripCommand::GripOff => "grip_off",
            GripCommand::Neutral => "neutral",
        }
    }
}

impl fmt::Display for GripCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown gripper command {0:?} (expected grip_on, grip_off or neutral)")]
pub struct UnknownGripCommand(pub String);

impl FromStr for GripCommand {
    type Err = UnknownGripCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "grip_on" => Ok(GripCommand::GripOn),
            "grip_off" => Ok(GripCommand::GripOff),
            "neutral" => Ok(GripCommand::Neutral),
            other => Err(UnknownGripCommand(other.to_string())),
        }
    }
}

/// Jaw angle for each [`GripCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperPositions {
    pub grip_on_rad: f64,
    pub grip_off_rad: f64,
    pub neutral_rad: f64,
}

impl Default for GripperPositions {
    fn default() -> Self {
        Self {
            grip_on_rad: 0.01,
            grip_off_rad: -0.01,
            neutral_rad: 0.0,
        }
    }
}

impl GripperPositions {
    pub fn angle(&self, command: GripCommand) -> f64 {
        match command {
            GripCommand::GripOn => self.grip_on_rad,
            GripCommand::GripOff => self.grip_off_rad,
            GripCommand::Neutral => self.neutral_rad,
        }
    }
}
