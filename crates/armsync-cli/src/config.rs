//! Configuration vault – reads/writes `~/.armsync/config.toml`.

use armsync_runtime::{ControlLoopConfig, GripperPositions};
use armsync_types::{ActuatorId, UnknownModePolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One control-table register written after the operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Register name, e.g. `"Profile_Velocity"`.
    pub register: String,
    pub value: i32,
}

/// Persisted arm configuration stored in `~/.armsync/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device shared by the joints and the tool.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Joint bus ids in kinematic order.
    #[serde(default = "default_joint_ids")]
    pub joint_ids: Vec<ActuatorId>,

    #[serde(default = "default_tool_id")]
    pub tool_id: ActuatorId,

    #[serde(default = "default_joint_mode")]
    pub joint_mode: String,

    #[serde(default = "default_tool_mode")]
    pub tool_mode: String,

    /// Registers written to the joints after the mode is set.
    #[serde(default)]
    pub profile: Vec<ProfileEntry>,

    #[serde(default = "default_frequency")]
    pub iteration_frequency_hz: u32,

    #[serde(default = "default_grip_on")]
    pub grip_on_rad: f64,

    #[serde(default = "default_grip_off")]
    pub grip_off_rad: f64,

    #[serde(default)]
    pub neutral_rad: f64,

    /// What to do with a mode name that is not recognised.
    #[serde(default)]
    pub unknown_mode_policy: UnknownModePolicy,
}

fn default_device_name() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    1_000_000
}
fn default_joint_ids() -> Vec<ActuatorId> {
    vec![11, 12, 13, 14]
}
fn default_tool_id() -> ActuatorId {
    15
}
fn default_joint_mode() -> String {
    "position_mode".to_string()
}
fn default_tool_mode() -> String {
    "current_based_position_mode".to_string()
}
fn default_frequency() -> u32 {
    100
}
fn default_grip_on() -> f64 {
    0.01
}
fn default_grip_off() -> f64 {
    -0.01
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            baud_rate: default_baud_rate(),
            joint_ids: default_joint_ids(),
            tool_id: default_tool_id(),
            joint_mode: default_joint_mode(),
            tool_mode: default_tool_mode(),
            profile: Vec::new(),
            iteration_frequency_hz: default_frequency(),
            grip_on_rad: default_grip_on(),
            grip_off_rad: default_grip_off(),
            neutral_rad: 0.0,
            unknown_mode_policy: UnknownModePolicy::default(),
        }
    }
}

impl Config {
    pub fn gripper_positions(&self) -> GripperPositions {
        GripperPositions {
            grip_on_rad: self.grip_on_rad,
            grip_off_rad: self.grip_off_rad,
            neutral_rad: self.neutral_rad,
        }
    }

    pub fn loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            iteration_frequency_hz: self.iteration_frequency_hz,
            gripper: self.gripper_positions(),
            ..ControlLoopConfig::default()
        }
    }
}

/// Return the path to `~/.armsync/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armsync").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ARMSYNC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMSYNC_DEVICE` | `device_name` |
/// | `ARMSYNC_BAUD_RATE` | `baud_rate` |
/// | `ARMSYNC_FREQUENCY_HZ` | `iteration_frequency_hz` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMSYNC_DEVICE") {
        cfg.device_name = v;
    }
    if let Ok(v) = std::env::var("ARMSYNC_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("ARMSYNC_FREQUENCY_HZ")
        && let Ok(hz) = v.parse::<u32>()
        && hz > 0
    {
        cfg.iteration_frequency_hz = hz;
    }
}

/// Save the config to disk, creating `~/.armsync/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
