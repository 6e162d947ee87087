//! `armsync-hal` – Synchronized actuator-group control over a serial bus
//!
//! Drives groups of position-controlled servo actuators that share one
//! half-duplex bus.  Goal positions for a whole group go out in a single
//! batched write and feedback comes back in a single batched read, so every
//! joint of an arm moves and samples on the same bus cycle.
//!
//! # Modules
//!
//! - [`bus`] – [`ActuatorBus`][bus::ActuatorBus]: the primitive bus
//!   operations (open, ping, mode and register writes, torque, batched
//!   transactions, unit conversion) that everything above is written against.
//! - [`control_table`] – register addresses and per-model conversion
//!   constants for the supported actuator models.
//! - [`sim`] – [`SimBus`][sim::SimBus]: an in-memory bus with a call log and
//!   fault injection, used by tests and by the CLI's dry-run mode.
//! - [`group`] – [`ActuatorGroup`][group::ActuatorGroup]: the lifecycle and
//!   transaction core shared by joints and tools.
//! - [`joint_group`] – [`JointGroupActuator`][joint_group::JointGroupActuator]:
//!   a multi-joint arm.
//! - [`tool`] – [`ToolActuator`][tool::ToolActuator]: a single-actuator end
//!   effector.
//! - [`actuator`] – [`JointDriver`][actuator::JointDriver] and
//!   [`ToolDriver`][actuator::ToolDriver]: object-safe driver traits.
//! - [`registry`] – [`ActuatorRegistry`][registry::ActuatorRegistry]: named
//!   drivers plus the [`ActuatorCommand`][armsync_types::ActuatorCommand]
//!   dispatcher.
//!
//! # Example
//!
//! ```rust
//! use armsync_hal::{JointGroupActuator, SimBus, XM430_W350};
//! use armsync_types::OperatingMode;
//!
//! let mut arm = JointGroupActuator::new(SimBus::new().with_servos(&[11, 12], XM430_W350));
//! arm.initialize(&[11, 12], "/dev/ttyUSB0", 1_000_000).unwrap();
//! arm.set_operating_mode(OperatingMode::Position).unwrap();
//! arm.set_sdk_handler(11).unwrap();
//! arm.enable().unwrap();
//! arm.send_group_values(&[11, 12], &[0.0, 0.5]).unwrap();
//! assert_eq!(arm.receive_group_values(&[11, 12]).len(), 2);
//! ```

pub mod actuator;
pub mod bus;
pub mod control_table;
pub mod group;
pub mod joint_group;
pub mod registry;
pub mod sim;
pub mod tool;

pub use actuator::{JointDriver, ToolDriver};
pub use bus::{ActuatorBus, HandlerRef, ModeKind, RawSample};
pub use control_table::{ActuatorModel, XL430_W250, XM430_W350, XM540_W270};
pub use group::ActuatorGroup;
pub use joint_group::JointGroupActuator;
pub use registry::ActuatorRegistry;
pub use sim::{BusCall, SimBus, SimHandle};
pub use tool::ToolActuator;
