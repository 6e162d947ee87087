//! `armsync-runtime` – Control loop and process plumbing
//!
//! Runs an arm built from `armsync-hal` drivers at a fixed rate.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: owns an
//!   [`ActuatorRegistry`][armsync_hal::ActuatorRegistry], plays back planned
//!   paths one waypoint per tick and samples the arm every tick.
//! - [`trajectory`] – [`PlannedPath`][trajectory::PlannedPath] and
//!   [`Waypoint`][trajectory::Waypoint]: the plan format handed over by an
//!   external motion planner.
//! - [`gripper`] – [`GripCommand`][gripper::GripCommand]: the `grip_on` /
//!   `grip_off` / `neutral` vocabulary and its configured angles.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to export spans.

pub mod control_loop;
pub mod gripper;
pub mod telemetry;
pub mod trajectory;

pub use control_loop::{ArmState, ControlError, ControlLoop, ControlLoopConfig, TickReport};
pub use gripper::{GripCommand, GripperPositions, UnknownGripCommand};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use trajectory::{PlannedPath, Waypoint};
