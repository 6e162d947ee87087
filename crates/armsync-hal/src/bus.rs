//! [`ActuatorBus`] – the transport capability actuator groups are built on.
//!
//! A bus owns one device session (serial port, USB adapter, …) and exposes
//! the register-level operations a group needs: discovery, mode changes,
//! named register writes, torque control and the two batched transactions.
//! Groups never see bytes; everything that depends on the servo model,
//! including unit conversion, stays behind this trait.
//!
//! Every call blocks for its transport round-trip.  Failures come back as
//! [`BusError`] diagnostics and are never retried here.

use armsync_types::{ActuatorId, BusError, OperatingMode};

/// Opaque reference to a transaction template registered on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(u16);

impl HandlerRef {
    /// Wrap a bus-specific handler index.
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u16 {
        self.0
    }
}

/// Mode change requested from the bus, with its profile parameters.  A limit
/// of `0` leaves the device default in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    PlainPosition { velocity_limit: u32, accel_limit: u32 },
    CurrentBasedPosition { current_limit: u32 },
    Velocity { accel_limit: u32 },
}

impl ModeKind {
    /// The mode-set request for `mode` with every limit at the device default.
    pub const fn with_device_defaults(mode: OperatingMode) -> Self {
        match mode {
            OperatingMode::Position => ModeKind::PlainPosition {
                velocity_limit: 0,
                accel_limit: 0,
            },
            OperatingMode::CurrentBasedPosition => {
                ModeKind::CurrentBasedPosition { current_limit: 0 }
            }
            OperatingMode::Velocity => ModeKind::Velocity { accel_limit: 0 },
        }
    }

    pub const fn mode(self) -> OperatingMode {
        match self {
            ModeKind::PlainPosition { .. } => OperatingMode::Position,
            ModeKind::CurrentBasedPosition { .. } => OperatingMode::CurrentBasedPosition,
            ModeKind::Velocity { .. } => OperatingMode::Velocity,
        }
    }
}

/// One actuator's slice of a feedback-block read, in register units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub current: i32,
    pub velocity: i32,
    pub position: i32,
}

/// Register-level access to a bus of networked servo actuators.
pub trait ActuatorBus: Send {
    /// Open the device at `device_name` with `baud_rate`.
    fn open(&mut self, device_name: &str, baud_rate: u32) -> Result<(), BusError>;

    /// Release the device session.  Closing a closed bus is a no-op.
    fn close(&mut self);

    /// Ping `id` and return the model number it reports.
    fn ping(&mut self, id: ActuatorId) -> Result<u16, BusError>;

    /// Human-readable model name of a pinged actuator, when known.
    fn model_name(&self, _id: ActuatorId) -> Option<String> {
        None
    }

    fn set_mode(&mut self, id: ActuatorId, kind: ModeKind) -> Result<(), BusError>;

    /// Write `value` to the control-table register called `register`.
    fn write_register(&mut self, id: ActuatorId, register: &str, value: i32)
    -> Result<(), BusError>;

    /// Register a batched-write template for `register`, using `id` as the
    /// model reference for its address and length.
    fn register_write_handler(
        &mut self,
        id: ActuatorId,
        register: &str,
    ) -> Result<HandlerRef, BusError>;

    /// Register a batched-read template covering `length` bytes from
    /// `start_address`.
    fn register_read_handler(
        &mut self,
        start_address: u16,
        length: u16,
    ) -> Result<HandlerRef, BusError>;

    fn torque_on(&mut self, id: ActuatorId) -> Result<(), BusError>;

    fn torque_off(&mut self, id: ActuatorId) -> Result<(), BusError>;

    /// Write `values[i]` to `ids[i]` for every `i` in one transaction.
    fn batched_write(
        &mut self,
        handler: HandlerRef,
        ids: &[ActuatorId],
        values: &[i32],
    ) -> Result<(), BusError>;

    /// Read the handler's block from every id in one transaction.  The result
    /// is in `ids` order.
    fn batched_read(
        &mut self,
        handler: HandlerRef,
        ids: &[ActuatorId],
    ) -> Result<Vec<RawSample>, BusError>;

    fn radian_to_raw(&self, id: ActuatorId, radians: f64) -> i32;

    fn raw_to_radian(&self, id: ActuatorId, raw: i32) -> f64;

    /// Present-velocity units to rad/s.
    fn raw_to_velocity(&self, id: ActuatorId, raw: i32) -> f64;

    /// Present-current units to mA.
    fn raw_to_current(&self, id: ActuatorId, raw: i32) -> f64;
}
