//! In-process simulated bus for tests and hardware-free runs.
//!
//! [`SimBus`] implements [`ActuatorBus`] over a set of simulated servos.  Each
//! servo tracks its mode, torque state, named registers and goal/present
//! position; with torque on, a batched goal write moves the present position
//! straight to the goal.  Conversions use the servo's
//! [`ActuatorModel`] from the control table, exactly as a real bus would.
//!
//! A [`SimHandle`] obtained before the bus is moved into a group shares the
//! same state: use it to inject faults and to inspect the transaction log.
//!
//! # Example
//!
//! ```rust
//! use armsync_hal::control_table::XM430_W350;
//! use armsync_hal::joint_group::JointGroupActuator;
//! use armsync_hal::sim::SimBus;
//! use armsync_types::OperatingMode;
//!
//! let bus = SimBus::new().with_servos(&[1, 2], XM430_W350);
//! let handle = bus.handle();
//!
//! let mut group = JointGroupActuator::new(bus);
//! group.initialize(&[1, 2], "/dev/ttyUSB0", 1_000_000).unwrap();
//! group.set_operating_mode(OperatingMode::Position).unwrap();
//!
//! assert_eq!(handle.mode(2), Some(OperatingMode::Position));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use armsync_types::{ActuatorId, BusError, OperatingMode};

use crate::bus::{ActuatorBus, HandlerRef, ModeKind, RawSample};
use crate::control_table::{
    self, ActuatorModel, ADDR_PRESENT_CURRENT, ADDR_PRESENT_POSITION, LEN_PRESENT_CURRENT,
    LEN_PRESENT_POSITION,
};

// ────────────────────────────────────────────────────────────────────────────
// Transaction log
// ────────────────────────────────────────────────────────────────────────────

/// Number of calls the transaction log keeps; older calls are dropped first.
pub const CALL_LOG_CAPACITY: usize = 1024;

/// One call made against a [`SimBus`], recorded whether it succeeded or not.
#[derive(Debug, Clone, PartialEq)]
pub enum BusCall {
    Open { device_name: String, baud_rate: u32 },
    Close,
    Ping(ActuatorId),
    SetMode(ActuatorId, ModeKind),
    WriteRegister(ActuatorId, String, i32),
    RegisterWriteHandler(ActuatorId, String),
    RegisterReadHandler { start_address: u16, length: u16 },
    TorqueOn(ActuatorId),
    TorqueOff(ActuatorId),
    BatchedWrite { ids: Vec<ActuatorId>, values: Vec<i32> },
    BatchedRead { ids: Vec<ActuatorId> },
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated servo
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimServo {
    model: ActuatorModel,
    mode: Option<OperatingMode>,
    torque: bool,
    goal_raw: i32,
    present_raw: i32,
    registers: HashMap<String, i32>,
}

impl SimServo {
    fn new(model: ActuatorModel) -> Self {
        Self {
            model,
            mode: None,
            torque: false,
            goal_raw: model.zero_raw,
            present_raw: model.zero_raw,
            registers: HashMap::new(),
        }
    }

    /// A fixed holding load while torque is on, zero when limp.
    fn present_current(&self) -> i32 {
        if self.torque { 4 } else { 0 }
    }
}

#[derive(Debug, Clone, Copy)]
enum Handler {
    Write { address: u16 },
    Read { start_address: u16, length: u16 },
}

#[derive(Debug, Default)]
struct Faults {
    open: bool,
    mode_set: HashSet<ActuatorId>,
    register_write: HashSet<ActuatorId>,
    torque: HashSet<ActuatorId>,
    batched_write: bool,
    batched_read: bool,
}

#[derive(Debug, Default)]
struct SimState {
    servos: BTreeMap<ActuatorId, SimServo>,
    open: bool,
    handlers: Vec<Handler>,
    faults: Faults,
    calls: VecDeque<BusCall>,
}

impl SimState {
    fn record(&mut self, call: BusCall) {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    fn require_open(&self) -> Result<(), BusError> {
        if self.open {
            Ok(())
        } else {
            Err(BusError::new("port is not open"))
        }
    }

    fn servo_mut(&mut self, id: ActuatorId) -> Result<&mut SimServo, BusError> {
        self.servos
            .get_mut(&id)
            .ok_or_else(|| BusError::new(format!("[ID:{id:03}] there is no status packet")))
    }

    fn servo(&self, id: ActuatorId) -> Result<&SimServo, BusError> {
        self.servos
            .get(&id)
            .ok_or_else(|| BusError::new(format!("[ID:{id:03}] there is no status packet")))
    }

    fn handler(&self, handler: HandlerRef) -> Result<Handler, BusError> {
        self.handlers
            .get(usize::from(handler.index()))
            .copied()
            .ok_or_else(|| BusError::new(format!("handler {} is not registered", handler.index())))
    }

    fn add_handler(&mut self, handler: Handler) -> Result<HandlerRef, BusError> {
        let index = u16::try_from(self.handlers.len())
            .map_err(|_| BusError::new("handler table is full"))?;
        self.handlers.push(handler);
        Ok(HandlerRef::new(index))
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn covers(start: u16, length: u16, address: u16, field_len: u16) -> bool {
    let (start, length) = (u32::from(start), u32::from(length));
    let (address, field_len) = (u32::from(address), u32::from(field_len));
    address >= start && address + field_len <= start + length
}

// ────────────────────────────────────────────────────────────────────────────
// SimBus
// ────────────────────────────────────────────────────────────────────────────

/// A simulated servo bus.  Servos are added with the `with_*` builders.
#[derive(Debug, Default)]
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    /// Create a bus with no servos attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a servo of `model` at `id`.
    pub fn with_servo(self, id: ActuatorId, model: ActuatorModel) -> Self {
        lock(&self.state).servos.insert(id, SimServo::new(model));
        self
    }

    /// Attach one servo of `model` at each of `ids`.
    pub fn with_servos(self, ids: &[ActuatorId], model: ActuatorModel) -> Self {
        ids.iter().fold(self, |bus, &id| bus.with_servo(id, model))
    }

    /// A handle sharing this bus's state.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn model_of(&self, id: ActuatorId) -> ActuatorModel {
        lock(&self.state)
            .servos
            .get(&id)
            .map(|s| s.model)
            .unwrap_or(control_table::XM430_W350)
    }
}

impl ActuatorBus for SimBus {
    fn open(&mut self, device_name: &str, baud_rate: u32) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::Open {
            device_name: device_name.to_string(),
            baud_rate,
        });
        if st.faults.open {
            return Err(BusError::new(format!("failed to open port '{device_name}'")));
        }
        st.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut st = lock(&self.state);
        st.record(BusCall::Close);
        st.open = false;
        st.handlers.clear();
    }

    fn ping(&mut self, id: ActuatorId) -> Result<u16, BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::Ping(id));
        st.require_open()?;
        st.servo(id).map(|s| s.model.number)
    }

    fn model_name(&self, id: ActuatorId) -> Option<String> {
        lock(&self.state).servos.get(&id).map(|s| s.model.name.to_string())
    }

    fn set_mode(&mut self, id: ActuatorId, kind: ModeKind) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::SetMode(id, kind));
        st.require_open()?;
        if st.faults.mode_set.contains(&id) {
            return Err(BusError::new(format!("[ID:{id:03}] mode change rejected")));
        }
        let servo = st.servo_mut(id)?;
        servo.mode = Some(kind.mode());
        Ok(())
    }

    fn write_register(
        &mut self,
        id: ActuatorId,
        register: &str,
        value: i32,
    ) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::WriteRegister(id, register.to_string(), value));
        st.require_open()?;
        if control_table::register(register).is_none() {
            return Err(BusError::new(format!("unknown register '{register}'")));
        }
        if st.faults.register_write.contains(&id) {
            return Err(BusError::new(format!("[ID:{id:03}] write to '{register}' failed")));
        }
        let servo = st.servo_mut(id)?;
        servo.registers.insert(register.to_string(), value);
        Ok(())
    }

    fn register_write_handler(
        &mut self,
        id: ActuatorId,
        register: &str,
    ) -> Result<HandlerRef, BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::RegisterWriteHandler(id, register.to_string()));
        st.require_open()?;
        st.servo(id)?;
        let spec = control_table::register(register)
            .ok_or_else(|| BusError::new(format!("unknown register '{register}'")))?;
        st.add_handler(Handler::Write {
            address: spec.address,
        })
    }

    fn register_read_handler(
        &mut self,
        start_address: u16,
        length: u16,
    ) -> Result<HandlerRef, BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::RegisterReadHandler {
            start_address,
            length,
        });
        st.require_open()?;
        if length == 0 {
            return Err(BusError::new("read handler length must be non-zero"));
        }
        st.add_handler(Handler::Read {
            start_address,
            length,
        })
    }

    fn torque_on(&mut self, id: ActuatorId) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::TorqueOn(id));
        st.require_open()?;
        if st.faults.torque.contains(&id) {
            return Err(BusError::new(format!("[ID:{id:03}] torque enable failed")));
        }
        let servo = st.servo_mut(id)?;
        servo.torque = true;
        // Engaging torque holds the current pose.
        servo.goal_raw = servo.present_raw;
        Ok(())
    }

    fn torque_off(&mut self, id: ActuatorId) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::TorqueOff(id));
        st.require_open()?;
        if st.faults.torque.contains(&id) {
            return Err(BusError::new(format!("[ID:{id:03}] torque disable failed")));
        }
        st.servo_mut(id)?.torque = false;
        Ok(())
    }

    fn batched_write(
        &mut self,
        handler: HandlerRef,
        ids: &[ActuatorId],
        values: &[i32],
    ) -> Result<(), BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::BatchedWrite {
            ids: ids.to_vec(),
            values: values.to_vec(),
        });
        st.require_open()?;
        let Handler::Write { address, .. } = st.handler(handler)? else {
            return Err(BusError::new("batched write through a read handler"));
        };
        if ids.len() != values.len() {
            return Err(BusError::new(format!(
                "{} ids but {} values",
                ids.len(),
                values.len()
            )));
        }
        if st.faults.batched_write {
            return Err(BusError::new("sync write transaction failed"));
        }
        // The transaction is all-or-nothing: check every id before applying.
        for &id in ids {
            st.servo(id)?;
        }
        for (&id, &value) in ids.iter().zip(values) {
            let servo = st.servo_mut(id)?;
            if address == control_table::ADDR_GOAL_POSITION {
                servo.goal_raw = value;
                if servo.torque {
                    servo.present_raw = value;
                }
            }
        }
        Ok(())
    }

    fn batched_read(
        &mut self,
        handler: HandlerRef,
        ids: &[ActuatorId],
    ) -> Result<Vec<RawSample>, BusError> {
        let mut st = lock(&self.state);
        st.record(BusCall::BatchedRead { ids: ids.to_vec() });
        st.require_open()?;
        let Handler::Read {
            start_address,
            length,
        } = st.handler(handler)?
        else {
            return Err(BusError::new("batched read through a write handler"));
        };
        if st.faults.batched_read {
            return Err(BusError::new("sync read transaction failed"));
        }
        ids.iter()
            .map(|&id| {
                let servo = st.servo(id)?;
                let mut sample = RawSample::default();
                if covers(start_address, length, ADDR_PRESENT_CURRENT, LEN_PRESENT_CURRENT) {
                    sample.current = servo.present_current();
                }
                // Simulated moves complete within one transaction, so present
                // velocity always reads zero.
                if covers(start_address, length, ADDR_PRESENT_POSITION, LEN_PRESENT_POSITION) {
                    sample.position = servo.present_raw;
                }
                Ok(sample)
            })
            .collect()
    }

    fn radian_to_raw(&self, id: ActuatorId, radians: f64) -> i32 {
        self.model_of(id).radian_to_raw(radians)
    }

    fn raw_to_radian(&self, id: ActuatorId, raw: i32) -> f64 {
        self.model_of(id).raw_to_radian(raw)
    }

    fn raw_to_velocity(&self, id: ActuatorId, raw: i32) -> f64 {
        self.model_of(id).raw_to_velocity(raw)
    }

    fn raw_to_current(&self, id: ActuatorId, raw: i32) -> f64 {
        self.model_of(id).raw_to_current(raw)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimHandle
// ────────────────────────────────────────────────────────────────────────────

/// Shared view of a [`SimBus`] for fault injection and inspection.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Make the next `open` calls fail (or succeed again).
    pub fn fail_open(&self, fail: bool) {
        lock(&self.state).faults.open = fail;
    }

    /// Make every mode change on `id` fail.
    pub fn fail_mode_set(&self, id: ActuatorId) {
        lock(&self.state).faults.mode_set.insert(id);
    }

    /// Make every named register write on `id` fail.
    pub fn fail_register_write(&self, id: ActuatorId) {
        lock(&self.state).faults.register_write.insert(id);
    }

    /// Make torque on/off on `id` fail.
    pub fn fail_torque(&self, id: ActuatorId) {
        lock(&self.state).faults.torque.insert(id);
    }

    pub fn fail_batched_write(&self, fail: bool) {
        lock(&self.state).faults.batched_write = fail;
    }

    pub fn fail_batched_read(&self, fail: bool) {
        lock(&self.state).faults.batched_read = fail;
    }

    /// Clear every injected fault.
    pub fn clear_faults(&self) {
        lock(&self.state).faults = Faults::default();
    }

    /// Unplug the servo at `id`; it stops answering.
    pub fn disconnect(&self, id: ActuatorId) {
        lock(&self.state).servos.remove(&id);
    }

    /// Plug in a servo of `model` at `id`.
    pub fn connect(&self, id: ActuatorId, model: ActuatorModel) {
        lock(&self.state).servos.insert(id, SimServo::new(model));
    }

    /// Move the servo at `id` by hand, as if backdriven while limp.
    pub fn set_present_raw(&self, id: ActuatorId, raw: i32) {
        if let Some(servo) = lock(&self.state).servos.get_mut(&id) {
            servo.present_raw = raw;
        }
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn mode(&self, id: ActuatorId) -> Option<OperatingMode> {
        lock(&self.state).servos.get(&id).and_then(|s| s.mode)
    }

    pub fn torque(&self, id: ActuatorId) -> Option<bool> {
        lock(&self.state).servos.get(&id).map(|s| s.torque)
    }

    pub fn goal_raw(&self, id: ActuatorId) -> Option<i32> {
        lock(&self.state).servos.get(&id).map(|s| s.goal_raw)
    }

    pub fn register(&self, id: ActuatorId, name: &str) -> Option<i32> {
        lock(&self.state)
            .servos
            .get(&id)
            .and_then(|s| s.registers.get(name).copied())
    }

    /// The most recent calls, oldest first, up to [`CALL_LOG_CAPACITY`].
    pub fn calls(&self) -> Vec<BusCall> {
        lock(&self.state).calls.iter().cloned().collect()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        lock(&self.state).handlers.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_table::{ADDR_FEEDBACK_BLOCK, GOAL_POSITION, LEN_FEEDBACK_BLOCK, XM430_W350};

    fn open_bus(ids: &[ActuatorId]) -> (SimBus, SimHandle) {
        let mut bus = SimBus::new().with_servos(ids, XM430_W350);
        let handle = bus.handle();
        bus.open("/dev/sim", 57_600).unwrap();
        (bus, handle)
    }

    #[test]
    fn ping_reports_model_number() {
        let (mut bus, _) = open_bus(&[1]);
        assert_eq!(bus.ping(1).unwrap(), 1020);
        assert_eq!(bus.model_name(1).as_deref(), Some("XM430-W350"));
    }

    #[test]
    fn ping_of_missing_id_fails() {
        let (mut bus, _) = open_bus(&[1]);
        let err = bus.ping(7).unwrap_err();
        assert!(err.details.contains("007"));
    }

    #[test]
    fn calls_before_open_fail() {
        let mut bus = SimBus::new().with_servo(1, XM430_W350);
        assert!(bus.ping(1).is_err());
        assert!(bus.torque_on(1).is_err());
    }

    #[test]
    fn open_fault_is_reported() {
        let mut bus = SimBus::new();
        bus.handle().fail_open(true);
        assert!(bus.open("/dev/none", 57_600).is_err());
        assert!(!bus.handle().is_open());
    }

    #[test]
    fn unknown_register_write_fails() {
        let (mut bus, _) = open_bus(&[1]);
        assert!(bus.write_register(1, "Warp_Drive", 1).is_err());
        bus.write_register(1, "Profile_Velocity", 50).unwrap();
        assert_eq!(bus.handle().register(1, "Profile_Velocity"), Some(50));
    }

    #[test]
    fn goal_write_moves_servo_only_with_torque() {
        let (mut bus, handle) = open_bus(&[1, 2]);
        let write = bus.register_write_handler(1, GOAL_POSITION).unwrap();
        let read = bus
            .register_read_handler(ADDR_FEEDBACK_BLOCK, LEN_FEEDBACK_BLOCK)
            .unwrap();

        bus.torque_on(1).unwrap();
        bus.batched_write(write, &[1, 2], &[1000, 3000]).unwrap();
        assert_eq!(handle.goal_raw(2), Some(3000));

        let samples = bus.batched_read(read, &[2, 1]).unwrap();
        // id 2 is limp and stays where it was.
        assert_eq!(samples[0].position, 2048);
        assert_eq!(samples[1].position, 1000);
        assert!(samples[1].current > 0);
    }

    #[test]
    fn batched_write_is_all_or_nothing() {
        let (mut bus, handle) = open_bus(&[1]);
        let write = bus.register_write_handler(1, GOAL_POSITION).unwrap();
        assert!(bus.batched_write(write, &[1, 9], &[100, 200]).is_err());
        assert_eq!(handle.goal_raw(1), Some(2048));
    }

    #[test]
    fn handlers_cannot_be_swapped() {
        let (mut bus, _) = open_bus(&[1]);
        let write = bus.register_write_handler(1, GOAL_POSITION).unwrap();
        let read = bus
            .register_read_handler(ADDR_FEEDBACK_BLOCK, LEN_FEEDBACK_BLOCK)
            .unwrap();
        assert!(bus.batched_read(write, &[1]).is_err());
        assert!(bus.batched_write(read, &[1], &[0]).is_err());
        assert!(bus.batched_read(HandlerRef::new(42), &[1]).is_err());
    }

    #[test]
    fn injected_read_fault_fails_transaction() {
        let (mut bus, handle) = open_bus(&[1]);
        let read = bus
            .register_read_handler(ADDR_FEEDBACK_BLOCK, LEN_FEEDBACK_BLOCK)
            .unwrap();
        handle.fail_batched_read(true);
        assert!(bus.batched_read(read, &[1]).is_err());
        handle.clear_faults();
        assert!(bus.batched_read(read, &[1]).is_ok());
    }

    #[test]
    fn close_drops_handlers() {
        let (mut bus, handle) = open_bus(&[1]);
        bus.register_write_handler(1, GOAL_POSITION).unwrap();
        assert_eq!(handle.handler_count(), 1);
        bus.close();
        assert_eq!(handle.handler_count(), 0);
        assert!(!handle.is_open());
    }

    #[test]
    fn calls_are_logged_in_order() {
        let (mut bus, handle) = open_bus(&[1]);
        bus.ping(1).unwrap();
        bus.torque_on(1).unwrap();
        let calls = handle.calls();
        assert!(matches!(calls[0], BusCall::Open { .. }));
        assert_eq!(calls[1], BusCall::Ping(1));
        assert_eq!(calls[2], BusCall::TorqueOn(1));
    }

    #[test]
    fn call_log_keeps_only_recent_calls() {
        let (mut bus, handle) = open_bus(&[1]);
        for _ in 0..CALL_LOG_CAPACITY {
            bus.ping(1).unwrap();
        }
        bus.torque_on(1).unwrap();
        let calls = handle.calls();
        assert_eq!(calls.len(), CALL_LOG_CAPACITY);
        assert_eq!(calls[0], BusCall::Ping(1));
        assert_eq!(calls.last(), Some(&BusCall::TorqueOn(1)));
    }

    #[test]
    fn read_window_reaching_past_u16_range_still_samples() {
        assert!(covers(ADDR_FEEDBACK_BLOCK, u16::MAX, ADDR_PRESENT_POSITION, LEN_PRESENT_POSITION));
        assert!(!covers(u16::MAX, 1, u16::MAX, 4));

        let (mut bus, handle) = open_bus(&[1]);
        let read = bus
            .register_read_handler(ADDR_FEEDBACK_BLOCK, u16::MAX)
            .unwrap();
        handle.set_present_raw(1, 1500);
        let samples = bus.batched_read(read, &[1]).unwrap();
        assert_eq!(samples[0].position, 1500);
    }

    #[test]
    fn backdriven_limp_servo_reports_new_position() {
        let (mut bus, handle) = open_bus(&[1]);
        let read = bus
            .register_read_handler(ADDR_FEEDBACK_BLOCK, LEN_FEEDBACK_BLOCK)
            .unwrap();
        handle.set_present_raw(1, 3072);
        let samples = bus.batched_read(read, &[1]).unwrap();
        assert_eq!(samples[0].position, 3072);
        assert_eq!(samples[0].current, 0);
        assert!((bus.raw_to_radian(1, 3072) - std::f64::consts::FRAC_PI_2).abs() < 1e-3);
    }
}
