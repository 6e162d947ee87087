//! Control-table layout and per-model conversion data for protocol-2
//! X-series servos.
//!
//! Bus implementations use this table to resolve named registers and to
//! convert between radians and register units.  Group components never read
//! it for conversion; they always go through
//! [`ActuatorBus`][crate::bus::ActuatorBus].

use std::f64::consts::TAU;

/// Name of the register the goal-position write handler is bound to.
pub const GOAL_POSITION: &str = "Goal_Position";

pub const ADDR_GOAL_POSITION: u16 = 116;
pub const LEN_GOAL_POSITION: u16 = 4;

pub const ADDR_PRESENT_CURRENT: u16 = 126;
pub const LEN_PRESENT_CURRENT: u16 = 2;
pub const ADDR_PRESENT_VELOCITY: u16 = 128;
pub const LEN_PRESENT_VELOCITY: u16 = 4;
pub const ADDR_PRESENT_POSITION: u16 = 132;
pub const LEN_PRESENT_POSITION: u16 = 4;

/// Start of the contiguous current + velocity + position feedback block.
pub const ADDR_FEEDBACK_BLOCK: u16 = ADDR_PRESENT_CURRENT;
/// Byte length of the feedback block.
pub const LEN_FEEDBACK_BLOCK: u16 = LEN_PRESENT_CURRENT + LEN_PRESENT_VELOCITY + LEN_PRESENT_POSITION;

/// A named, writable-or-readable control-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    pub name: &'static str,
    pub address: u16,
    pub length: u16,
}

const fn reg(name: &'static str, address: u16, length: u16) -> RegisterSpec {
    RegisterSpec {
        name,
        address,
        length,
    }
}

/// Registers shared by every model in [`MODELS`].
pub const REGISTERS: &[RegisterSpec] = &[
    reg("Operating_Mode", 11, 1),
    reg("Current_Limit", 38, 2),
    reg("Velocity_Limit", 44, 4),
    reg("Torque_Enable", 64, 1),
    reg("Position_D_Gain", 80, 2),
    reg("Position_I_Gain", 82, 2),
    reg("Position_P_Gain", 84, 2),
    reg("Goal_Current", 102, 2),
    reg("Goal_Velocity", 104, 4),
    reg("Profile_Acceleration", 108, 4),
    reg("Profile_Velocity", 112, 4),
    reg(GOAL_POSITION, ADDR_GOAL_POSITION, LEN_GOAL_POSITION),
    reg("Present_Current", ADDR_PRESENT_CURRENT, LEN_PRESENT_CURRENT),
    reg("Present_Velocity", ADDR_PRESENT_VELOCITY, LEN_PRESENT_VELOCITY),
    reg("Present_Position", ADDR_PRESENT_POSITION, LEN_PRESENT_POSITION),
];

/// Look up a register by its control-table name.
pub fn register(name: &str) -> Option<&'static RegisterSpec> {
    REGISTERS.iter().find(|r| r.name == name)
}

/// Calibration data of one servo model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorModel {
    pub number: u16,
    pub name: &'static str,
    /// Position ticks per full revolution.
    pub resolution: i32,
    /// Raw position that maps to 0 rad.
    pub zero_raw: i32,
    pub min_raw: i32,
    pub max_raw: i32,
    /// rev/min per velocity tick.
    pub velocity_unit_rpm: f64,
    /// mA per current tick; `0.0` for models without current sensing.
    pub current_unit_ma: f64,
}

pub const XM430_W350: ActuatorModel = ActuatorModel {
    number: 1020,
    name: "XM430-W350",
    resolution: 4096,
    zero_raw: 2048,
    min_raw: 0,
    max_raw: 4095,
    velocity_unit_rpm: 0.229,
    current_unit_ma: 2.69,
};

pub const XL430_W250: ActuatorModel = ActuatorModel {
    number: 1060,
    name: "XL430-W250",
    resolution: 4096,
    zero_raw: 2048,
    min_raw: 0,
    max_raw: 4095,
    velocity_unit_rpm: 0.229,
    current_unit_ma: 0.0,
};

pub const XM540_W270: ActuatorModel = ActuatorModel {
    number: 1120,
    name: "XM540-W270",
    resolution: 4096,
    zero_raw: 2048,
    min_raw: 0,
    max_raw: 4095,
    velocity_unit_rpm: 0.229,
    current_unit_ma: 2.69,
};

pub const MODELS: &[ActuatorModel] = &[XM430_W350, XL430_W250, XM540_W270];

/// Resolve a model by the number a ping reports.
pub fn model(number: u16) -> Option<&'static ActuatorModel> {
    MODELS.iter().find(|m| m.number == number)
}

impl ActuatorModel {
    /// Angle of one position tick.
    pub fn radians_per_tick(&self) -> f64 {
        TAU / f64::from(self.resolution)
    }

    /// Convert an angle to a goal-position value, clamped to the model's
    /// position range.
    pub fn radian_to_raw(&self, radians: f64) -> i32 {
        let ticks = (radians / self.radians_per_tick()).round();
        let raw = ticks + f64::from(self.zero_raw);
        raw.clamp(f64::from(self.min_raw), f64::from(self.max_raw)) as i32
    }

    pub fn raw_to_radian(&self, raw: i32) -> f64 {
        f64::from(raw - self.zero_raw) * self.radians_per_tick()
    }

    /// Present-velocity ticks to rad/s.
    pub fn raw_to_velocity(&self, raw: i32) -> f64 {
        f64::from(raw) * self.velocity_unit_rpm * TAU / 60.0
    }

    /// Present-current ticks to mA.  The register is 16-bit signed.
    pub fn raw_to_current(&self, raw: i32) -> f64 {
        f64::from(raw as i16) * self.current_unit_ma
    }

    /// Smallest and largest angle the position range can express.
    pub fn radian_range(&self) -> (f64, f64) {
        (self.raw_to_radian(self.min_raw), self.raw_to_radian(self.max_raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_block_is_contiguous() {
        assert_eq!(ADDR_PRESENT_CURRENT + LEN_PRESENT_CURRENT, ADDR_PRESENT_VELOCITY);
        assert_eq!(ADDR_PRESENT_VELOCITY + LEN_PRESENT_VELOCITY, ADDR_PRESENT_POSITION);
        assert_eq!(LEN_FEEDBACK_BLOCK, 10);
    }

    #[test]
    fn register_lookup_by_name() {
        let spec = register("Profile_Velocity").expect("known register");
        assert_eq!(spec.address, 112);
        assert_eq!(spec.length, 4);
        assert!(register("Warp_Drive").is_none());
        assert_eq!(register(GOAL_POSITION).unwrap().address, ADDR_GOAL_POSITION);
    }

    #[test]
    fn zero_radians_is_center_tick() {
        assert_eq!(XM430_W350.radian_to_raw(0.0), 2048);
        assert_eq!(XM430_W350.raw_to_radian(2048), 0.0);
    }

    #[test]
    fn radian_roundtrip_within_one_tick() {
        let m = XM430_W350;
        let (lo, hi) = m.radian_range();
        let step = m.radians_per_tick();
        let mut theta = lo;
        while theta <= hi {
            let back = m.raw_to_radian(m.radian_to_raw(theta));
            assert!((back - theta).abs() <= step, "θ={theta} came back as {back}");
            theta += 0.013;
        }
    }

    #[test]
    fn out_of_range_angles_are_clamped() {
        assert_eq!(XM430_W350.radian_to_raw(100.0), 4095);
        assert_eq!(XM430_W350.radian_to_raw(-100.0), 0);
    }

    #[test]
    fn current_register_is_sign_extended() {
        // 0xFFFF is -1 tick.
        let ma = XM430_W350.raw_to_current(0xFFFF);
        assert!((ma + 2.69).abs() < 1e-9);
        assert_eq!(XL430_W250.raw_to_current(100), 0.0);
    }

    #[test]
    fn velocity_ticks_convert_to_rad_per_sec() {
        // 1 tick = 0.229 rpm.
        let v = XM430_W350.raw_to_velocity(1);
        assert!((v - 0.229 * TAU / 60.0).abs() < 1e-12);
    }

    #[test]
    fn model_lookup_by_number() {
        assert_eq!(model(1020).unwrap().name, "XM430-W350");
        assert!(model(9999).is_none());
    }
}
