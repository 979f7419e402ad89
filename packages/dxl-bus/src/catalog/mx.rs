//! MX series control table (legacy protocol generation).
//!
//! MX-64 and MX-106 extend the MX-28 table with current sensing and torque control; on an MX-28 those
//! registers have no default.

use std::sync::LazyLock;

use super::{
    Access::{Read as R, ReadWrite as RW},
    Catalog, Converters, Layout, LayoutRegister, LayoutType, ModelInfo, RegisterField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Register {
    ModelNumber = 0,
    FirmwareVersion = 2,
    Id = 3,
    BaudRate = 4,
    ReturnDelayTime = 5,
    CwAngleLimit = 6,
    CcwAngleLimit = 8,
    DriveMode = 10,
    TemperatureLimit = 11,
    MinVoltageLimit = 12,
    MaxVoltageLimit = 13,
    MaxTorque = 14,
    StatusReturnLevel = 16,
    AlarmLed = 17,
    Shutdown = 18,
    MultiTurnOffset = 20,
    ResolutionDivider = 22,
    TorqueEnable = 24,
    Led = 25,
    DGain = 26,
    IGain = 27,
    PGain = 28,
    GoalPosition = 30,
    MovingSpeed = 32,
    TorqueLimit = 34,
    PresentPosition = 36,
    PresentSpeed = 38,
    PresentLoad = 40,
    PresentVoltage = 42,
    PresentTemperature = 43,
    Registered = 44,
    Moving = 46,
    Lock = 47,
    Punch = 48,
    RealtimeTick = 50,
    Current = 68,
    TorqueControlMode = 70,
    GoalTorque = 71,
    GoalAcceleration = 73,
}

impl LayoutRegister for Register {
    const MODEL_NUMBER: Self = Self::ModelNumber;

    fn address(self) -> u16 {
        self as u16
    }
}

pub const MX_28: u16 = 29;
pub const MX_64: u16 = 310;
pub const MX_106: u16 = 320;

pub static CATALOG: LazyLock<Catalog<Register>> = LazyLock::new(|| Catalog::new(layout(), models()));

fn layout() -> Layout<Register> {
    use Register::*;

    Layout::from([
        (ModelNumber, RegisterField::eeprom(2, R, "Model Number")),
        (FirmwareVersion, RegisterField::eeprom(1, R, "Firmware Version")),
        (Id, RegisterField::eeprom(1, RW, "ID")),
        (BaudRate, RegisterField::eeprom(1, RW, "Baud Rate")),
        (ReturnDelayTime, RegisterField::eeprom(1, RW, "Return Delay Time")),
        (CwAngleLimit, RegisterField::eeprom(2, RW, "CW Angle Limit")),
        (CcwAngleLimit, RegisterField::eeprom(2, RW, "CCW Angle Limit")),
        (DriveMode, RegisterField::eeprom(1, RW, "Drive Mode")),
        (TemperatureLimit, RegisterField::eeprom(1, RW, "Temperature Limit")),
        (MinVoltageLimit, RegisterField::eeprom(1, RW, "Min Voltage Limit")),
        (MaxVoltageLimit, RegisterField::eeprom(1, RW, "Max Voltage Limit")),
        (MaxTorque, RegisterField::eeprom(2, RW, "Max Torque")),
        (StatusReturnLevel, RegisterField::eeprom(1, RW, "Status Return Level")),
        (AlarmLed, RegisterField::eeprom(1, RW, "Alarm LED")),
        (Shutdown, RegisterField::eeprom(1, RW, "Shutdown")),
        (MultiTurnOffset, RegisterField::eeprom(2, RW, "Multi Turn Offset")),
        (ResolutionDivider, RegisterField::eeprom(1, RW, "Resolution Divider")),
        (TorqueEnable, RegisterField::ram(1, RW, "Torque Enable")),
        (Led, RegisterField::ram(1, RW, "LED")),
        (DGain, RegisterField::ram(1, RW, "D Gain")),
        (IGain, RegisterField::ram(1, RW, "I Gain")),
        (PGain, RegisterField::ram(1, RW, "P Gain")),
        (GoalPosition, RegisterField::ram(2, RW, "Goal Position")),
        (MovingSpeed, RegisterField::ram(2, RW, "Moving Speed")),
        (TorqueLimit, RegisterField::ram(2, RW, "Torque Limit")),
        (PresentPosition, RegisterField::ram(2, R, "Present Position")),
        (PresentSpeed, RegisterField::ram(2, R, "Present Speed")),
        (PresentLoad, RegisterField::ram(2, R, "Present Load")),
        (PresentVoltage, RegisterField::ram(1, R, "Present Voltage")),
        (PresentTemperature, RegisterField::ram(1, R, "Present Temperature")),
        (Registered, RegisterField::ram(1, R, "Registered")),
        (Moving, RegisterField::ram(1, R, "Moving")),
        (Lock, RegisterField::ram(1, RW, "Lock")),
        (Punch, RegisterField::ram(2, RW, "Punch")),
        (RealtimeTick, RegisterField::ram(2, R, "Realtime Tick")),
        (Current, RegisterField::ram(2, RW, "Current")),
        (TorqueControlMode, RegisterField::ram(1, RW, "Torque Control Mode Enable")),
        (GoalTorque, RegisterField::ram(2, RW, "Goal Torque")),
        (GoalAcceleration, RegisterField::ram(1, RW, "Goal Acceleration")),
    ])
}

fn mx_28() -> ModelInfo<Register> {
    use Register::*;

    ModelInfo {
        model_number: MX_28,
        layout: LayoutType::Mx,
        short_name: "MX-28",
        names: vec!["MX-28", "MX-28T", "MX-28R", "MX-28AT", "MX-28AR"],
        converters: Converters::new(4096.0, 2048, 0.114),
        defaults: [
            (ModelNumber, Some(i64::from(MX_28))),
            (FirmwareVersion, None),
            (Id, Some(1)),
            (BaudRate, Some(34)),
            (ReturnDelayTime, Some(250)),
            (CwAngleLimit, Some(0)),
            (CcwAngleLimit, Some(4095)),
            (DriveMode, None),
            (TemperatureLimit, Some(80)),
            (MinVoltageLimit, Some(60)),
            (MaxVoltageLimit, Some(160)),
            (MaxTorque, Some(1023)),
            (StatusReturnLevel, Some(2)),
            (AlarmLed, Some(36)),
            (Shutdown, Some(36)),
            (MultiTurnOffset, Some(0)),
            (ResolutionDivider, Some(1)),
            (TorqueEnable, Some(0)),
            (Led, Some(0)),
            (DGain, Some(0)),
            (IGain, Some(0)),
            (PGain, Some(32)),
            (GoalPosition, None),
            (MovingSpeed, None),
            (TorqueLimit, None),
            (PresentPosition, None),
            (PresentSpeed, None),
            (PresentLoad, None),
            (PresentVoltage, None),
            (PresentTemperature, None),
            (Registered, Some(0)),
            (Moving, Some(0)),
            (Lock, Some(0)),
            (Punch, Some(0)),
            (RealtimeTick, None),
            (Current, None),
            (TorqueControlMode, None),
            (GoalTorque, None),
            (GoalAcceleration, Some(0)),
        ]
        .into(),
    }
}

fn models() -> Vec<ModelInfo<Register>> {
    use Register::*;

    let base = mx_28();
    let mx_64 = base
        .derive(MX_64, "MX-64", &["MX-64", "MX-64T", "MX-64R", "MX-64AT", "MX-64AR"])
        .with_defaults(&[(Current, 0), (TorqueControlMode, 0), (GoalTorque, 0)]);
    let mx_106 = base
        .derive(MX_106, "MX-106", &["MX-106", "MX-106T", "MX-106R"])
        .with_defaults(&[(DriveMode, 0), (Current, 0), (TorqueControlMode, 0), (GoalTorque, 0)]);

    vec![base, mx_64, mx_106]
}

#[cfg(test)]
mod tests {
    use super::{Register, CATALOG, MX_106, MX_28, MX_64};
    use crate::catalog::tests::{check_catalog, check_derived};

    #[test]
    fn layout_and_defaults_are_consistent() {
        assert_eq!(CATALOG.models().count(), 3);
        check_catalog(&*CATALOG);
    }

    #[test]
    fn derived_models_keep_base_defaults() {
        use Register::*;

        check_derived(&*CATALOG, MX_28, MX_64, &[Current, TorqueControlMode, GoalTorque]);
        check_derived(&*CATALOG, MX_28, MX_106, &[DriveMode, Current, TorqueControlMode, GoalTorque]);
        assert_eq!(CATALOG.model(MX_28).unwrap().default_value(Current), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(CATALOG.model_by_name("MX-64AR").unwrap().model_number, MX_64);
        assert_eq!(CATALOG.model_by_name("MX-106").unwrap().converters.resolution, 4096.0);
    }
}
