//! Dynamixel-Pro control table (current protocol generation).

use std::sync::LazyLock;

use super::{
    Access::{Read as R, ReadWrite as RW},
    Catalog, Converters, Layout, LayoutRegister, LayoutType, ModelInfo, RegisterField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Register {
    ModelNumber = 0,
    ModelInformation = 2,
    FirmwareVersion = 6,
    Id = 7,
    BaudRate = 8,
    ReturnDelayTime = 9,
    OperatingMode = 11,
    HomingOffset = 13,
    MovingThreshold = 17,
    TemperatureLimit = 21,
    MaxVoltageLimit = 22,
    MinVoltageLimit = 24,
    AccelerationLimit = 26,
    TorqueLimit = 30,
    VelocityLimit = 32,
    MaxPositionLimit = 36,
    MinPositionLimit = 40,
    ExternalPortMode1 = 44,
    ExternalPortMode2 = 45,
    ExternalPortMode3 = 46,
    ExternalPortMode4 = 47,
    Shutdown = 48,
    IndirectAddressBlock = 49,
    TorqueEnable = 562,
    LedRed = 563,
    LedGreen = 564,
    LedBlue = 565,
    VelocityIGain = 586,
    VelocityPGain = 588,
    PositionPGain = 594,
    GoalPosition = 596,
    GoalVelocity = 600,
    GoalTorque = 604,
    GoalAcceleration = 606,
    Moving = 610,
    PresentPosition = 611,
    PresentVelocity = 615,
    PresentCurrent = 621,
    PresentInputVoltage = 623,
    PresentTemperature = 625,
    ExternalPortData1 = 626,
    ExternalPortData2 = 628,
    ExternalPortData3 = 630,
    ExternalPortData4 = 632,
    IndirectDataBlock = 634,
    RegisteredInstruction = 890,
    StatusReturnLevel = 891,
    HardwareErrorStatus = 892,
}

impl LayoutRegister for Register {
    const MODEL_NUMBER: Self = Self::ModelNumber;

    fn address(self) -> u16 {
        self as u16
    }
}

/// Number of the model every other Pro model is derived from.
pub const M54_60_S250_R: u16 = 46_352;

pub static CATALOG: LazyLock<Catalog<Register>> = LazyLock::new(|| Catalog::new(layout(), models()));

fn layout() -> Layout<Register> {
    use Register::*;

    Layout::from([
        (ModelNumber, RegisterField::eeprom(2, R, "Model Number")),
        (ModelInformation, RegisterField::eeprom(4, R, "Model Information")),
        (FirmwareVersion, RegisterField::eeprom(1, R, "Firmware Version")),
        (Id, RegisterField::eeprom(1, RW, "ID")),
        (BaudRate, RegisterField::eeprom(1, RW, "Baud Rate")),
        (ReturnDelayTime, RegisterField::eeprom(1, RW, "Return Delay Time")),
        (OperatingMode, RegisterField::eeprom(1, RW, "Operating Mode")),
        (HomingOffset, RegisterField::eeprom(4, RW, "Homing Offset")),
        (MovingThreshold, RegisterField::eeprom(4, RW, "Moving Threshold")),
        (TemperatureLimit, RegisterField::eeprom(1, RW, "Temperature Limit")),
        (MaxVoltageLimit, RegisterField::eeprom(2, RW, "Max Voltage Limit")),
        (MinVoltageLimit, RegisterField::eeprom(2, RW, "Min Voltage Limit")),
        (AccelerationLimit, RegisterField::eeprom(4, RW, "Acceleration Limit")),
        (TorqueLimit, RegisterField::eeprom(2, RW, "Torque Limit")),
        (VelocityLimit, RegisterField::eeprom(4, RW, "Velocity Limit")),
        (MaxPositionLimit, RegisterField::eeprom(4, RW, "Max Position Limit")),
        (MinPositionLimit, RegisterField::eeprom(4, RW, "Min Position Limit")),
        (ExternalPortMode1, RegisterField::eeprom(1, RW, "External Port Mode 1")),
        (ExternalPortMode2, RegisterField::eeprom(1, RW, "External Port Mode 2")),
        (ExternalPortMode3, RegisterField::eeprom(1, RW, "External Port Mode 3")),
        (ExternalPortMode4, RegisterField::eeprom(1, RW, "External Port Mode 4")),
        (Shutdown, RegisterField::eeprom(1, RW, "Shutdown")),
        (IndirectAddressBlock, RegisterField::eeprom(512, RW, "Indirect Addresses Block")),
        (TorqueEnable, RegisterField::ram(1, RW, "Torque Enable")),
        (LedRed, RegisterField::ram(1, RW, "LED Red")),
        (LedGreen, RegisterField::ram(1, RW, "LED Green")),
        (LedBlue, RegisterField::ram(1, RW, "LED Blue")),
        (VelocityIGain, RegisterField::ram(2, RW, "Velocity I Gain")),
        (VelocityPGain, RegisterField::ram(2, RW, "Velocity P Gain")),
        (PositionPGain, RegisterField::ram(2, RW, "Position P Gain")),
        (GoalPosition, RegisterField::ram(4, RW, "Goal Position")),
        (GoalVelocity, RegisterField::ram(4, RW, "Goal Velocity")),
        (GoalTorque, RegisterField::ram(2, RW, "Goal Torque")),
        (GoalAcceleration, RegisterField::ram(4, RW, "Goal Acceleration")),
        (Moving, RegisterField::ram(1, R, "Moving")),
        (PresentPosition, RegisterField::ram(4, R, "Present Position")),
        (PresentVelocity, RegisterField::ram(4, R, "Present Velocity")),
        (PresentCurrent, RegisterField::ram(2, R, "Present Current")),
        (PresentInputVoltage, RegisterField::ram(2, R, "Present Input Voltage")),
        (PresentTemperature, RegisterField::ram(1, R, "Present Temperature")),
        (ExternalPortData1, RegisterField::ram(2, RW, "External Port Data 1")),
        (ExternalPortData2, RegisterField::ram(2, RW, "External Port Data 2")),
        (ExternalPortData3, RegisterField::ram(2, RW, "External Port Data 3")),
        (ExternalPortData4, RegisterField::ram(2, RW, "External Port Data 4")),
        (IndirectDataBlock, RegisterField::ram(256, RW, "Indirect Data Block")),
        (RegisteredInstruction, RegisterField::ram(1, R, "Registered Instruction")),
        (StatusReturnLevel, RegisterField::ram(1, RW, "Status Return Level")),
        (HardwareErrorStatus, RegisterField::ram(1, R, "Hardware Error Status")),
    ])
}

fn base_model() -> ModelInfo<Register> {
    use Register::*;

    ModelInfo {
        model_number: M54_60_S250_R,
        layout: LayoutType::Pro,
        short_name: "M54-60-S250-R",
        names: vec!["M54-60-S250-R"],
        converters: Converters::new(251_417.0, 0, 0.00397746),
        defaults: [
            (ModelNumber, Some(i64::from(M54_60_S250_R))),
            (ModelInformation, None),
            (FirmwareVersion, None),
            (Id, Some(1)),
            (BaudRate, Some(1)),
            (ReturnDelayTime, Some(250)),
            (OperatingMode, Some(3)),
            (HomingOffset, Some(0)),
            (MovingThreshold, Some(50)),
            (TemperatureLimit, Some(80)),
            (MaxVoltageLimit, Some(400)),
            (MinVoltageLimit, Some(150)),
            (AccelerationLimit, None),
            (TorqueLimit, Some(180)),
            (VelocityLimit, Some(8_000)),
            (MaxPositionLimit, Some(125_708)),
            (MinPositionLimit, Some(-125_708)),
            (ExternalPortMode1, Some(0)),
            (ExternalPortMode2, Some(0)),
            (ExternalPortMode3, Some(0)),
            (ExternalPortMode4, Some(0)),
            (Shutdown, Some(58)),
            (IndirectAddressBlock, None),
            (TorqueEnable, Some(0)),
            (LedRed, Some(0)),
            (LedGreen, Some(0)),
            (LedBlue, Some(0)),
            (VelocityIGain, Some(16)),
            (VelocityPGain, Some(256)),
            (PositionPGain, Some(32)),
            (GoalPosition, None),
            (GoalVelocity, Some(0)),
            (GoalTorque, Some(0)),
            (GoalAcceleration, Some(0)),
            (Moving, None),
            (PresentPosition, None),
            (PresentVelocity, None),
            (PresentCurrent, None),
            (PresentInputVoltage, None),
            (PresentTemperature, None),
            (ExternalPortData1, Some(0)),
            (ExternalPortData2, Some(0)),
            (ExternalPortData3, Some(0)),
            (ExternalPortData4, Some(0)),
            (IndirectDataBlock, None),
            (RegisteredInstruction, Some(0)),
            (StatusReturnLevel, Some(2)),
            (HardwareErrorStatus, Some(0)),
        ]
        .into(),
    }
}

fn models() -> Vec<ModelInfo<Register>> {
    use Register::*;

    let base = base_model();
    let m54_40 = base
        .derive(46_096, "M54-40-S250-R", &["M54-40-S250-R"])
        .with_defaults(&[(TorqueLimit, 120)]);
    let m42_10 = base
        .derive(43_288, "M42-10-S260-R", &["M42-10-S260-R"])
        .with_converters(Converters::new(263_187.0, 0, 0.00389076))
        .with_defaults(&[
            (TorqueLimit, 300),
            (MaxPositionLimit, 131_593),
            (MinPositionLimit, -131_593),
            (VelocityIGain, 72),
            (VelocityPGain, 520),
            (PositionPGain, 32),
        ]);
    let h54_200 = base
        .derive(54_024, "H54-200-S500-R", &["H54-200-S500-R"])
        .with_converters(Converters::new(501_923.0, 0, 0.00199234))
        .with_defaults(&[
            (TorqueLimit, 620),
            (VelocityLimit, 17_000),
            (MaxPositionLimit, 250_961),
            (MinPositionLimit, -250_961),
            (VelocityIGain, 14),
            (VelocityPGain, 399),
            (PositionPGain, 32),
        ]);
    let h54_100 = base
        .derive(53_768, "H54-100-S500-R", &["H54-100-S500-R"])
        .with_converters(Converters::new(501_923.0, 0, 0.00199234))
        .with_defaults(&[
            (TorqueLimit, 310),
            (VelocityLimit, 17_000),
            (MaxPositionLimit, 250_961),
            (MinPositionLimit, -250_961),
            (VelocityIGain, 16),
            (VelocityPGain, 256),
            (PositionPGain, 32),
        ]);
    let h42_20 = base
        .derive(51_200, "H42-20-S300-R", &["H42-20-S300-R"])
        .with_converters(Converters::new(303_750.0, 0, 0.00329218))
        .with_defaults(&[
            (AccelerationLimit, 255),
            (TorqueLimit, 465),
            (VelocityLimit, 10_300),
            (MaxPositionLimit, 151_875),
            (MinPositionLimit, -151_875),
            (VelocityIGain, 40),
            (VelocityPGain, 440),
            (PositionPGain, 32),
        ]);

    vec![base, m54_40, m42_10, h54_200, h54_100, h42_20]
}

#[cfg(test)]
mod tests {
    use super::{Register, CATALOG, M54_60_S250_R};
    use crate::catalog::{
        tests::{check_catalog, check_derived},
        Access, LayoutRegister, MemoryRegion,
    };

    #[test]
    fn layout_and_defaults_are_consistent() {
        assert_eq!(CATALOG.layout().len(), 48);
        assert_eq!(CATALOG.models().count(), 6);
        check_catalog(&*CATALOG);
    }

    #[test]
    fn derived_models_keep_base_defaults() {
        use Register::*;

        check_derived(&*CATALOG, M54_60_S250_R, 46_096, &[TorqueLimit]);
        check_derived(
            &*CATALOG,
            M54_60_S250_R,
            51_200,
            &[
                AccelerationLimit,
                TorqueLimit,
                VelocityLimit,
                MaxPositionLimit,
                MinPositionLimit,
                VelocityIGain,
                VelocityPGain,
            ],
        );

        let h42 = CATALOG.model(51_200).unwrap();
        assert_eq!(h42.default_value(AccelerationLimit), Some(255));
        assert_eq!(h42.default_value(ModelNumber), Some(51_200));
        assert_eq!(CATALOG.model(M54_60_S250_R).unwrap().default_value(AccelerationLimit), None);
    }

    #[test]
    fn lookups() {
        let model = CATALOG.model_by_name("M42-10-S260-R").unwrap();
        assert_eq!(model.model_number, 43_288);
        assert_eq!(model.converters.resolution, 263_187.0);
        assert!(CATALOG.model_by_name("MX-28").is_none());

        let field = CATALOG.field(Register::PresentPosition).unwrap();
        assert_eq!(field.length, 4);
        assert_eq!(field.access, Access::Read);
        assert_eq!(field.region, MemoryRegion::Ram);
        assert_eq!(Register::HardwareErrorStatus.address(), 892);
    }
}
