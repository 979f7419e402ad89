use core::fmt;

use crate::decode::{DecodeError, DecodeErrorKind};

/// Address of one device on the bus.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotorId(pub u8);

impl MotorId {
    /// Sentinel for "no such motor". Never the id of a real device.
    pub const INVALID: Self = Self(0xFF);

    /// Matched by every device on the bus.
    pub const BROADCAST: Self = Self(0xFE);

    /// Returns `true` unless this is [`MotorId::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Whether a reply from `self` answers a request that expected `expected`.
    ///
    /// A broadcast expectation accepts every valid id; [`MotorId::INVALID`] never matches.
    pub const fn answers(self, expected: MotorId) -> bool {
        self.is_valid() && (expected.is_broadcast() || self.0 == expected.0)
    }
}

impl From<u8> for MotorId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl From<MotorId> for u8 {
    fn from(id: MotorId) -> Self {
        id.0
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INVALID => f.write_str("invalid"),
            Self::BROADCAST => f.write_str("broadcast"),
            Self(id) => write!(f, "{id}"),
        }
    }
}

/// Instruction opcodes shared by both protocol generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    Reset = 0x06,
    Reboot = 0x08,
    Status = 0x55,
    SyncRead = 0x82,
    SyncWrite = 0x83,
    BulkRead = 0x92,
    BulkWrite = 0x93,
}

impl Instruction {
    const OPCODES: &'static [u8] = &[
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x55, 0x82, 0x83, 0x92, 0x93,
    ];
}

impl TryFrom<u8> for Instruction {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Self::Ping,
            0x02 => Self::Read,
            0x03 => Self::Write,
            0x04 => Self::RegWrite,
            0x05 => Self::Action,
            0x06 => Self::Reset,
            0x08 => Self::Reboot,
            0x55 => Self::Status,
            0x82 => Self::SyncRead,
            0x83 => Self::SyncWrite,
            0x92 => Self::BulkRead,
            0x93 => Self::BulkWrite,
            v => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedByte {
                    name: "Instruction",
                    value: v,
                    expected: Self::OPCODES,
                }));
            }
        })
    }
}

impl From<Instruction> for u8 {
    fn from(instruction: Instruction) -> Self {
        instruction as u8
    }
}
