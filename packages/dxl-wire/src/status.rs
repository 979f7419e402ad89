use alloc::vec::Vec;
use bitflags::bitflags;

use crate::instruction::MotorId;

bitflags! {
    /// Status byte reported by a device in its reply.
    ///
    /// The bus core passes it through untouched; every bit is retained.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct ErrorCode: u8 {
        /// Current-generation devices set this while a hardware error is latched.
        const ALERT = 1 << 7;

        const _ = !0;
    }
}

impl ErrorCode {
    /// Returns `true` if the device flagged any error.
    pub const fn is_set(self) -> bool {
        !self.is_empty()
    }
}

/// A decoded reply from one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub motor_id: MotorId,
    pub error: ErrorCode,
    pub payload: Vec<u8>,
}

impl StatusPacket {
    /// The result of decoding a packet that failed validation.
    pub const fn invalid() -> Self {
        Self {
            motor_id: MotorId::INVALID,
            error: ErrorCode::empty(),
            payload: Vec::new(),
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.motor_id.is_valid()
    }
}
