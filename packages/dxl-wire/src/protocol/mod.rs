//! The two protocol generations behind one [`Protocol`] trait.
//!
//! A bus speaks exactly one generation. The variant is picked once, through [`ProtocolVersion::protocol`],
//! and every packet on that bus is framed and decoded by the same instance.

use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crate::{
    decode::DecodeError,
    instruction::{Instruction, MotorId},
    status::{ErrorCode, StatusPacket},
};

mod v1;
mod v2;

pub use v1::ProtocolV1;
pub use v2::ProtocolV2;

/// The part of a frame needed to decide whether to keep reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub motor_id: MotorId,
    /// Size of the whole frame, header through checksum.
    pub packet_size: usize,
}

/// A decoded host-to-device packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPacket {
    pub motor_id: MotorId,
    pub instruction: Instruction,
    pub params: Vec<u8>,
}

/// Framing of one protocol generation.
///
/// # Encoding
///
/// | Field         | Legacy ([`ProtocolV1`])  | Current ([`ProtocolV2`])            |
/// |---------------|--------------------------|-------------------------------------|
/// | sync marker   | `FF FF`                  | `FF FF FD 00`                       |
/// | motor id      | 1                        | 1                                   |
/// | length        | 1, `params + 2`          | 2 (LE), `stuffed params + 3`        |
/// | instruction   | 1 (error byte in replies)| 1 (`0x55` plus error byte in replies)|
/// | params        | n                        | n, byte-stuffed                     |
/// | checksum      | 1, inverted sum          | 2 (LE), CRC-16                      |
pub trait Protocol: Send + Sync + fmt::Debug {
    fn version(&self) -> ProtocolVersion;

    /// Byte sequence every frame starts with.
    fn sync_marker(&self) -> &'static [u8];

    /// Number of bytes [`Protocol::decode_header`] needs to see.
    fn header_size(&self) -> usize;

    /// Width of an encoded register address (and of an encoded length).
    fn address_width(&self) -> usize;

    /// Largest encoded payload a single packet can carry.
    fn max_payload_size(&self) -> usize;

    /// Size of `payload` once it is framed, after any byte-stuffing.
    fn encoded_payload_size(&self, payload: &[u8]) -> usize {
        payload.len()
    }

    /// Builds a ready-to-transmit instruction packet.
    ///
    /// # Panics
    ///
    /// Panics if the encoded payload exceeds [`Protocol::max_payload_size`].
    fn create_packet(&self, motor_id: MotorId, instruction: Instruction, payload: &[u8]) -> Vec<u8>;

    /// Builds the status packet a device would send in reply.
    ///
    /// # Panics
    ///
    /// Panics if the encoded payload exceeds [`Protocol::max_payload_size`].
    fn create_status_packet(&self, motor_id: MotorId, error: ErrorCode, payload: &[u8]) -> Vec<u8>;

    /// Checks size, sync marker, length field and checksum of a complete frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] naming the first check that failed.
    fn check_packet(&self, raw: &[u8]) -> Result<(), DecodeError>;

    fn validate(&self, raw: &[u8]) -> bool {
        self.check_packet(raw).is_ok()
    }

    /// Decodes the header at the start of `buf`.
    ///
    /// Returns `None` if `buf` is too short or does not start with a plausible reply header.
    fn decode_header(&self, buf: &[u8]) -> Option<Header>;

    /// Decodes a status packet.
    ///
    /// Fails closed: any validation failure yields [`StatusPacket::invalid`].
    fn extract_payload(&self, raw: &[u8]) -> StatusPacket;

    /// Decodes an instruction packet, as a device on the bus would.
    fn extract_instruction(&self, raw: &[u8]) -> Option<InstructionPacket>;

    fn convert_length(&self, len: usize) -> Vec<u8>;

    fn convert_address(&self, address: u16) -> Vec<u8>;

    /// Builds the parameter block of a bulk-read instruction from `(motor id, address, length)` entries.
    fn build_bulk_read_package(&self, entries: &[(MotorId, u16, usize)]) -> Vec<u8> {
        let mut package = Vec::with_capacity(entries.len() * (1 + 2 * self.address_width()));

        for &(motor_id, address, length) in entries {
            package.push(motor_id.0);
            package.extend(self.convert_address(address));
            package.extend(self.convert_length(length));
        }

        package
    }
}

/// Protocol generation spoken on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolVersion {
    /// Legacy generation (protocol 1.0).
    V1,
    /// Current generation (protocol 2.0).
    #[default]
    V2,
}

impl ProtocolVersion {
    /// Creates the [`Protocol`] implementation for this generation.
    pub fn protocol(self) -> Box<dyn Protocol> {
        match self {
            Self::V1 => Box::new(ProtocolV1),
            Self::V2 => Box::new(ProtocolV2),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("protocol 1.0"),
            Self::V2 => f.write_str("protocol 2.0"),
        }
    }
}
