//! Wire format of the Dynamixel serial actuator protocols in Rust.
//!
//! This crate covers everything that happens between a `(motor id, instruction, payload)` triple and the
//! bytes on a multi-drop bus: packet framing, checksums, byte-stuffing and header decoding for both the
//! legacy ([`ProtocolV1`]) and the current ([`ProtocolV2`]) protocol generation. It performs no I/O.

#![no_std]

extern crate alloc;

pub mod protocol;

mod baud;
mod crc;
mod decode;
mod encode;
mod instruction;
mod status;
mod stuffing;

pub use baud::{BaudIndexError, baud_index_to_baudrate};
pub use crc::{DXL_CRC16, checksum, legacy_checksum};
pub use decode::{Decode, DecodeError, DecodeErrorKind};
pub use encode::Encode;
pub use instruction::{Instruction, MotorId};
pub use protocol::{Header, InstructionPacket, Protocol, ProtocolV1, ProtocolV2, ProtocolVersion};
pub use status::{ErrorCode, StatusPacket};
pub use stuffing::{StuffState, escape, unescape};

/// Starting byte sequence of every current-generation packet, including the reserved byte.
pub const V2_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Starting byte sequence of every legacy packet.
pub const V1_HEADER: [u8; 2] = [0xFF, 0xFF];
