//! Host-side driver for Dynamixel serial actuator buses.
//!
//! [`DynamixelBus`] owns one [`Transport`](transport::Transport) and one protocol generation and serializes
//! every request/response exchange on the shared half-duplex medium. The wire format lives in the
//! [`protocol`] crate, re-exported here.

pub use dxl_wire as protocol;

use dxl_wire::{BaudIndexError, DecodeError, MotorId};
use thiserror::Error;

pub mod catalog;
pub mod sim;
pub mod transport;

mod bus;
mod deadline;
mod read;
mod sync;

#[cfg(feature = "serial")]
pub mod serial;

pub use bus::{BusConfig, DynamixelBus, ReadReply};
pub use deadline::Deadline;
pub use read::ReadPacket;

#[cfg(feature = "serial")]
pub use bus::SerialBus;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serialport Error: {0}")]
    SerialportError(#[from] serialport::Error),

    #[error("Packet decoding error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Packet timeout")]
    Timeout,

    #[error("Could not open any of the candidate serial ports: {0:?}")]
    NoDevice(Vec<String>),

    #[error(transparent)]
    BaudIndex(#[from] BaudIndexError),

    #[error("Sync write value for motor {motor_id} is {found} bytes long, expected {expected}")]
    InconsistentValueLength {
        motor_id: MotorId,
        expected: usize,
        found: usize,
    },

    #[error("Payload of {size} bytes does not fit in one packet (at most {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Address {address:#x} does not fit in {width} byte(s)")]
    AddressOutOfRange { address: u16, width: usize },
}

impl BusError {
    /// Whether the error only means that no reply arrived in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
