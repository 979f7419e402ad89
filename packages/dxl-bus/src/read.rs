//! The timeout-bounded read/retry loop.

use std::time::Duration;

use dxl_wire::{MotorId, Protocol, StatusPacket};
use log::{debug, trace, warn};

use crate::{deadline::Deadline, sync::synchronize_on_header, transport::Transport, BusError};

/// Receiving replies with any [`Protocol`].
///
/// Implemented for every protocol, including `dyn Protocol`.
pub trait ReadPacket: Protocol {
    /// Waits for a status packet from `expected` carrying exactly `expected_len` payload bytes.
    ///
    /// Noise, corrupt frames, replies from other devices and replies of the wrong length are skipped and the
    /// stream is resynchronized. A zero `timeout` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Timeout`] if no matching packet was assembled in time; pending input is flushed
    /// first. I/O failures of the transport are returned as they happen.
    fn read_packet<T: Transport + ?Sized>(
        &self,
        timeout: Duration,
        expected: MotorId,
        expected_len: usize,
        transport: &mut T,
    ) -> Result<StatusPacket, BusError> {
        self.read_packet_until(&Deadline::after(timeout), expected, expected_len, transport)
    }

    /// [`ReadPacket::read_packet`] against an already running deadline.
    fn read_packet_until<T: Transport + ?Sized>(
        &self,
        deadline: &Deadline,
        expected: MotorId,
        expected_len: usize,
        transport: &mut T,
    ) -> Result<StatusPacket, BusError>;
}

impl<P: Protocol + ?Sized> ReadPacket for P {
    fn read_packet_until<T: Transport + ?Sized>(
        &self,
        deadline: &Deadline,
        expected: MotorId,
        expected_len: usize,
        transport: &mut T,
    ) -> Result<StatusPacket, BusError> {
        'resync: loop {
            let Some(mut packet) = synchronize_on_header(self, deadline, expected, transport)? else {
                break;
            };
            let Some(header) = self.decode_header(&packet) else {
                break;
            };

            while packet.len() < header.packet_size {
                if deadline.is_expired() {
                    break 'resync;
                }
                let received = transport.read(header.packet_size - packet.len(), deadline.remaining())?;
                packet.extend(received);
            }

            trace!("received packet: {:x?}", packet);

            let status = self.extract_payload(&packet);
            if !status.motor_id.answers(expected) {
                debug!("Discarding frame that failed validation: {:x?}", packet);
                continue;
            }
            if status.payload.len() != expected_len {
                debug!(
                    "Discarding reply from motor {} with {} payload bytes, expected {}",
                    status.motor_id,
                    status.payload.len(),
                    expected_len
                );
                continue;
            }

            return Ok(status);
        }

        warn!("Timed out waiting for a reply from motor {expected}");
        transport.flush_input()?;
        Err(BusError::Timeout)
    }
}
