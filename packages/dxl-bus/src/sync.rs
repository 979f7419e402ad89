//! Finding the header of the reply we are waiting for in a noisy byte stream.

use std::io;

use dxl_wire::{MotorId, Protocol};
use log::{debug, trace};

use crate::{deadline::Deadline, transport::Transport};

/// States of [`synchronize_on_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// Dropping bytes that cannot start a sync marker.
    Searching,
    /// The buffer starts with (a prefix of) the sync marker; waiting for a full header.
    HeaderPending,
    /// The buffer starts with the header of a matching reply.
    Matched,
    /// The buffer starts with a well-formed header from some other device.
    Rejected,
}

/// Returns the first offset at which `marker` could start in `buffer`.
///
/// A partial marker at the very end of the buffer counts; if there is no candidate at all the whole buffer
/// can be dropped and `buffer.len()` is returned.
pub(crate) fn marker_offset(marker: &[u8], buffer: &[u8]) -> usize {
    (0..buffer.len())
        .find(|&start| {
            let candidate = &buffer[start..];
            let overlap = candidate.len().min(marker.len());
            candidate[..overlap] == marker[..overlap]
        })
        .unwrap_or(buffer.len())
}

/// Reads from `transport` until the buffered bytes start with a reply header from `expected`.
///
/// Headers from other devices are discarded, as is everything in front of a sync marker. A broadcast
/// `expected` id accepts the first reply from any device. Returns the buffered bytes, starting with the
/// matched header, or `None` once `deadline` expires.
pub(crate) fn synchronize_on_header<P, T>(
    protocol: &P,
    deadline: &Deadline,
    expected: MotorId,
    transport: &mut T,
) -> io::Result<Option<Vec<u8>>>
where
    P: Protocol + ?Sized,
    T: Transport + ?Sized,
{
    let marker = protocol.sync_marker();
    let header_size = protocol.header_size();

    let mut buffer = Vec::with_capacity(header_size);
    let mut state = SyncState::Searching;

    loop {
        state = match state {
            SyncState::Searching => {
                let offset = marker_offset(marker, &buffer);
                if offset > 0 {
                    trace!("Dropping {offset} bytes in front of the sync marker: {:x?}", &buffer[..offset]);
                    buffer.drain(..offset);
                }
                SyncState::HeaderPending
            }
            SyncState::HeaderPending if buffer.len() >= header_size => {
                match protocol.decode_header(&buffer) {
                    Some(header) if header.motor_id.answers(expected) => SyncState::Matched,
                    Some(header) => {
                        debug!(
                            "Skipping reply from motor {} while waiting for {expected}",
                            header.motor_id
                        );
                        SyncState::Rejected
                    }
                    None => {
                        // Not a header after all; the marker must have started later.
                        buffer.remove(0);
                        SyncState::Searching
                    }
                }
            }
            SyncState::HeaderPending => {
                if deadline.is_expired() {
                    return Ok(None);
                }

                let wanted = header_size - buffer.len();
                let received = transport.read(wanted, deadline.remaining())?;
                buffer.extend(received);
                SyncState::Searching
            }
            SyncState::Matched => return Ok(Some(buffer)),
            SyncState::Rejected => {
                buffer.clear();
                SyncState::Searching
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dxl_wire::{ErrorCode, MotorId, Protocol, ProtocolVersion};

    use super::{marker_offset, synchronize_on_header};
    use crate::{deadline::Deadline, sim::SimulatedBus};

    const MARKER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

    #[test]
    fn marker_offsets() {
        assert_eq!(marker_offset(&MARKER, &[]), 0);
        assert_eq!(marker_offset(&MARKER, &[0x01, 0x02]), 2);
        assert_eq!(marker_offset(&MARKER, &[0x01, 0xFF, 0xFF, 0xFD, 0x00, 0x07]), 1);
        assert_eq!(marker_offset(&MARKER, &[0x01, 0x02, 0xFF, 0xFF]), 2);
        assert_eq!(marker_offset(&MARKER, &[0xFF, 0xFF, 0xFF, 0xFD, 0x00]), 1);
        assert_eq!(marker_offset(&MARKER, &[0xFF, 0xFD, 0x01]), 3);
    }

    #[test]
    fn skips_noise_and_foreign_replies() {
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let protocol = version.protocol();
            let foreign = protocol.create_status_packet(MotorId(2), ErrorCode::empty(), &[0x01]);
            let ours = protocol.create_status_packet(MotorId(1), ErrorCode::empty(), &[0x02]);

            let mut bus = SimulatedBus::new(version);
            bus.inject(&[0x00, 0x13, 0x37]);
            bus.inject(&foreign);
            bus.inject(&ours);

            let buffer = synchronize_on_header(
                &*protocol,
                &Deadline::after(Duration::from_millis(200)),
                MotorId(1),
                &mut bus,
            )
            .unwrap()
            .unwrap();

            assert_eq!(buffer, ours[..protocol.header_size()], "{version}");
        }
    }

    #[test]
    fn broadcast_accepts_first_reply() {
        let protocol = ProtocolVersion::V2.protocol();
        let reply = protocol.create_status_packet(MotorId(5), ErrorCode::empty(), &[]);

        let mut bus = SimulatedBus::new(ProtocolVersion::V2);
        bus.inject(&reply);

        let buffer = synchronize_on_header(&*protocol, &Deadline::never(), MotorId::BROADCAST, &mut bus)
            .unwrap()
            .unwrap();
        assert_eq!(protocol.decode_header(&buffer).unwrap().motor_id, MotorId(5));
    }

    #[test]
    fn gives_up_at_deadline() {
        let protocol = ProtocolVersion::V2.protocol();
        let mut bus = SimulatedBus::new(ProtocolVersion::V2);
        bus.inject(&[0xFF, 0xFF, 0xFD]);

        let result = synchronize_on_header(
            &*protocol,
            &Deadline::after(Duration::from_millis(30)),
            MotorId(1),
            &mut bus,
        )
        .unwrap();
        assert_eq!(result, None);
    }
}
