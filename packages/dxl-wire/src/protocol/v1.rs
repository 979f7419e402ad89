use alloc::vec::Vec;

use crate::{
    V1_HEADER,
    crc::legacy_checksum,
    decode::{DecodeError, DecodeErrorKind},
    instruction::{Instruction, MotorId},
    protocol::{Header, InstructionPacket, Protocol, ProtocolVersion},
    status::{ErrorCode, StatusPacket},
};

/// Smallest well-formed frame: header, id, length, instruction or error byte and checksum.
const MIN_PACKET_SIZE: usize = 6;

/// Largest frame, bounded by the 8-bit length field.
const MAX_PACKET_SIZE: usize = u8::MAX as usize + 4;

/// Largest params block: the length field also counts the instruction and the checksum.
const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - 2;

/// Header bytes decoded while synchronizing, up to and including the error byte of a reply.
const HEADER_SIZE: usize = 5;

/// Legacy framing (protocol 1.0).
///
/// Frames start with `FF FF`, carry an 8-bit length and end with the inverted sum of everything after the
/// marker. Params are sent as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolV1;

impl ProtocolV1 {
    fn frame(&self, motor_id: MotorId, instruction: u8, payload: &[u8]) -> Vec<u8> {
        assert!(
            payload.len() <= MAX_PAYLOAD_SIZE,
            "payload of {} bytes does not fit in a protocol 1.0 packet",
            payload.len()
        );

        let mut packet = Vec::with_capacity(payload.len() + MIN_PACKET_SIZE);
        packet.extend_from_slice(&V1_HEADER);
        packet.push(motor_id.0);
        packet.push((payload.len() + 2) as u8);
        packet.push(instruction);
        packet.extend_from_slice(payload);

        let checksum = legacy_checksum(&packet[V1_HEADER.len()..]);
        packet.push(checksum);
        packet
    }
}

impl Protocol for ProtocolV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn sync_marker(&self) -> &'static [u8] {
        &V1_HEADER
    }

    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn address_width(&self) -> usize {
        1
    }

    fn max_payload_size(&self) -> usize {
        MAX_PAYLOAD_SIZE
    }

    fn create_packet(&self, motor_id: MotorId, instruction: Instruction, payload: &[u8]) -> Vec<u8> {
        self.frame(motor_id, instruction.into(), payload)
    }

    fn create_status_packet(&self, motor_id: MotorId, error: ErrorCode, payload: &[u8]) -> Vec<u8> {
        self.frame(motor_id, error.bits(), payload)
    }

    fn check_packet(&self, raw: &[u8]) -> Result<(), DecodeError> {
        if raw.len() < MIN_PACKET_SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd));
        }
        if raw.len() > MAX_PACKET_SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::Oversized { size: raw.len() }));
        }
        // 0xFF can never be an id, so `FF FF FF` is noise followed by a marker.
        if raw[..2] != V1_HEADER || raw[2] == MotorId::INVALID.0 {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidHeader));
        }

        let declared = usize::from(raw[3]);
        if declared + 4 != raw.len() {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::LengthMismatch {
                declared,
                actual: raw.len() - 4,
            }));
        }

        let (body, checksum) = raw.split_at(raw.len() - 1);
        let expected = legacy_checksum(&body[V1_HEADER.len()..]);
        if checksum[0] != expected {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::Checksum {
                value: checksum[0].into(),
                expected: expected.into(),
            }));
        }

        Ok(())
    }

    fn decode_header(&self, buf: &[u8]) -> Option<Header> {
        if buf.len() < HEADER_SIZE || buf[..2] != V1_HEADER || buf[2] == MotorId::INVALID.0 {
            return None;
        }

        let declared = usize::from(buf[3]);
        if declared < 2 {
            return None;
        }

        Some(Header {
            motor_id: MotorId(buf[2]),
            packet_size: declared + 4,
        })
    }

    fn extract_payload(&self, raw: &[u8]) -> StatusPacket {
        if self.check_packet(raw).is_err() {
            return StatusPacket::invalid();
        }

        StatusPacket {
            motor_id: MotorId(raw[2]),
            error: ErrorCode::from_bits_retain(raw[4]),
            payload: raw[5..raw.len() - 1].to_vec(),
        }
    }

    fn extract_instruction(&self, raw: &[u8]) -> Option<InstructionPacket> {
        self.check_packet(raw).ok()?;

        Some(InstructionPacket {
            motor_id: MotorId(raw[2]),
            instruction: Instruction::try_from(raw[4]).ok()?,
            params: raw[5..raw.len() - 1].to_vec(),
        })
    }

    /// Encodes `len` into a single byte; only the low byte is kept.
    fn convert_length(&self, len: usize) -> Vec<u8> {
        alloc::vec![len as u8]
    }

    /// Encodes `address` into a single byte; only the low byte is kept.
    fn convert_address(&self, address: u16) -> Vec<u8> {
        alloc::vec![address as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::ProtocolV1;
    use crate::{DecodeErrorKind, ErrorCode, Instruction, MotorId, Protocol};

    #[test]
    fn read_matches_reference_encoding() {
        // Read the internal temperature of id 1.
        assert_eq!(
            ProtocolV1.create_packet(MotorId(1), Instruction::Read, &[0x2B, 0x01]),
            [0xFF, 0xFF, 0x01, 0x04, 0x02, 0x2B, 0x01, 0xCC]
        );
    }

    #[test]
    fn reference_status_decodes() {
        // Reply to the read above: 32 degrees, no error.
        let status = ProtocolV1.extract_payload(&[0xFF, 0xFF, 0x01, 0x03, 0x00, 0x20, 0xDB]);

        assert_eq!(status.motor_id, MotorId(1));
        assert!(!status.error.is_set());
        assert_eq!(status.payload, [0x20]);
    }

    #[test]
    fn params_are_not_stuffed() {
        let payload = [0xFF, 0xFF, 0xFD, 0x00];
        let packet = ProtocolV1.create_status_packet(MotorId(2), ErrorCode::empty(), &payload);

        assert_eq!(packet.len(), 6 + payload.len());
        assert_eq!(&packet[5..9], &payload);
    }

    #[test]
    fn validate_rejections() {
        let kind = |raw: &[u8]| ProtocolV1.check_packet(raw).unwrap_err().kind();
        let good = ProtocolV1.create_packet(MotorId(1), Instruction::Ping, &[]);

        assert!(ProtocolV1.validate(&good));
        assert_eq!(kind(&good[..5]), DecodeErrorKind::UnexpectedEnd);
        assert_eq!(kind(&[0; 260]), DecodeErrorKind::Oversized { size: 260 });

        let mut id = good.clone();
        id[2] = 0xFF;
        assert_eq!(kind(&id), DecodeErrorKind::InvalidHeader);

        let mut length = good.clone();
        length[3] = 0x03;
        assert_eq!(
            kind(&length),
            DecodeErrorKind::LengthMismatch {
                declared: 3,
                actual: 2
            }
        );

        let mut checksum = good.clone();
        checksum[5] ^= 0x01;
        assert!(matches!(kind(&checksum), DecodeErrorKind::Checksum { .. }));
    }

    #[test]
    fn header_rejects_marker_run() {
        assert_eq!(ProtocolV1.decode_header(&[0xFF, 0xFF, 0xFF, 0x01, 0x02]), None);
    }
}
