use alloc::vec::Vec;

use crate::{
    V2_HEADER,
    crc::{DXL_CRC16, checksum},
    decode::{Decode, DecodeError, DecodeErrorKind},
    instruction::{Instruction, MotorId},
    protocol::{Header, InstructionPacket, Protocol, ProtocolVersion},
    status::{ErrorCode, StatusPacket},
    stuffing::{escape, unescape},
};

/// Smallest well-formed frame: header, instruction and checksum with no params.
const MIN_PACKET_SIZE: usize = 10;

/// Largest frame, bounded by the 16-bit length field.
const MAX_PACKET_SIZE: usize = u16::MAX as usize;

/// Bytes of a frame that are not params: marker and reserved byte, id, length, instruction, checksum.
const OVERHEAD: usize = 10;

/// Header bytes decoded while synchronizing, up to and including the error byte of a reply.
const HEADER_SIZE: usize = 9;

/// Current-generation framing (protocol 2.0).
///
/// Frames start with `FF FF FD 00`, carry a 16-bit length, byte-stuffed params and a CRC-16 over everything
/// before the checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolV2;

impl ProtocolV2 {
    fn frame(&self, motor_id: MotorId, instruction: u8, prefix: Option<u8>, payload: &[u8]) -> Vec<u8> {
        let escaped = escape(payload);
        let params_size = escaped.len() + usize::from(prefix.is_some());
        assert!(
            params_size <= MAX_PACKET_SIZE - OVERHEAD,
            "payload of {} bytes does not fit in a protocol 2.0 packet",
            payload.len()
        );

        let mut packet = Vec::with_capacity(params_size + OVERHEAD);
        packet.extend_from_slice(&V2_HEADER);
        packet.push(motor_id.0);
        packet.extend_from_slice(&((params_size + 3) as u16).to_le_bytes());
        packet.push(instruction);
        packet.extend(prefix);
        packet.extend_from_slice(&escaped);

        // The checksum covers the header too.
        let crc = checksum(&packet);
        packet.extend_from_slice(&crc);
        packet
    }

    fn declared_length(raw: &[u8]) -> Result<usize, DecodeError> {
        let mut data = raw
            .get(5..7)
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
        Ok(usize::from(u16::decode(&mut data)?))
    }
}

impl Protocol for ProtocolV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn sync_marker(&self) -> &'static [u8] {
        &V2_HEADER
    }

    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn address_width(&self) -> usize {
        2
    }

    fn max_payload_size(&self) -> usize {
        MAX_PACKET_SIZE - OVERHEAD
    }

    fn encoded_payload_size(&self, payload: &[u8]) -> usize {
        escape(payload).len()
    }

    fn create_packet(&self, motor_id: MotorId, instruction: Instruction, payload: &[u8]) -> Vec<u8> {
        self.frame(motor_id, instruction.into(), None, payload)
    }

    fn create_status_packet(&self, motor_id: MotorId, error: ErrorCode, payload: &[u8]) -> Vec<u8> {
        self.frame(motor_id, Instruction::Status.into(), Some(error.bits()), payload)
    }

    fn check_packet(&self, raw: &[u8]) -> Result<(), DecodeError> {
        if raw.len() < MIN_PACKET_SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd));
        }
        if raw.len() > MAX_PACKET_SIZE {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::Oversized { size: raw.len() }));
        }
        if raw[..4] != V2_HEADER {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidHeader));
        }

        let declared = Self::declared_length(raw)?;
        if declared + 7 != raw.len() {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::LengthMismatch {
                declared,
                actual: raw.len() - 7,
            }));
        }

        let (body, mut crc) = raw.split_at(raw.len() - 2);
        let expected = DXL_CRC16.checksum(body);
        let value = u16::decode(&mut crc)?;
        if value != expected {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::Checksum { value, expected }));
        }

        Ok(())
    }

    fn decode_header(&self, buf: &[u8]) -> Option<Header> {
        if buf.len() < HEADER_SIZE || buf[..4] != V2_HEADER {
            return None;
        }

        let declared = Self::declared_length(buf).ok()?;
        // A reply carries at least the status opcode, the error byte and the checksum.
        if declared < 4 || declared + 7 > MAX_PACKET_SIZE {
            return None;
        }

        Some(Header {
            motor_id: MotorId(buf[4]),
            packet_size: declared + 7,
        })
    }

    fn extract_payload(&self, raw: &[u8]) -> StatusPacket {
        if self.check_packet(raw).is_err() || raw.len() < MIN_PACKET_SIZE + 1 {
            return StatusPacket::invalid();
        }

        StatusPacket {
            motor_id: MotorId(raw[4]),
            error: ErrorCode::from_bits_retain(raw[8]),
            payload: unescape(&raw[9..raw.len() - 2]),
        }
    }

    fn extract_instruction(&self, raw: &[u8]) -> Option<InstructionPacket> {
        self.check_packet(raw).ok()?;

        Some(InstructionPacket {
            motor_id: MotorId(raw[4]),
            instruction: Instruction::try_from(raw[7]).ok()?,
            params: unescape(&raw[8..raw.len() - 2]),
        })
    }

    fn convert_length(&self, len: usize) -> Vec<u8> {
        (len as u16).to_le_bytes().into()
    }

    fn convert_address(&self, address: u16) -> Vec<u8> {
        address.to_le_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::ProtocolV2;
    use crate::{DecodeErrorKind, ErrorCode, Instruction, MotorId, Protocol};

    #[test]
    fn ping_matches_reference_encoding() {
        assert_eq!(
            ProtocolV2.create_packet(MotorId(1), Instruction::Ping, &[]),
            [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4E]
        );
    }

    #[test]
    fn length_field_counts_stuffed_bytes() {
        let packet = ProtocolV2.create_packet(MotorId(1), Instruction::Write, &[0xFF, 0xFF, 0xFD]);

        assert_eq!(&packet[5..7], &[7, 0]);
        assert_eq!(&packet[8..12], &[0xFF, 0xFF, 0xFD, 0xFD]);
        assert!(ProtocolV2.validate(&packet));
    }

    #[test]
    fn stuffed_status_payload_is_unescaped() {
        let payload = [0xFF, 0xFF, 0xFD, 0x01];
        let packet = ProtocolV2.create_status_packet(MotorId(4), ErrorCode::empty(), &payload);

        assert_eq!(packet.len(), 11 + payload.len() + 1);
        assert_eq!(ProtocolV2.extract_payload(&packet).payload, payload);
    }

    #[test]
    fn validate_rejections() {
        let good = ProtocolV2.create_packet(MotorId(1), Instruction::Ping, &[]);
        assert!(ProtocolV2.validate(&good));

        let kind = |raw: &[u8]| ProtocolV2.check_packet(raw).unwrap_err().kind();

        assert_eq!(kind(&good[..9]), DecodeErrorKind::UnexpectedEnd);
        assert_eq!(
            kind(&vec![0u8; 65_536]),
            DecodeErrorKind::Oversized { size: 65_536 }
        );

        let mut prefix = good.clone();
        prefix[3] = 0x01;
        assert_eq!(kind(&prefix), DecodeErrorKind::InvalidHeader);

        let mut length = good.clone();
        length[5] = 0x04;
        assert_eq!(
            kind(&length),
            DecodeErrorKind::LengthMismatch {
                declared: 4,
                actual: 3
            }
        );

        let mut crc = good.clone();
        crc[9] ^= 0x80;
        assert!(matches!(kind(&crc), DecodeErrorKind::Checksum { .. }));
    }

    #[test]
    fn largest_packet_validates() {
        let payload = vec![0x11u8; ProtocolV2.max_payload_size()];
        let packet = ProtocolV2.create_packet(MotorId(1), Instruction::Write, &payload);

        assert_eq!(packet.len(), 65_535);
        assert!(ProtocolV2.validate(&packet));
    }

    #[test]
    #[should_panic]
    fn oversized_payload_panics() {
        let payload = vec![0x11u8; ProtocolV2.max_payload_size() + 1];
        _ = ProtocolV2.create_packet(MotorId(1), Instruction::Write, &payload);
    }

    #[test]
    fn instruction_sized_frames_are_not_replies() {
        let ping = ProtocolV2.create_packet(MotorId(1), Instruction::Ping, &[]);

        assert_eq!(ProtocolV2.decode_header(&[&ping[..], &[0]].concat()), None);
        assert_eq!(ProtocolV2.extract_payload(&ping).motor_id, MotorId::INVALID);
    }

    #[test]
    fn address_and_length_are_little_endian() {
        assert_eq!(ProtocolV2.convert_address(0x0254), [0x54, 0x02]);
        assert_eq!(ProtocolV2.convert_length(4), [0x04, 0x00]);
    }
}
