use crc::Crc;

/// [CRC16 error-detecting algorithm](https://en.wikipedia.org/wiki/Cyclic_redundancy_check)
/// used in current-generation packets.
///
/// Polynomial `0x8005`, zero initial value, no reflection and no final xor.
pub const DXL_CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_UMTS);

/// Computes the current-generation checksum over `bytes`, encoded little-endian as it appears on the wire.
#[inline]
pub fn checksum(bytes: &[u8]) -> [u8; 2] {
    DXL_CRC16.checksum(bytes).to_le_bytes()
}

/// Computes the legacy checksum: the inverted low byte of the sum of `bytes`.
///
/// Legacy packets checksum everything after the two-byte header.
#[inline]
pub fn legacy_checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}
