//! Byte-stuffing for current-generation payloads.
//!
//! A payload may never contain the sequence `FF FF FD`, which would be indistinguishable from the start of a
//! frame. Wherever it occurs, an extra `FD` is inserted after it; the receiver strips it again.

use alloc::vec::Vec;

const MARKER: u8 = 0xFF;
const RESERVED: u8 = 0xFD;

/// Progress through the `FF FF FD` (and stuffed `FF FF FD FD`) pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StuffState {
    #[default]
    NoMatch,
    SawFirstMarker,
    SawSecondMarker,
    SawReserved,
}

impl StuffState {
    /// Advances the pattern matcher by one byte.
    ///
    /// [`StuffState::SawReserved`] is only reached through [`StuffState::SawSecondMarker`], and a further `FD`
    /// after it is the inserted byte.
    pub const fn next(self, byte: u8) -> Self {
        match (self, byte) {
            (Self::SawFirstMarker | Self::SawSecondMarker, MARKER) => Self::SawSecondMarker,
            (Self::SawSecondMarker, RESERVED) => Self::SawReserved,
            (_, MARKER) => Self::SawFirstMarker,
            _ => Self::NoMatch,
        }
    }
}

/// Inserts an extra `FD` after every `FF FF FD` in `bytes`.
pub fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len() + bytes.len() / 3);
    let mut state = StuffState::NoMatch;

    for &byte in bytes {
        escaped.push(byte);
        state = match state.next(byte) {
            StuffState::SawReserved => {
                escaped.push(RESERVED);
                StuffState::NoMatch
            }
            next => next,
        };
    }

    escaped
}

/// Removes the `FD` that [`escape`] inserted after every `FF FF FD`.
pub fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut unescaped = Vec::with_capacity(bytes.len());
    let mut state = StuffState::NoMatch;

    for &byte in bytes {
        state = match (state, byte) {
            (StuffState::SawReserved, RESERVED) => StuffState::NoMatch,
            (state, byte) => {
                unescaped.push(byte);
                state.next(byte)
            }
        };
    }

    unescaped
}
