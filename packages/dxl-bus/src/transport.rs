//! Byte-level access to the bus.

use std::{io, time::Duration};

/// A half-duplex byte pipe to the devices on a bus.
///
/// Implementations only move bytes; framing and synchronization are done by the caller.
pub trait Transport: Send {
    /// Reads between 1 and `max` bytes.
    ///
    /// With `Some(timeout)` the read waits at most that long and returns an empty buffer if nothing arrived.
    /// With `None` it blocks until at least one byte is available. Fewer than `max` bytes may be returned even
    /// if more are on their way, so callers must loop.
    fn read(&mut self, max: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>>;

    /// Transmits `bytes` synchronously.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Discards any received but unread input.
    fn flush_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, max: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>> {
        (**self).read(max, timeout)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn flush_input(&mut self) -> io::Result<()> {
        (**self).flush_input()
    }
}
