//! Implements discovering and opening USB serial adapters that drive a Dynamixel bus.

use std::{
    io::{self, Read, Write},
    time::Duration,
};

use log::{debug, trace, warn};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};

use crate::{transport::Transport, BusError};

/// The USB vendor ID of FTDI, whose bridges sit in every Robotis adapter
pub const FTDI_USB_VID: u16 = 0x0403;

/// The USB PID of the U2D2
pub const U2D2_USB_PID: u16 = 0x6014;

/// The USB PID of the USB2Dynamixel
pub const USB2DYNAMIXEL_USB_PID: u16 = 0x6001;

/// Kind of USB serial adapter, best guess first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AdapterType {
    U2d2,
    Usb2Dynamixel,
    /// Any other USB serial port, such as a bus converter on a CDC-ACM board.
    Other,
}

impl AdapterType {
    fn from_usb_ids(vid: u16, pid: u16) -> Self {
        match (vid, pid) {
            (FTDI_USB_VID, U2D2_USB_PID) => Self::U2d2,
            (FTDI_USB_VID, USB2DYNAMIXEL_USB_PID) => Self::Usb2Dynamixel,
            _ => Self::Other,
        }
    }
}

/// A serial port that might lead to a bus
#[derive(Clone, Debug)]
pub struct CandidatePort {
    pub port_info: SerialPortInfo,
    pub adapter: AdapterType,
}

impl CandidatePort {
    pub fn path(&self) -> &str {
        &self.port_info.port_name
    }
}

/// Lists the USB serial ports a bus could be on, known adapters first.
pub fn available_ports() -> Result<Vec<CandidatePort>, BusError> {
    let mut candidates = Vec::new();

    for port in serialport::available_ports()? {
        // If it is not a USB port, ignore it.
        let SerialPortType::UsbPort(info) = &port.port_type else {
            continue;
        };

        if cfg!(target_os = "macos") && port.port_name.starts_with("/dev/tty.") {
            // https://pbxbook.com/other/mac-tty.html
            debug!("Ignoring port named {:?} because it is a call-in device", port.port_name);
            continue;
        }

        let adapter = AdapterType::from_usb_ids(info.vid, info.pid);
        debug!("Found {:?} adapter at {}", adapter, port.port_name);
        candidates.push(CandidatePort {
            adapter,
            port_info: port,
        });
    }

    candidates.sort_by_key(|candidate| candidate.adapter);
    Ok(candidates)
}

/// An open serial port in front of a bus.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    poll_interval: Duration,
    port_timeout: Duration,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Opens the first of `paths` that can be opened, at 8N1 and `baudrate`.
    ///
    /// Reads without a timeout wake up every `poll_interval` to check for input.
    pub fn open(baudrate: u32, paths: &[String], poll_interval: Duration) -> Result<Self, BusError> {
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        for path in paths {
            let opened = serialport::new(path, baudrate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .timeout(poll_interval)
                .open();

            match opened {
                Ok(port) => {
                    debug!("Opened {path} at {baudrate} baud");
                    return Ok(Self {
                        port,
                        path: path.clone(),
                        poll_interval,
                        port_timeout: poll_interval,
                    });
                }
                Err(e) => warn!("Could not open serial port {path}: {e}"),
            }
        }

        Err(BusError::NoDevice(paths.to_vec()))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        if timeout != self.port_timeout {
            self.port.set_timeout(timeout)?;
            self.port_timeout = timeout;
        }
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, max: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>> {
        if timeout.is_some_and(|timeout| timeout.is_zero()) || max == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0; max];
        loop {
            self.set_port_timeout(timeout.unwrap_or(self.poll_interval))?;

            match self.port.read(&mut buffer) {
                Ok(read) if read > 0 => {
                    buffer.truncate(read);
                    trace!("read from {}: {:x?}", self.path, buffer);
                    return Ok(buffer);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            if timeout.is_some() {
                return Ok(Vec::new());
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn flush_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AdapterType, SerialTransport, FTDI_USB_VID};
    use crate::BusError;

    #[test]
    fn adapters_by_usb_ids() {
        assert_eq!(AdapterType::from_usb_ids(FTDI_USB_VID, 0x6014), AdapterType::U2d2);
        assert_eq!(AdapterType::from_usb_ids(FTDI_USB_VID, 0x6001), AdapterType::Usb2Dynamixel);
        assert_eq!(AdapterType::from_usb_ids(0x2341, 0x0043), AdapterType::Other);
        assert!(AdapterType::U2d2 < AdapterType::Other);
    }

    #[test]
    fn no_openable_path_is_no_device() {
        let paths = vec![
            "/nonexistent/dxl-bus-test-0".to_string(),
            "/nonexistent/dxl-bus-test-1".to_string(),
        ];

        match SerialTransport::open(1_000_000, &paths, Duration::from_millis(5)) {
            Err(BusError::NoDevice(tried)) => assert_eq!(tried, paths),
            other => panic!("expected NoDevice, got {other:?}"),
        }
    }
}
