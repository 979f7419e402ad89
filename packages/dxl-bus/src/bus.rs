use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use dxl_wire::{
    baud_index_to_baudrate, Decode, DecodeError, Encode, ErrorCode, Instruction, MotorId, Protocol,
    ProtocolVersion,
};
use log::trace;

use crate::{read::ReadPacket, transport::Transport, BusError};

#[cfg(feature = "serial")]
use crate::serial::SerialTransport;

/// A bus on a local serial port.
#[cfg(feature = "serial")]
pub type SerialBus = DynamixelBus<SerialTransport>;

/// Everything needed to open a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    /// Line rate in bits per second.
    pub baudrate: u32,
    /// Candidate serial devices, tried in order.
    pub device_paths: Vec<String>,
    pub protocol: ProtocolVersion,
    /// How long a blocking read waits between checks for input.
    pub poll_interval: Duration,
}

impl BusConfig {
    /// Creates a configuration from the value of a device's baud rate register.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::BaudIndex`] if `index` does not name a supported rate.
    pub fn from_baud_index(
        index: u8,
        device_paths: Vec<String>,
        protocol: ProtocolVersion,
    ) -> Result<Self, BusError> {
        Ok(Self {
            baudrate: baud_index_to_baudrate(index)?,
            device_paths,
            protocol,
            ..Default::default()
        })
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            baudrate: 1_000_000,
            device_paths: vec!["/dev/ttyUSB0".to_string()],
            protocol: ProtocolVersion::V2,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// A successful reply to a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReply {
    /// Status byte reported by the device, passed through as is.
    pub error: ErrorCode,
    pub payload: Vec<u8>,
}

impl ReadReply {
    pub fn error_flag_set(&self) -> bool {
        self.error.is_set()
    }

    /// Decodes the payload as a little-endian register value.
    pub fn value<T: Decode>(&self) -> Result<T, DecodeError> {
        T::decode(&mut self.payload.as_slice())
    }
}

#[derive(Debug)]
struct BusInner<T> {
    protocol: Box<dyn Protocol>,
    transport: T,
}

impl<T: Transport> BusInner<T> {
    fn send(&mut self, motor_id: MotorId, instruction: Instruction, payload: &[u8]) -> Result<(), BusError> {
        let size = self.protocol.encoded_payload_size(payload);
        let max = self.protocol.max_payload_size();
        if size > max {
            return Err(BusError::PayloadTooLarge { size, max });
        }

        let packet = self.protocol.create_packet(motor_id, instruction, payload);
        trace!("sent packet: {:x?}", packet);
        self.transport.write(&packet)?;
        Ok(())
    }

    fn address(&self, address: u16) -> Result<Vec<u8>, BusError> {
        let width = self.protocol.address_width();
        if width < 2 && address > u16::from(u8::MAX) {
            return Err(BusError::AddressOutOfRange { address, width });
        }
        Ok(self.protocol.convert_address(address))
    }

    fn length(&self, length: usize) -> Result<Vec<u8>, BusError> {
        let max = self.protocol.max_payload_size();
        if length > max {
            return Err(BusError::PayloadTooLarge { size: length, max });
        }
        Ok(self.protocol.convert_length(length))
    }

    fn receive(&mut self, timeout: Duration, motor_id: MotorId, length: usize) -> Result<ReadReply, BusError> {
        let status = self
            .protocol
            .read_packet(timeout, motor_id, length, &mut self.transport)?;
        Ok(ReadReply {
            error: status.error,
            payload: status.payload,
        })
    }
}

/// An open Dynamixel bus.
///
/// Owns one protocol generation and one [`Transport`]. Every operation holds the bus for its whole
/// request/response exchange, including all resynchronization, so operations from different threads never
/// interleave on the wire.
#[derive(Debug)]
pub struct DynamixelBus<T> {
    inner: Mutex<BusInner<T>>,
}

#[cfg(feature = "serial")]
impl DynamixelBus<SerialTransport> {
    /// Opens the first serial device in `config.device_paths` that can be opened.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoDevice`] if none of them could be opened.
    pub fn open(config: &BusConfig) -> Result<Self, BusError> {
        let transport = SerialTransport::open(config.baudrate, &config.device_paths, config.poll_interval)?;
        Ok(Self::new(config.protocol, transport))
    }
}

impl<T: Transport> DynamixelBus<T> {
    pub fn new(version: ProtocolVersion, transport: T) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                protocol: version.protocol(),
                transport,
            }),
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .protocol
            .version()
    }

    /// Closes the bus and returns the underlying transport.
    pub fn into_transport(self) -> T {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .transport
    }

    fn transaction<R>(&self, exchange: impl FnOnce(&mut BusInner<T>) -> Result<R, BusError>) -> Result<R, BusError> {
        let mut bus = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        exchange(&mut bus)
    }

    /// Checks whether `motor_id` answers within `timeout`. A zero timeout waits indefinitely.
    pub fn ping(&self, motor_id: MotorId, timeout: Duration) -> Result<bool, BusError> {
        self.transaction(|bus| {
            bus.send(motor_id, Instruction::Ping, &[])?;
            match bus.receive(timeout, motor_id, 0) {
                Ok(_) => Ok(true),
                Err(BusError::Timeout) => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    /// Reads `length` bytes of control table starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Timeout`] if no reply arrived in time. A reply with the device's error flag set is
    /// still a successful read; see [`ReadReply::error_flag_set`].
    pub fn read(
        &self,
        motor_id: MotorId,
        address: u16,
        length: usize,
        timeout: Duration,
    ) -> Result<ReadReply, BusError> {
        self.transaction(|bus| {
            let mut params = bus.address(address)?;
            params.extend(bus.length(length)?);

            bus.send(motor_id, Instruction::Read, &params)?;
            bus.receive(timeout, motor_id, length)
        })
    }

    /// Sends a write instruction. `payload` starts with the encoded register address.
    ///
    /// Devices do not acknowledge plain writes, so no reply is awaited.
    pub fn write(&self, motor_id: MotorId, payload: &[u8]) -> Result<(), BusError> {
        self.transaction(|bus| bus.send(motor_id, Instruction::Write, payload))
    }

    /// Writes `value` to the register at `address`.
    pub fn write_register(&self, motor_id: MotorId, address: u16, value: impl Encode) -> Result<(), BusError> {
        self.transaction(|bus| {
            let mut payload = bus.address(address)?;
            payload.extend(value.to_bytes());
            bus.send(motor_id, Instruction::Write, &payload)
        })
    }

    /// Stages a write that takes effect on the next [`DynamixelBus::action`].
    pub fn reg_write(&self, motor_id: MotorId, payload: &[u8]) -> Result<(), BusError> {
        self.transaction(|bus| bus.send(motor_id, Instruction::RegWrite, payload))
    }

    /// Applies staged writes. Usually sent to [`MotorId::BROADCAST`].
    pub fn action(&self, motor_id: MotorId) -> Result<(), BusError> {
        self.transaction(|bus| bus.send(motor_id, Instruction::Action, &[]))
    }

    /// Restores the factory settings of `motor_id`.
    pub fn reset(&self, motor_id: MotorId) -> Result<(), BusError> {
        self.transaction(|bus| bus.send(motor_id, Instruction::Reset, &[]))
    }

    pub fn reboot(&self, motor_id: MotorId) -> Result<(), BusError> {
        self.transaction(|bus| bus.send(motor_id, Instruction::Reboot, &[]))
    }

    /// Writes one value per motor to the same register with a single broadcast instruction.
    ///
    /// The wire format has no per-entry length, so every value must encode to the same number of bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InconsistentValueLength`] before anything is transmitted if the lengths differ.
    pub fn sync_write<V: Encode>(&self, values: &BTreeMap<MotorId, V>, base_register: u16) -> Result<(), BusError> {
        let Some(stride) = values.values().next().map(Encode::size) else {
            return Ok(());
        };
        if let Some((&motor_id, value)) = values.iter().find(|(_, value)| value.size() != stride) {
            return Err(BusError::InconsistentValueLength {
                motor_id,
                expected: stride,
                found: value.size(),
            });
        }

        self.transaction(|bus| {
            let mut payload = bus.address(base_register)?;
            payload.extend(bus.length(stride)?);
            for (motor_id, value) in values {
                payload.push(motor_id.0);
                payload.extend(value.to_bytes());
            }

            bus.send(MotorId::BROADCAST, Instruction::SyncWrite, &payload)
        })
    }

    /// Reads one register range from each of several motors with a single instruction.
    ///
    /// Replies are collected in request order, each waiting up to `timeout`. An entry whose reply does not
    /// arrive maps to `None`; as devices answer a bulk read one after another, the entries behind it usually
    /// time out as well. A motor listed twice keeps its last reply.
    pub fn bulk_read(
        &self,
        entries: &[(MotorId, u16, usize)],
        timeout: Duration,
    ) -> Result<BTreeMap<MotorId, Option<ReadReply>>, BusError> {
        if entries.is_empty() {
            return Ok(BTreeMap::new());
        }

        self.transaction(|bus| {
            for &(_, address, length) in entries {
                bus.address(address)?;
                bus.length(length)?;
            }
            let package = bus.protocol.build_bulk_read_package(entries);
            bus.send(MotorId::BROADCAST, Instruction::BulkRead, &package)?;

            let mut replies = BTreeMap::new();
            for &(motor_id, _, length) in entries {
                let reply = match bus.receive(timeout, motor_id, length) {
                    Ok(reply) => Some(reply),
                    Err(BusError::Timeout) => None,
                    Err(e) => return Err(e),
                };
                replies.insert(motor_id, reply);
            }
            Ok(replies)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        time::{Duration, Instant},
    };

    use dxl_wire::{ErrorCode, MotorId, ProtocolVersion};

    use super::{BusConfig, DynamixelBus};
    use crate::{
        sim::{SimulatedBus, SimulatedMotor},
        BusError,
    };

    const VERSIONS: [ProtocolVersion; 2] = [ProtocolVersion::V1, ProtocolVersion::V2];
    const TIMEOUT: Duration = Duration::from_millis(100);

    fn bus_with_motors(version: ProtocolVersion, ids: &[u8]) -> DynamixelBus<SimulatedBus> {
        let sim = ids.iter().fold(SimulatedBus::new(version), |sim, &id| {
            sim.with_motor(SimulatedMotor::new(MotorId(id), 128).with_memory(36, &[id, 0x10, 0x00, 0x00]))
        });
        DynamixelBus::new(version, sim)
    }

    #[test]
    fn ping_finds_present_motors() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[1, 7]);

            assert!(bus.ping(MotorId(7), TIMEOUT).unwrap(), "{version}");
            assert_eq!(bus.protocol_version(), version);
        }
    }

    #[test]
    fn ping_without_reply_returns_at_deadline() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[1]);

            let started = Instant::now();
            let matched = bus.ping(MotorId(2), TIMEOUT).unwrap();
            let elapsed = started.elapsed();

            assert!(!matched, "{version}");
            assert!(elapsed >= TIMEOUT, "{version}: {elapsed:?}");
            assert!(elapsed < TIMEOUT + Duration::from_millis(100), "{version}: {elapsed:?}");
        }
    }

    #[test]
    fn read_returns_control_table() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[3]);

            let reply = bus.read(MotorId(3), 36, 4, TIMEOUT).unwrap();
            assert_eq!(reply.payload, [3, 0x10, 0x00, 0x00], "{version}");
            assert_eq!(reply.value::<u32>().unwrap(), 0x1003, "{version}");
            assert!(!reply.error_flag_set(), "{version}");
        }
    }

    #[test]
    fn read_passes_device_error_through() {
        let sim = SimulatedBus::new(ProtocolVersion::V2)
            .with_motor(SimulatedMotor::new(MotorId(4), 16).with_error(ErrorCode::ALERT));
        let bus = DynamixelBus::new(ProtocolVersion::V2, sim);

        let reply = bus.read(MotorId(4), 0, 2, TIMEOUT).unwrap();
        assert!(reply.error_flag_set());
        assert_eq!(reply.error, ErrorCode::ALERT);
    }

    #[test]
    fn read_timeout_is_an_error() {
        let bus = bus_with_motors(ProtocolVersion::V2, &[]);

        let result = bus.read(MotorId(5), 0, 2, Duration::from_millis(30));
        assert!(result.as_ref().is_err_and(BusError::is_timeout), "{result:?}");
    }

    #[test]
    fn legacy_addresses_are_one_byte() {
        let bus = bus_with_motors(ProtocolVersion::V1, &[1]);

        let result = bus.read(MotorId(1), 0x100, 2, TIMEOUT);
        assert!(matches!(result, Err(BusError::AddressOutOfRange { address: 0x100, width: 1 })));
        assert!(bus.into_transport().sent().is_empty());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let bus = bus_with_motors(ProtocolVersion::V1, &[1]);

        let result = bus.write(MotorId(1), &[0; 300]);
        assert!(matches!(result, Err(BusError::PayloadTooLarge { size: 300, max: 253 })));
        assert!(bus.into_transport().sent().is_empty());
    }

    #[test]
    fn writes_reach_memory() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[1, 2]);

            bus.write_register(MotorId(1), 10, 0xBEEF_u16).unwrap();
            let staged = match version {
                ProtocolVersion::V1 => vec![20, 0x01],
                ProtocolVersion::V2 => vec![20, 0x00, 0x01],
            };
            bus.reg_write(MotorId(2), &staged).unwrap();
            bus.action(MotorId::BROADCAST).unwrap();
            bus.reset(MotorId(1)).unwrap();
            bus.write_register(MotorId(1), 12, 0x7F_u8).unwrap();

            let sim = bus.into_transport();
            let motor_1 = sim.motor(MotorId(1)).unwrap();
            assert_eq!(motor_1.memory(10, 3).unwrap(), [0x00, 0x00, 0x7F], "{version}");
            assert_eq!(sim.motor(MotorId(2)).unwrap().memory(20, 1).unwrap(), [0x01], "{version}");
        }
    }

    #[test]
    fn reboot_drops_staged_write() {
        let bus = bus_with_motors(ProtocolVersion::V2, &[1]);

        bus.reg_write(MotorId(1), &[20, 0x00, 0x01]).unwrap();
        bus.reboot(MotorId(1)).unwrap();
        bus.action(MotorId(1)).unwrap();

        let sim = bus.into_transport();
        assert_eq!(sim.sent().len(), 3);
        assert_eq!(sim.motor(MotorId(1)).unwrap().memory(20, 1).unwrap(), [0x00]);
    }

    #[test]
    fn sync_write_reaches_every_motor() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[1, 2, 3]);
            let values = BTreeMap::from([(MotorId(1), 0x0101_u16), (MotorId(3), 0x0303_u16)]);

            bus.sync_write(&values, 30).unwrap();

            let sim = bus.into_transport();
            assert_eq!(sim.sent().len(), 1, "{version}");
            assert_eq!(sim.motor(MotorId(1)).unwrap().memory(30, 2).unwrap(), [1, 1], "{version}");
            assert_eq!(sim.motor(MotorId(2)).unwrap().memory(30, 2).unwrap(), [0, 0], "{version}");
            assert_eq!(sim.motor(MotorId(3)).unwrap().memory(30, 2).unwrap(), [3, 3], "{version}");
        }
    }

    #[test]
    fn sync_write_rejects_mixed_lengths_before_sending() {
        let bus = bus_with_motors(ProtocolVersion::V2, &[1, 2]);
        let values = BTreeMap::from([(MotorId(1), vec![0x01, 0x02]), (MotorId(2), vec![0x03])]);

        let result = bus.sync_write(&values, 30);

        assert!(matches!(
            result,
            Err(BusError::InconsistentValueLength {
                motor_id: MotorId(2),
                expected: 2,
                found: 1
            })
        ));
        assert!(bus.into_transport().sent().is_empty());
    }

    #[test]
    fn sync_write_of_nothing_sends_nothing() {
        let bus = bus_with_motors(ProtocolVersion::V2, &[1]);

        bus.sync_write(&BTreeMap::<MotorId, u32>::new(), 30).unwrap();
        assert!(bus.into_transport().sent().is_empty());
    }

    #[test]
    fn bulk_read_collects_replies_in_order() {
        for version in VERSIONS {
            let bus = bus_with_motors(version, &[1, 2]);

            let replies = bus
                .bulk_read(
                    &[(MotorId(2), 36, 2), (MotorId(1), 37, 1), (MotorId(9), 36, 4)],
                    Duration::from_millis(50),
                )
                .unwrap();

            assert_eq!(replies.len(), 3, "{version}");
            assert_eq!(replies[&MotorId(2)].as_ref().unwrap().payload, [2, 0x10], "{version}");
            assert_eq!(replies[&MotorId(1)].as_ref().unwrap().payload, [0x10], "{version}");
            assert_eq!(replies[&MotorId(9)], None, "{version}");
        }
    }

    #[test]
    fn transactions_do_not_interleave() {
        let bus = bus_with_motors(ProtocolVersion::V2, &[1, 2, 3, 4]);

        std::thread::scope(|scope| {
            for id in 1..=4 {
                let bus = &bus;
                scope.spawn(move || {
                    for _ in 0..25 {
                        assert!(bus.ping(MotorId(id), TIMEOUT).unwrap());
                        let reply = bus.read(MotorId(id), 36, 1, TIMEOUT).unwrap();
                        assert_eq!(reply.payload, [id]);
                    }
                });
            }
        });
    }

    #[test]
    fn config_from_baud_index() {
        let config = BusConfig::from_baud_index(3, vec!["/dev/ttyACM0".into()], ProtocolVersion::V1).unwrap();
        assert_eq!(config.baudrate, 500_000);
        assert_eq!(config.protocol, ProtocolVersion::V1);

        let result = BusConfig::from_baud_index(253, Vec::new(), ProtocolVersion::V2);
        assert!(matches!(result, Err(BusError::BaudIndex(_))));
    }
}
