//! A simulated multi-drop bus for tests and demos without hardware.
//!
//! [`SimulatedBus`] implements [`Transport`] and answers packets the way devices with a status return level of
//! "ping and read only" do: ping, read and bulk read produce status packets, everything else is applied
//! silently.

use std::{
    collections::{BTreeMap, VecDeque},
    io, thread,
    time::{Duration, Instant},
};

use dxl_wire::{ErrorCode, Instruction, InstructionPacket, MotorId, Protocol, ProtocolVersion};
use log::{debug, trace};

use crate::transport::Transport;

/// One device on a [`SimulatedBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedMotor {
    id: MotorId,
    memory: Vec<u8>,
    factory: Vec<u8>,
    error: ErrorCode,
    registered: Option<(usize, Vec<u8>)>,
}

impl SimulatedMotor {
    /// Creates a motor with `table_size` bytes of zeroed control table.
    pub fn new(id: MotorId, table_size: usize) -> Self {
        Self {
            id,
            memory: vec![0; table_size],
            factory: vec![0; table_size],
            error: ErrorCode::empty(),
            registered: None,
        }
    }

    /// Presets control table bytes; they are also what a reset restores.
    pub fn with_memory(mut self, address: usize, bytes: &[u8]) -> Self {
        self.memory[address..address + bytes.len()].copy_from_slice(bytes);
        self.factory = self.memory.clone();
        self
    }

    /// Sets the error byte reported in every reply.
    pub fn with_error(mut self, error: ErrorCode) -> Self {
        self.error = error;
        self
    }

    pub fn id(&self) -> MotorId {
        self.id
    }

    /// Returns `len` bytes of control table starting at `address`.
    pub fn memory(&self, address: usize, len: usize) -> Option<&[u8]> {
        self.memory.get(address..address.checked_add(len)?)
    }

    fn write_memory(&mut self, address: usize, bytes: &[u8]) {
        match self.memory.get_mut(address..address + bytes.len()) {
            Some(target) => target.copy_from_slice(bytes),
            None => debug!("Motor {} ignores write past its control table at {address}", self.id),
        }
    }
}

/// A scripted stand-in for a serial port with devices behind it.
#[derive(Debug)]
pub struct SimulatedBus {
    protocol: Box<dyn Protocol>,
    motors: BTreeMap<MotorId, SimulatedMotor>,
    incoming: VecDeque<(Instant, u8)>,
    sent: Vec<Vec<u8>>,
    chunk_size: usize,
    latency: Duration,
    flushes: usize,
}

impl SimulatedBus {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            protocol: version.protocol(),
            motors: BTreeMap::new(),
            incoming: VecDeque::new(),
            sent: Vec::new(),
            chunk_size: usize::MAX,
            latency: Duration::ZERO,
            flushes: 0,
        }
    }

    pub fn with_motor(mut self, motor: SimulatedMotor) -> Self {
        self.motors.insert(motor.id, motor);
        self
    }

    /// Limits how many bytes a single read returns.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Delays every reply and injected byte by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queues raw bytes, as if some other party had put them on the bus.
    pub fn inject(&mut self, bytes: &[u8]) {
        let available_at = Instant::now() + self.latency;
        self.incoming
            .extend(bytes.iter().map(|&byte| (available_at, byte)));
    }

    pub fn motor(&self, id: MotorId) -> Option<&SimulatedMotor> {
        self.motors.get(&id)
    }

    /// Every packet written to the bus so far.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Number of queued bytes not read yet.
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Number of times pending input was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    fn reply(&mut self, id: MotorId, payload: &[u8]) {
        let Some(motor) = self.motors.get(&id) else {
            return;
        };
        let packet = self.protocol.create_status_packet(id, motor.error, payload);
        trace!("simulated reply: {:x?}", packet);
        self.inject(&packet);
    }

    fn addressed(&self, target: MotorId) -> Vec<MotorId> {
        if target.is_broadcast() {
            self.motors.keys().copied().collect()
        } else {
            self.motors.keys().copied().filter(|&id| id == target).collect()
        }
    }

    /// Splits a little-endian field of the protocol's address width off the front of `params`.
    fn take_field(&self, params: &mut &[u8]) -> Option<usize> {
        let width = self.protocol.address_width();
        if params.len() < width {
            return None;
        }
        let (field, rest) = params.split_at(width);
        *params = rest;
        Some(
            field
                .iter()
                .rev()
                .fold(0usize, |value, &byte| (value << 8) | usize::from(byte)),
        )
    }

    fn handle(&mut self, packet: InstructionPacket) {
        let InstructionPacket {
            motor_id,
            instruction,
            params,
        } = packet;
        let mut params = params.as_slice();

        match instruction {
            Instruction::Ping => {
                for id in self.addressed(motor_id) {
                    self.reply(id, &[]);
                }
            }
            Instruction::Read => {
                let (Some(address), Some(len)) = (self.take_field(&mut params), self.take_field(&mut params))
                else {
                    return;
                };
                self.reply_memory(motor_id, address, len);
            }
            Instruction::Write | Instruction::RegWrite => {
                let Some(address) = self.take_field(&mut params) else {
                    return;
                };
                for id in self.addressed(motor_id) {
                    if let Some(motor) = self.motors.get_mut(&id) {
                        if instruction == Instruction::Write {
                            motor.write_memory(address, params);
                        } else {
                            motor.registered = Some((address, params.to_vec()));
                        }
                    }
                }
            }
            Instruction::Action => {
                for id in self.addressed(motor_id) {
                    if let Some(motor) = self.motors.get_mut(&id) {
                        if let Some((address, data)) = motor.registered.take() {
                            motor.write_memory(address, &data);
                        }
                    }
                }
            }
            Instruction::Reset => {
                for id in self.addressed(motor_id) {
                    if let Some(motor) = self.motors.get_mut(&id) {
                        motor.memory = motor.factory.clone();
                        motor.registered = None;
                    }
                }
            }
            Instruction::Reboot => {
                for id in self.addressed(motor_id) {
                    if let Some(motor) = self.motors.get_mut(&id) {
                        motor.registered = None;
                    }
                }
            }
            Instruction::SyncWrite => {
                let (Some(address), Some(len)) = (self.take_field(&mut params), self.take_field(&mut params))
                else {
                    return;
                };
                for entry in params.chunks_exact(len + 1) {
                    if let Some(motor) = self.motors.get_mut(&MotorId(entry[0])) {
                        motor.write_memory(address, &entry[1..]);
                    }
                }
            }
            Instruction::BulkRead => {
                while !params.is_empty() {
                    let Some((&id, rest)) = params.split_first() else {
                        break;
                    };
                    params = rest;
                    let (Some(address), Some(len)) = (self.take_field(&mut params), self.take_field(&mut params))
                    else {
                        return;
                    };
                    self.reply_memory(MotorId(id), address, len);
                }
            }
            other => debug!("Simulated bus ignores {other:?}"),
        }
    }

    fn reply_memory(&mut self, id: MotorId, address: usize, len: usize) {
        let data = self
            .motors
            .get(&id)
            .and_then(|motor| motor.memory(address, len))
            .map(<[u8]>::to_vec);
        if let Some(data) = data {
            self.reply(id, &data);
        }
    }
}

impl Transport for SimulatedBus {
    fn read(&mut self, max: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>> {
        let now = Instant::now();
        match (self.incoming.front().map(|&(at, _)| at), timeout) {
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "the simulated bus is silent",
                ));
            }
            (None, Some(timeout)) => {
                thread::sleep(timeout);
                return Ok(Vec::new());
            }
            (Some(at), Some(timeout)) if at.saturating_duration_since(now) > timeout => {
                thread::sleep(timeout);
                return Ok(Vec::new());
            }
            (Some(at), _) => thread::sleep(at.saturating_duration_since(now)),
        }

        let now = Instant::now();
        let mut received = Vec::new();
        while received.len() < max.min(self.chunk_size) {
            match self.incoming.front() {
                Some(&(at, byte)) if at <= now => {
                    received.push(byte);
                    self.incoming.pop_front();
                }
                _ => break,
            }
        }
        Ok(received)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent.push(bytes.to_vec());

        match self.protocol.extract_instruction(bytes) {
            Some(packet) => self.handle(packet),
            None => debug!("Simulated bus ignores malformed packet: {:x?}", bytes),
        }
        Ok(())
    }

    fn flush_input(&mut self) -> io::Result<()> {
        let now = Instant::now();
        self.incoming.retain(|&(at, _)| at > now);
        self.flushes += 1;
        Ok(())
    }
}
