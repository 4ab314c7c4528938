//! In-memory backend for driving a [`SerialManager`](crate::SerialManager)
//! without hardware.
//!
//! A [`MockBackend`] is a cheap handle: clones share the same simulated
//! device, so a test can keep one clone to feed bytes and inspect writes
//! while the manager owns another.
//!
//! ```
//! use serline_core::mock::MockBackend;
//! use serline_core::{SendMode, SerialManager};
//!
//! let device = MockBackend::with_ports(&["/dev/ttyMOCK0"]);
//! let mut manager = SerialManager::new(device.clone());
//! manager.open("/dev/ttyMOCK0", 115_200).unwrap();
//! manager.send("hello", SendMode::Text).unwrap();
//! assert_eq!(device.written(), b"hello");
//! ```

use crate::error::SerialError;
use crate::ports::RawPortInfo;
use crate::transport::{Backend, Transport, TransportErrorKind};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockDevice {
    ports: Vec<RawPortInfo>,
    open_error: Option<(TransportErrorKind, String)>,
    /// Name and baud rate of every successful open, in order.
    opens: Vec<(String, u32)>,
    /// Generation of the live handle; bumped on every open.
    generation: u64,
    is_open: bool,
    rx_queue: VecDeque<u8>,
    written: Vec<u8>,
    /// Upper bound on bytes accepted per write call.
    write_chunk: Option<usize>,
    /// Total bytes the device accepts before it stalls (returns 0).
    write_capacity: Option<usize>,
    write_error: Option<io::ErrorKind>,
    read_error: Option<io::ErrorKind>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    device: Arc<Mutex<MockDevice>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports with no description or manufacturer.
    pub fn with_ports(names: &[&str]) -> Self {
        let backend = Self::new();
        backend.set_ports(
            names
                .iter()
                .map(|name| RawPortInfo {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
        );
        backend
    }

    pub fn set_ports(&self, ports: Vec<RawPortInfo>) {
        self.device.lock().ports = ports;
    }

    /// Make every following open fail with `message`; `None` to recover.
    pub fn fail_open(&self, message: Option<&str>) {
        self.fail_open_with(TransportErrorKind::Open, message);
    }

    pub fn fail_open_with(&self, kind: TransportErrorKind, message: Option<&str>) {
        self.device.lock().open_error = message.map(|m| (kind, m.to_string()));
    }

    /// Bytes the device will deliver on the next reads.
    pub fn feed(&self, bytes: &[u8]) {
        self.device.lock().rx_queue.extend(bytes);
    }

    pub fn written(&self) -> Vec<u8> {
        self.device.lock().written.clone()
    }

    pub fn set_write_chunk(&self, chunk: Option<usize>) {
        self.device.lock().write_chunk = chunk;
    }

    pub fn set_write_capacity(&self, capacity: Option<usize>) {
        self.device.lock().write_capacity = capacity;
    }

    /// Fail the next write with `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.device.lock().write_error = Some(kind);
    }

    /// Fail the next readiness query or read with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.device.lock().read_error = Some(kind);
    }

    pub fn is_open(&self) -> bool {
        self.device.lock().is_open
    }

    pub fn opens(&self) -> Vec<(String, u32)> {
        self.device.lock().opens.clone()
    }
}

impl Backend for MockBackend {
    fn available_ports(&self) -> Result<Vec<RawPortInfo>, SerialError> {
        Ok(self.device.lock().ports.clone())
    }

    fn open(&mut self, name: &str, baud_rate: u32) -> Result<Box<dyn Transport>, SerialError> {
        let mut device = self.device.lock();
        if let Some((kind, message)) = &device.open_error {
            return Err(SerialError::open_failure(*kind, message.clone()));
        }
        if !device.ports.iter().any(|p| p.name == name) {
            let message = format!("no such port: {name}");
            return Err(SerialError::open_failure(TransportErrorKind::DeviceNotFound, message));
        }
        if device.is_open {
            let message = format!("{name} is busy");
            return Err(SerialError::open_failure(TransportErrorKind::Permission, message));
        }

        device.generation += 1;
        device.is_open = true;
        device.opens.push((name.to_string(), baud_rate));

        Ok(Box::new(MockTransport {
            name: name.to_string(),
            generation: device.generation,
            device: Arc::clone(&self.device),
        }))
    }
}

struct MockTransport {
    name: String,
    generation: u64,
    device: Arc<Mutex<MockDevice>>,
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut device = self.device.lock();
        if let Some(kind) = device.write_error.take() {
            return Err(io::Error::new(kind, "simulated write failure"));
        }

        let mut n = data.len();
        if let Some(chunk) = device.write_chunk {
            n = n.min(chunk);
        }
        if let Some(capacity) = device.write_capacity {
            n = n.min(capacity.saturating_sub(device.written.len()));
        }
        device.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let mut device = self.device.lock();
        if let Some(kind) = device.read_error.take() {
            return Err(io::Error::new(kind, "simulated read failure"));
        }
        Ok(device.rx_queue.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut device = self.device.lock();
        if let Some(kind) = device.read_error.take() {
            return Err(io::Error::new(kind, "simulated read failure"));
        }
        Ok(device.rx_queue.drain(..).collect())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        let mut device = self.device.lock();
        if device.generation == self.generation {
            device.is_open = false;
        }
    }
}
