//! Byte-stream device abstraction and its `serialport` implementation.

use crate::error::SerialError;
use crate::ports::RawPortInfo;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Write timeout handed to the OS driver. Reads never wait on it because
/// only bytes already buffered by the driver are pulled.
const IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Device error classes, as a serial driver reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    NoError,
    DeviceNotFound,
    Permission,
    Open,
    Write,
    Read,
    Resource,
    Unsupported,
    Timeout,
    Unknown,
}

impl TransportErrorKind {
    /// Classify an I/O error raised while doing `context` (usually
    /// `Read` or `Write`). Errors with no better class fall back to it.
    pub fn from_io(err: &io::Error, context: TransportErrorKind) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::DeviceNotFound,
            io::ErrorKind::PermissionDenied => Self::Permission,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::Resource,
            io::ErrorKind::Unsupported => Self::Unsupported,
            _ => context,
        }
    }

    /// The device is gone or unusable; further I/O on the handle will
    /// keep failing until it is reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceNotFound | Self::Permission | Self::Resource)
    }
}

impl From<&serialport::Error> for TransportErrorKind {
    fn from(err: &serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::DeviceNotFound,
            serialport::ErrorKind::InvalidInput => Self::Open,
            serialport::ErrorKind::Unknown => Self::Unknown,
            serialport::ErrorKind::Io(kind) => Self::from_io(&io::Error::from(kind), Self::Open),
        }
    }
}

/// An open byte-stream connection.
pub trait Transport: Send {
    fn name(&self) -> &str;

    /// Write as much of `data` as the device accepts right now.
    /// Returns the number of bytes accepted, which may be short.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Bytes currently readable without waiting.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Everything currently readable, in one pull. Empty when idle.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;
}

/// Where ports come from: the platform, or a mock in tests.
pub trait Backend: Send {
    fn available_ports(&self) -> Result<Vec<RawPortInfo>, SerialError>;

    /// Open `name` at `baud_rate`, 8 data bits, no parity, one stop bit,
    /// no flow control.
    fn open(&mut self, name: &str, baud_rate: u32) -> Result<Box<dyn Transport>, SerialError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl Backend for SystemBackend {
    fn available_ports(&self) -> Result<Vec<RawPortInfo>, SerialError> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(RawPortInfo::from).collect())
            .map_err(|e| SerialError::Enumerate(e.to_string()))
    }

    fn open(&mut self, name: &str, baud_rate: u32) -> Result<Box<dyn Transport>, SerialError> {
        let port = serialport::new(name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|e| SerialError::open_failure(TransportErrorKind::from(&e), e.to_string()))?;

        Ok(Box::new(SystemTransport {
            name: name.to_string(),
            port,
        }))
    }
}

pub struct SystemTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl Transport for SystemTransport {
    fn name(&self) -> &str {
        &self.name
    }

    /// Hands bytes to the driver without waiting for them to drain.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let available = self.bytes_to_read()?;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
