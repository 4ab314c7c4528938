//! Core functionalities: port enumeration, serial I/O, line framing, traffic counters.

pub mod encoding;
pub mod error;
pub mod framer;
pub mod mock;
pub mod payload;
pub mod ports;
pub mod serial_manager;
pub mod serial_service;
pub mod transport;

pub use encoding::TextEncoding;
pub use error::SerialError;
pub use framer::LineFramer;
pub use payload::SendMode;
pub use ports::{PortDescriptor, RawPortInfo};
pub use serial_manager::{SerialEvent, SerialManager, Stats};
pub use serial_service::{SerialService, ServiceConfig, Snapshot};
pub use transport::{Backend, SystemBackend, Transport, TransportErrorKind};
