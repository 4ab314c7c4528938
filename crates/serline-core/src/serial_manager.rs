use crate::encoding::TextEncoding;
use crate::error::SerialError;
use crate::framer::LineFramer;
use crate::payload::{self, SendMode};
use crate::ports::PortDescriptor;
use crate::transport::{Backend, SystemBackend, Transport, TransportErrorKind};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

/// Traffic counters. All three are zeroed by a successful open and only
/// ever grow otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SerialEvent {
    /// Sent after every open attempt and every close, whether or not the
    /// state actually changed. Carries the current state.
    ConnectionChanged(bool),
    PortListChanged,
    StatsChanged(Stats),
    LineReceived(String),
    Error(SerialError),
}

/// Owns one serial connection and turns it into line and counter events.
///
/// Everything here takes `&mut self`; the manager expects a single owner
/// that both issues commands and forwards transport readiness (`poll`,
/// `handle_bytes_available`, `handle_error`). See
/// [`SerialService`](crate::SerialService) for a threaded owner.
///
/// Events only queue for receivers handed out by
/// [`subscribe`](Self::subscribe); with no subscriber they are dropped.
pub struct SerialManager<B: Backend = SystemBackend> {
    backend: B,
    port: Option<Box<dyn Transport>>,
    ports: Vec<PortDescriptor>,
    framer: LineFramer,
    stats: Stats,
    encoding: TextEncoding,
    subscribers: Vec<Sender<SerialEvent>>,
}

impl SerialManager<SystemBackend> {
    pub fn system() -> Self {
        Self::new(SystemBackend)
    }
}

impl<B: Backend> SerialManager<B> {
    /// Creates a closed manager and enumerates ports once.
    pub fn new(backend: B) -> Self {
        let mut manager = Self {
            backend,
            port: None,
            ports: Vec::new(),
            framer: LineFramer::new(),
            stats: Stats::default(),
            encoding: TextEncoding::default(),
            subscribers: Vec::new(),
        };
        manager.refresh_ports();
        manager
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// A new receiver that gets every event emitted from now on.
    /// Dropping it unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<SerialEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Name of the open port.
    pub fn port_name(&self) -> Option<&str> {
        self.port.as_deref().map(|p| p.name())
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Ports found by the last [`refresh_ports`](Self::refresh_ports).
    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name.clone()).collect()
    }

    pub fn port_labels(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.label.clone()).collect()
    }

    /// Received bytes still waiting for a newline.
    pub fn pending_bytes(&self) -> &[u8] {
        self.framer.pending()
    }

    /// Re-query the platform. An enumeration failure yields an empty list.
    pub fn refresh_ports(&mut self) -> &[PortDescriptor] {
        let found = self.backend.available_ports().unwrap_or_else(|e| {
            warn!("{e}");
            Vec::new()
        });
        self.ports = found.into_iter().map(PortDescriptor::from).collect();
        debug!("found {} serial port(s)", self.ports.len());
        self.emit(SerialEvent::PortListChanged);
        &self.ports
    }

    /// Open `name` at 8-N-1, replacing any open connection.
    pub fn open(&mut self, name: &str, baud_rate: u32) -> Result<(), SerialError> {
        if let Some(old) = self.port.take() {
            info!("closing {} before opening {name}", old.name());
        }
        self.framer.clear();

        match self.backend.open(name, baud_rate) {
            Ok(port) => {
                info!("opened {name} at {baud_rate} baud");
                self.port = Some(port);
                self.stats = Stats::default();
                self.emit(SerialEvent::StatsChanged(self.stats));
                self.emit(SerialEvent::ConnectionChanged(true));
                Ok(())
            }
            Err(err) => {
                warn!("{err}");
                self.stats.errors += 1;
                self.emit(SerialEvent::StatsChanged(self.stats));
                self.emit(SerialEvent::Error(err.clone()));
                self.emit(SerialEvent::ConnectionChanged(false));
                Err(err)
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            info!("closed {}", port.name());
        }
        self.framer.clear();
        self.emit(SerialEvent::ConnectionChanged(false));
    }

    /// Encode and write `payload`. Returns the number of bytes the
    /// transport accepted.
    pub fn send(&mut self, payload: &str, mode: SendMode) -> Result<usize, SerialError> {
        if self.port.is_none() {
            return Err(self.report(SerialError::not_open()));
        }

        let data = payload::encode(payload, mode).map_err(|e| self.report(e.into()))?;
        if mode == SendMode::Hex && data.is_empty() {
            return Ok(0);
        }

        let Some(port) = self.port.as_deref_mut() else {
            return Err(self.report(SerialError::not_open()));
        };
        let (written, failure) = write_counted(port, &data);

        self.stats.tx_bytes += written as u64;
        self.emit(SerialEvent::StatsChanged(self.stats));

        if let Some(err) = failure {
            let message = err.to_string();
            let kind = TransportErrorKind::from_io(&err, TransportErrorKind::Write);
            self.handle_error(kind, &message);
            return Err(SerialError::SendFailure(message));
        }
        if written < data.len() {
            warn!("device accepted {written} of {} bytes", data.len());
        }
        debug!("sent {written} byte(s): {}", payload::to_hex_dump(&data[..written]));
        Ok(written)
    }

    /// Drain everything readable, count it, and emit each completed line.
    /// Returns the number of bytes read.
    pub fn handle_bytes_available(&mut self) -> usize {
        let Some(port) = self.port.as_deref_mut() else {
            return 0;
        };
        let bytes = match port.read_available() {
            Ok(bytes) => bytes,
            Err(err) => {
                let kind = TransportErrorKind::from_io(&err, TransportErrorKind::Read);
                self.handle_error(kind, &err.to_string());
                return 0;
            }
        };
        if bytes.is_empty() {
            return 0;
        }

        self.stats.rx_bytes += bytes.len() as u64;
        self.emit(SerialEvent::StatsChanged(self.stats));

        for line in self.framer.push(&bytes) {
            let text = self.encoding.decode(&line);
            debug!("line: {}", text.trim_end());
            self.emit(SerialEvent::LineReceived(text));
        }
        bytes.len()
    }

    /// Count and forward a transport error. Never closes the port.
    pub fn handle_error(&mut self, kind: TransportErrorKind, description: &str) {
        if kind == TransportErrorKind::NoError {
            return;
        }

        self.stats.errors += 1;
        warn!("transport error ({kind:?}): {description}");
        self.emit(SerialEvent::StatsChanged(self.stats));
        self.emit(SerialEvent::Error(SerialError::Transport {
            kind,
            message: description.to_string(),
        }));
    }

    /// Check readiness and read if anything arrived. For event loops
    /// without a native readable notification.
    pub fn poll(&mut self) -> usize {
        let Some(port) = self.port.as_deref_mut() else {
            return 0;
        };
        match port.bytes_to_read() {
            Ok(0) => 0,
            Ok(_) => self.handle_bytes_available(),
            Err(err) => {
                let kind = TransportErrorKind::from_io(&err, TransportErrorKind::Read);
                self.handle_error(kind, &err.to_string());
                0
            }
        }
    }

    fn report(&mut self, err: SerialError) -> SerialError {
        warn!("{err}");
        self.emit(SerialEvent::Error(err.clone()));
        err
    }

    fn emit(&mut self, event: SerialEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Write until everything is accepted or the device stops taking bytes.
/// Bytes accepted before an error are still reported.
fn write_counted(port: &mut dyn Transport, data: &[u8]) -> (usize, Option<std::io::Error>) {
    let mut written = 0;
    while written < data.len() {
        match port.write_bytes(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return (written, Some(e)),
        }
    }
    (written, None)
}
