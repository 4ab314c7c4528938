use crate::encoding::TextEncoding;
use crate::error::SerialError;
use crate::payload::SendMode;
use crate::ports::PortDescriptor;
use crate::serial_manager::{SerialEvent, SerialManager, Stats};
use crate::transport::Backend;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often the worker checks the port for new bytes when idle.
    pub poll_interval: Duration,
    pub encoding: TextEncoding,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            encoding: TextEncoding::Utf8,
        }
    }
}

/// Manager state as of the last command or poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub connected: bool,
    pub port_name: Option<String>,
    pub stats: Stats,
    pub ports: Vec<PortDescriptor>,
}

enum Command {
    RefreshPorts,
    Open { name: String, baud_rate: u32 },
    Close,
    Send { payload: String, mode: SendMode },
    SetEncoding(TextEncoding),
    Shutdown,
}

/// Runs a [`SerialManager`] on its own thread. Commands are queued and
/// answered through [`events`](Self::events); the manager is never
/// touched from any other thread.
pub struct SerialService {
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SerialEvent>,
    snapshot: Arc<RwLock<Snapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialService {
    pub fn spawn<B>(backend: B, config: ServiceConfig) -> std::io::Result<Self>
    where
        B: Backend + 'static,
    {
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let mut manager = SerialManager::new(backend).with_encoding(config.encoding);
        let rx_evt = manager.subscribe();
        let snapshot = Arc::new(RwLock::new(take_snapshot(&manager)));
        let shared = Arc::clone(&snapshot);

        let worker = std::thread::Builder::new()
            .name("serline-io".into())
            .spawn(move || {
                loop {
                    match rx_cmd.recv_timeout(config.poll_interval) {
                        Ok(Command::RefreshPorts) => {
                            manager.refresh_ports();
                        }
                        Ok(Command::Open { name, baud_rate }) => {
                            let _ = manager.open(&name, baud_rate);
                        }
                        Ok(Command::Close) => manager.close(),
                        Ok(Command::Send { payload, mode }) => {
                            let _ = manager.send(&payload, mode);
                        }
                        Ok(Command::SetEncoding(encoding)) => manager.set_encoding(encoding),
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    manager.poll();
                    *shared.write() = take_snapshot(&manager);
                }

                if manager.is_connected() {
                    manager.close();
                }
                *shared.write() = take_snapshot(&manager);
                debug!("serial worker stopped");
            })?;

        Ok(Self {
            tx_cmd,
            rx_evt,
            snapshot,
            worker: Some(worker),
        })
    }

    pub fn refresh_ports(&self) -> Result<(), SerialError> {
        self.command(Command::RefreshPorts)
    }

    pub fn open(&self, name: impl Into<String>, baud_rate: u32) -> Result<(), SerialError> {
        self.command(Command::Open {
            name: name.into(),
            baud_rate,
        })
    }

    pub fn close(&self) -> Result<(), SerialError> {
        self.command(Command::Close)
    }

    pub fn send(&self, payload: impl Into<String>, mode: SendMode) -> Result<(), SerialError> {
        self.command(Command::Send {
            payload: payload.into(),
            mode,
        })
    }

    pub fn set_encoding(&self, encoding: TextEncoding) -> Result<(), SerialError> {
        self.command(Command::SetEncoding(encoding))
    }

    pub fn events(&self) -> &Receiver<SerialEvent> {
        &self.rx_evt
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Stop the worker, closing the port, and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.tx_cmd.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn command(&self, cmd: Command) -> Result<(), SerialError> {
        self.tx_cmd.send(cmd).map_err(|_| SerialError::ServiceStopped)
    }
}

impl Drop for SerialService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn take_snapshot<B: Backend>(manager: &SerialManager<B>) -> Snapshot {
    Snapshot {
        connected: manager.is_connected(),
        port_name: manager.port_name().map(str::to_string),
        stats: manager.stats(),
        ports: manager.ports().to_vec(),
    }
}
