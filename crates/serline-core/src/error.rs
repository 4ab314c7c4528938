use crate::transport::TransportErrorKind;
use thiserror::Error;

/// Everything the serial manager reports. None of these are fatal: the
/// connection is always either open or closed after one is raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerialError {
    #[error("failed to open serial port: {message}")]
    OpenFailure {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("send failed: {0}")]
    SendFailure(String),

    #[error("invalid hex payload: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("{message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("serial worker has stopped")]
    ServiceStopped,

    #[error("port enumeration failed: {0}")]
    Enumerate(String),
}

impl SerialError {
    pub fn open_failure(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::OpenFailure {
            kind,
            message: message.into(),
        }
    }

    pub fn not_open() -> Self {
        Self::SendFailure("port not open".into())
    }
}
