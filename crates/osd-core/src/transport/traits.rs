//! Transport layer abstraction.
//!
//! A duplex byte stream to the device, obtained from either a serial
//! port or a TCP socket. The connection clones the transport once so a
//! background reader can drain it while callers write.

use std::io::{Read, Write};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open {target}: {message}")]
    OpenFailed { target: String, message: String },

    #[error("failed to enumerate serial ports: {0}")]
    EnumerationFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("failed to clone transport: {0}")]
    CloneFailed(String),

    #[error("connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract duplex byte stream.
///
/// Implementations must use a short read timeout (returning
/// `TimedOut`/`WouldBlock`) so the reader task can notice shutdown.
pub trait Transport: Read + Write + Send {
    /// Clone the underlying stream for the reader task.
    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError>;
}
