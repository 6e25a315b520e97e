//! Error taxonomy for the crate.

use thiserror::Error;

use crate::message::DecodeError;
use crate::transport::TransportError;
use crate::version::Version;

#[derive(Error, Debug)]
pub enum OsdError {
    #[error("timed out waiting for a response")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode response to command {command}: {source}")]
    Decode {
        command: u16,
        source: DecodeError,
    },

    #[error("expected {expected} response, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    #[error("device rejected command {command} with code {code}")]
    Device { command: u8, code: i8 },

    #[error("font character data must be 54 or 64 bytes, got {actual}")]
    InvalidFontCharSize { actual: usize },

    #[error("invalid font file: {0}")]
    InvalidFontFile(String),

    #[error("coordinate {0} out of the representable range")]
    PointOutOfRange(i32),

    #[error("device did not enter bootloader mode")]
    BootloaderEntry,

    #[error("device did not leave bootloader mode")]
    BootloaderExit,

    #[error("flash session rejected, device expects address {0}")]
    FlashBegin(u32),

    #[error("flash address mismatch: expected {expected}, device reports {got}")]
    FlashAddress { expected: u32, got: u32 },

    #[error("flight controller {variant:?} does not support passthrough (supported: {supported})")]
    UnsupportedFcVariant { variant: String, supported: String },

    #[error("{name} {version} is too old for passthrough, need at least {min}")]
    FcVersionTooOld {
        name: &'static str,
        version: Version,
        min: Version,
    },

    #[error("flight controller rejected the passthrough request")]
    PassthroughRejected,

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OsdError>;
