//! Validated wire frames.

use std::fmt;

/// Which framing convention a frame arrived in.
///
/// OSD-native commands and flight-controller MSP traffic share one
/// byte stream; the decoder tags each frame with its dialect so the
/// dispatcher can pick the right message decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Osd,
    Msp,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Osd => write!(f, "OSD"),
            Dialect::Msp => write!(f, "MSP"),
        }
    }
}

/// One complete, checksum-validated unit of the wire protocol.
///
/// For MSP frames the payload retains the leading direction byte
/// (v1) or direction and flag bytes (v2); message decoders strip
/// that metadata themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub dialect: Dialect,
    pub command: u16,
    pub payload: Vec<u8>,
}
