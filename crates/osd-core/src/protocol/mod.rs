//! Wire protocol: constants, checksums, framing, encode and decode.

pub mod checksum;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod frame;

#[cfg(test)]
pub mod test_support;

pub use constants::{MspCommand, OsdCommand, PROTOCOL_VERSION};
pub use decoder::FrameDecoder;
pub use frame::{Dialect, Frame};
