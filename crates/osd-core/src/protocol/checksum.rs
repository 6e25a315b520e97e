//! Running checksums for the wire framings.
//!
//! The OSD-native and MSP v2 framings use CRC-8 with polynomial 0xD5
//! (the DVB-S2 variant), MSP v1 uses a plain XOR accumulator. Both are
//! fed one protocol byte at a time while a frame is assembled.

use crc::{CRC_8_DVB_S2, Crc, Digest};

static CRC8_D5: Crc<u8> = Crc::<u8>::new(&CRC_8_DVB_S2);

/// Per-frame checksum accumulator.
///
/// Created when the frame dialect is identified, updated with every
/// checksummed byte and consumed when the trailing checksum byte
/// arrives. `Idle` is the state between frames.
pub enum Checksum {
    Idle,
    Crc8(Digest<'static, u8>),
    Xor(u8),
}

impl Checksum {
    /// CRC-8 poly 0xD5 accumulator (OSD, MSP v2).
    pub fn crc8() -> Self {
        Self::Crc8(CRC8_D5.digest())
    }

    /// XOR accumulator (MSP v1).
    pub fn xor() -> Self {
        Self::Xor(0)
    }

    pub fn update(&mut self, byte: u8) {
        match self {
            Self::Idle => {}
            Self::Crc8(digest) => digest.update(&[byte]),
            Self::Xor(sum) => *sum ^= byte,
        }
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// Consume the accumulator and return the digest, resetting to `Idle`.
    pub fn finish(&mut self) -> u8 {
        match std::mem::replace(self, Self::Idle) {
            Self::Idle => 0,
            Self::Crc8(digest) => digest.finalize(),
            Self::Xor(sum) => sum,
        }
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Checksum::Idle"),
            Self::Crc8(_) => write!(f, "Checksum::Crc8"),
            Self::Xor(sum) => write!(f, "Checksum::Xor({sum:#04x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        // CRC-8/DVB-S2 check value for "123456789".
        let mut cs = Checksum::crc8();
        cs.update_slice(b"123456789");
        assert_eq!(cs.finish(), 0xBC);
    }

    #[test]
    fn test_xor() {
        let mut cs = Checksum::xor();
        cs.update_slice(&[0x0F, 0xF0, 0x55]);
        assert_eq!(cs.finish(), 0xAA);
    }

    #[test]
    fn test_finish_resets_to_idle() {
        let mut cs = Checksum::crc8();
        cs.update(0x42);
        let _ = cs.finish();
        cs.update(0x42);
        assert_eq!(cs.finish(), 0);
    }
}
