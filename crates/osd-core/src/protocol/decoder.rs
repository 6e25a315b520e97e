//! Byte-at-a-time frame decoder.
//!
//! A single state machine recognizes the three framings multiplexed on
//! the stream. Corrupt input is never surfaced to callers: any sync or
//! checksum failure resets the machine to idle and the stream
//! resynchronizes on the next `$`.

use tracing::{debug, warn};

use super::checksum::Checksum;
use super::constants::{
    MSP_DIR_ERROR, MSP_DIR_REQUEST, MSP_DIR_RESPONSE, SYNC, SYNC_MSP_V1, SYNC_MSP_V2, SYNC_OSD,
};
use super::frame::{Dialect, Frame};

/// Position within one of the three mutually exclusive framing
/// sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Idle,
    Sync,

    OsdLength,
    OsdCommand,
    OsdPayload,

    MspV1Direction,
    MspV1PayloadSize,
    MspV1Command,
    MspV1Payload,

    MspV2Direction,
    MspV2Flag,
    MspV2CommandLow,
    MspV2CommandHigh,
    MspV2PayloadSizeLow,
    MspV2PayloadSizeHigh,
    MspV2Payload,

    Checksum,
}

/// Frame decoder state machine. Assembles exactly one frame at a time.
pub struct FrameDecoder {
    state: DecoderState,
    dialect: Dialect,
    buf: Vec<u8>,
    command: u16,
    payload_size: usize,
    checksum: Checksum,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            dialect: Dialect::Osd,
            buf: Vec::new(),
            command: 0,
            payload_size: 0,
            checksum: Checksum::Idle,
        }
    }

    fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.buf.clear();
        self.command = 0;
        self.payload_size = 0;
        self.checksum = Checksum::Idle;
    }

    /// Feed one byte, returning a completed frame if this byte
    /// finished one.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            DecoderState::Idle => {
                if byte == SYNC {
                    self.state = DecoderState::Sync;
                }
            }
            DecoderState::Sync => match byte {
                SYNC_OSD => {
                    self.state = DecoderState::OsdLength;
                    self.dialect = Dialect::Osd;
                    self.checksum = Checksum::crc8();
                }
                SYNC_MSP_V1 => {
                    self.state = DecoderState::MspV1Direction;
                    self.dialect = Dialect::Msp;
                    self.checksum = Checksum::xor();
                }
                SYNC_MSP_V2 => {
                    self.state = DecoderState::MspV2Direction;
                    self.dialect = Dialect::Msp;
                    self.checksum = Checksum::crc8();
                }
                _ => {
                    warn!(byte = %format!("{:#04x}", byte), "unknown sync char");
                    self.reset();
                }
            },

            DecoderState::OsdLength => {
                // Length counts the command byte plus the payload.
                self.payload_size = byte as usize;
                self.checksum.update(byte);
                self.state = DecoderState::OsdCommand;
            }
            DecoderState::OsdCommand => {
                self.command = byte as u16;
                self.checksum.update(byte);
                self.state = if self.payload_size > 1 {
                    DecoderState::OsdPayload
                } else {
                    DecoderState::Checksum
                };
            }
            DecoderState::OsdPayload => {
                self.buf.push(byte);
                self.checksum.update(byte);
                if self.buf.len() == self.payload_size - 1 {
                    self.state = DecoderState::Checksum;
                }
            }

            DecoderState::MspV1Direction => {
                if !is_msp_direction(byte) {
                    warn!(byte = %format!("{:#04x}", byte), "unknown MSP v1 direction char");
                    self.reset();
                    return None;
                }
                self.buf.push(byte);
                self.state = DecoderState::MspV1PayloadSize;
            }
            DecoderState::MspV1PayloadSize => {
                self.checksum.update(byte);
                self.payload_size = byte as usize;
                self.state = DecoderState::MspV1Command;
            }
            DecoderState::MspV1Command => {
                self.checksum.update(byte);
                self.command = byte as u16;
                self.state = if self.payload_size > 0 {
                    DecoderState::MspV1Payload
                } else {
                    DecoderState::Checksum
                };
            }
            DecoderState::MspV1Payload => {
                self.checksum.update(byte);
                self.buf.push(byte);
                // Buffer holds direction byte + payload.
                if self.buf.len() == self.payload_size + 1 {
                    self.state = DecoderState::Checksum;
                }
            }

            DecoderState::MspV2Direction => {
                if !is_msp_direction(byte) {
                    warn!(byte = %format!("{:#04x}", byte), "unknown MSP v2 direction char");
                    self.reset();
                    return None;
                }
                self.buf.push(byte);
                self.state = DecoderState::MspV2Flag;
            }
            DecoderState::MspV2Flag => {
                // The flag byte is carried in the payload but not checksummed.
                self.buf.push(byte);
                self.state = DecoderState::MspV2CommandLow;
            }
            DecoderState::MspV2CommandLow => {
                self.checksum.update(byte);
                self.command = byte as u16;
                self.state = DecoderState::MspV2CommandHigh;
            }
            DecoderState::MspV2CommandHigh => {
                self.checksum.update(byte);
                self.command |= (byte as u16) << 8;
                self.state = DecoderState::MspV2PayloadSizeLow;
            }
            DecoderState::MspV2PayloadSizeLow => {
                self.checksum.update(byte);
                self.payload_size = byte as usize;
                self.state = DecoderState::MspV2PayloadSizeHigh;
            }
            DecoderState::MspV2PayloadSizeHigh => {
                self.checksum.update(byte);
                self.payload_size |= (byte as usize) << 8;
                self.state = if self.payload_size > 0 {
                    DecoderState::MspV2Payload
                } else {
                    DecoderState::Checksum
                };
            }
            DecoderState::MspV2Payload => {
                self.checksum.update(byte);
                self.buf.push(byte);
                // Buffer holds direction + flag bytes + payload.
                if self.buf.len() == self.payload_size + 2 {
                    self.state = DecoderState::Checksum;
                }
            }

            DecoderState::Checksum => {
                let expected = self.checksum.finish();
                if expected == byte {
                    let frame = Frame {
                        dialect: self.dialect,
                        command: self.command,
                        payload: std::mem::take(&mut self.buf),
                    };
                    debug!(
                        dialect = %frame.dialect,
                        command = frame.command,
                        len = frame.payload.len(),
                        "decoded frame"
                    );
                    self.reset();
                    return Some(frame);
                }
                warn!(
                    got = %format!("{:#04x}", byte),
                    expected = %format!("{:#04x}", expected),
                    "invalid checksum"
                );
                self.reset();
            }
        }
        None
    }

    /// Feed a byte slice, collecting any frames completed along the way.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_msp_direction(byte: u8) -> bool {
    byte == MSP_DIR_REQUEST || byte == MSP_DIR_RESPONSE || byte == MSP_DIR_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::{encode_msp, encode_osd};
    use crate::protocol::test_support::{msp_v1_response, msp_v2_response};

    #[test]
    fn test_osd_frame_roundtrip() {
        let mut dec = FrameDecoder::new();
        let bytes = encode_osd(1, &[2]);
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].dialect, Dialect::Osd);
        assert_eq!(frames[0].command, 1);
        assert_eq!(frames[0].payload, vec![2]);
    }

    #[test]
    fn test_osd_frame_empty_payload() {
        let mut dec = FrameDecoder::new();
        let bytes = encode_osd(11, &[]);
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 11);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_msp_v1_roundtrip() {
        let mut dec = FrameDecoder::new();
        let bytes = encode_msp(2, &[]);
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].dialect, Dialect::Msp);
        assert_eq!(frames[0].command, 2);
        // Direction byte is retained for payload consumers.
        assert_eq!(frames[0].payload, vec![b'<']);
    }

    #[test]
    fn test_msp_v1_response_with_payload() {
        let mut dec = FrameDecoder::new();
        let bytes = msp_v1_response(2, b"INAV");
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 2);
        assert_eq!(frames[0].payload, b">INAV");
    }

    #[test]
    fn test_msp_v2_response() {
        let mut dec = FrameDecoder::new();
        let bytes = msp_v2_response(253, b"hello\0");
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].dialect, Dialect::Msp);
        assert_eq!(frames[0].command, 253);
        assert_eq!(frames[0].payload, b">\0hello\0");
    }

    #[test]
    fn test_checksum_mismatch_discards_and_resyncs() {
        let mut dec = FrameDecoder::new();
        let mut bytes = encode_osd(1, &[2]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(dec.feed_slice(&bytes).is_empty());

        // The next valid frame is still recognized.
        let frames = dec.feed_slice(&encode_osd(1, &[2]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_bad_sync_char_resyncs() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed_slice(b"$Q").is_empty());
        let frames = dec.feed_slice(&encode_osd(17, &[]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 17);
    }

    #[test]
    fn test_bad_msp_direction_resyncs() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed_slice(b"$M?").is_empty());
        assert!(dec.feed_slice(b"$X?").is_empty());
        let frames = dec.feed_slice(&msp_v1_response(3, &[4, 2, 0]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_leading_garbage_ignored() {
        let mut dec = FrameDecoder::new();
        let mut bytes = vec![0x00, 0xFF, b'A'];
        bytes.extend_from_slice(&encode_osd(41, &[]));
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 41);
    }

    #[test]
    fn test_two_frames_back_to_back() {
        let mut dec = FrameDecoder::new();
        let mut bytes = encode_osd(1, &[2]);
        bytes.extend_from_slice(&encode_osd(9, &[2]));
        let frames = dec.feed_slice(&bytes);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, 1);
        assert_eq!(frames[1].command, 9);
    }
}
