//! Outgoing frame serialization.
//!
//! Pure serialize step: no response waiting happens here.

use super::checksum::Checksum;
use super::constants::{MSP_DIR_REQUEST, SYNC, SYNC_MSP_V1, SYNC_OSD};

/// Build one OSD-dialect frame: `$A`, length (command + payload),
/// command, payload, CRC8 over length + command + payload.
pub fn encode_osd(command: u8, payload: &[u8]) -> Vec<u8> {
    let size = 1 + payload.len() as u8;
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.push(SYNC);
    buf.push(SYNC_OSD);
    buf.push(size);
    buf.push(command);
    buf.extend_from_slice(payload);

    let mut cs = Checksum::crc8();
    cs.update(size);
    cs.update(command);
    cs.update_slice(payload);
    buf.push(cs.finish());
    buf
}

/// Build one MSP v1 request frame: `$M<`, payload length, command,
/// payload, XOR over length + command + payload.
pub fn encode_msp(command: u8, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u8;
    let mut buf = Vec::with_capacity(6 + payload.len());
    buf.push(SYNC);
    buf.push(SYNC_MSP_V1);
    buf.push(MSP_DIR_REQUEST);
    buf.push(size);
    buf.push(command);
    buf.extend_from_slice(payload);

    let mut cs = Checksum::xor();
    cs.update(size);
    cs.update(command);
    cs.update_slice(payload);
    buf.push(cs.finish());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_osd_layout() {
        let bytes = encode_osd(1, &[2]);
        assert_eq!(&bytes[..4], &[b'$', b'A', 2, 1]);
        assert_eq!(bytes[4], 2);
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn test_encode_osd_empty_payload() {
        let bytes = encode_osd(11, &[]);
        assert_eq!(&bytes[..4], &[b'$', b'A', 1, 11]);
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn test_encode_msp_layout() {
        let bytes = encode_msp(245, &[0xFE, 16]);
        assert_eq!(&bytes[..5], &[b'$', b'M', b'<', 2, 245]);
        assert_eq!(&bytes[5..7], &[0xFE, 16]);
        // XOR of length, command and payload bytes.
        assert_eq!(bytes[7], 2 ^ 245 ^ 0xFE ^ 16);
    }
}
