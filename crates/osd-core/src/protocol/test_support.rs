//! Helpers for building device-side response frames in tests.

use super::checksum::Checksum;
use super::constants::{MSP_DIR_RESPONSE, SYNC, SYNC_MSP_V1, SYNC_MSP_V2};

/// Build an MSP v1 response frame (`$M>`) as the device would send it.
pub fn msp_v1_response(command: u8, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u8;
    let mut buf = vec![SYNC, SYNC_MSP_V1, MSP_DIR_RESPONSE, size, command];
    buf.extend_from_slice(payload);

    let mut cs = Checksum::xor();
    cs.update(size);
    cs.update(command);
    cs.update_slice(payload);
    buf.push(cs.finish());
    buf
}

/// Build an MSP v2 response frame (`$X>`) as the device would send it.
pub fn msp_v2_response(command: u16, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u16;
    let mut buf = vec![SYNC, SYNC_MSP_V2, MSP_DIR_RESPONSE, 0];
    buf.extend_from_slice(&command.to_le_bytes());
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(payload);

    // The flag byte is not checksummed.
    let mut cs = Checksum::crc8();
    cs.update_slice(&command.to_le_bytes());
    cs.update_slice(&size.to_le_bytes());
    cs.update_slice(payload);
    buf.push(cs.finish());
    buf
}
