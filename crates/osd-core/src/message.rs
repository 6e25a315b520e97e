//! Typed messages decoded from validated frames.
//!
//! Dispatch is a pure function of (dialect, command id): every known
//! command has a typed decoder, everything else falls back to a raw
//! payload-carrying variant.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::protocol::constants::{
    FONT_CHAR_DATA_SIZE, FONT_CHAR_METADATA_SIZE, FONT_CHAR_PAYLOAD_SIZE, PROTOCOL_VERSION,
};
use crate::protocol::{Dialect, Frame, MspCommand, OsdCommand};
use crate::version::Version;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid magic number")]
    InvalidMagic,

    #[error("invalid payload size {actual}, expecting {expected}")]
    PayloadSize { expected: usize, actual: usize },

    #[error("payload too short ({actual} bytes)")]
    Truncated { actual: usize },

    #[error("unsupported settings version {actual}, expecting {expected}")]
    SettingsVersion { expected: u8, actual: u8 },
}

/// Analog TV signal type reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvStandard {
    Unknown,
    Ntsc,
    Pal,
}

impl Default for TvStandard {
    fn default() -> Self {
        TvStandard::Unknown
    }
}

impl From<u8> for TvStandard {
    fn from(v: u8) -> Self {
        match v {
            1 => TvStandard::Ntsc,
            2 => TvStandard::Pal,
            _ => TvStandard::Unknown,
        }
    }
}

/// Device hardware and configuration information.
///
/// The device answers an info query with either a single `B` byte
/// while in bootloader mode, or an `AGH`-prefixed structure while
/// running the application firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoMessage {
    pub version: Version,
    pub grid_rows: u8,
    pub grid_columns: u8,
    pub pixel_width: u16,
    pub pixel_height: u16,
    pub tv_standard: TvStandard,
    pub has_detected_camera: bool,
    pub max_frame_size: u16,
    pub context_stack_size: u8,
    pub is_bootloader: bool,
}

impl InfoMessage {
    const MAGIC: &'static [u8] = b"AGH";
    /// Structured fields following the magic prefix.
    const BODY_SIZE: usize = 14;

    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload == b"B" {
            return Ok(Self {
                is_bootloader: true,
                ..Self::default()
            });
        }
        if payload.len() < Self::MAGIC.len() || &payload[..3] != Self::MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        let body = &payload[3..];
        if body.len() < Self::BODY_SIZE {
            return Err(DecodeError::Truncated {
                actual: payload.len(),
            });
        }
        Ok(Self {
            version: Version::new(body[0], body[1], body[2]),
            grid_rows: body[3],
            grid_columns: body[4],
            pixel_width: LittleEndian::read_u16(&body[5..7]),
            pixel_height: LittleEndian::read_u16(&body[7..9]),
            tv_standard: TvStandard::from(body[9]),
            has_detected_camera: body[10] != 0,
            max_frame_size: LittleEndian::read_u16(&body[11..13]),
            context_stack_size: body[13],
            is_bootloader: false,
        })
    }
}

/// One font character read back from the device's non-volatile font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontCharMessage {
    pub addr: u16,
    pub data: [u8; FONT_CHAR_DATA_SIZE],
    pub metadata: [u8; FONT_CHAR_METADATA_SIZE],
}

impl FontCharMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != FONT_CHAR_PAYLOAD_SIZE {
            return Err(DecodeError::PayloadSize {
                expected: FONT_CHAR_PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }
        let mut data = [0u8; FONT_CHAR_DATA_SIZE];
        data.copy_from_slice(&payload[2..2 + FONT_CHAR_DATA_SIZE]);
        let mut metadata = [0u8; FONT_CHAR_METADATA_SIZE];
        metadata.copy_from_slice(&payload[2 + FONT_CHAR_DATA_SIZE..]);
        Ok(Self {
            addr: LittleEndian::read_u16(&payload[..2]),
            data,
            metadata,
        })
    }
}

/// Display settings stored by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsMessage {
    pub brightness: i8,
    pub horizontal_offset: i8,
    pub vertical_offset: i8,
}

impl SettingsMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 4 {
            return Err(DecodeError::PayloadSize {
                expected: 4,
                actual: payload.len(),
            });
        }
        if payload[0] != PROTOCOL_VERSION {
            return Err(DecodeError::SettingsVersion {
                expected: PROTOCOL_VERSION,
                actual: payload[0],
            });
        }
        Ok(Self {
            brightness: payload[1] as i8,
            horizontal_offset: payload[2] as i8,
            vertical_offset: payload[3] as i8,
        })
    }

    /// Wire payload for a set-settings command.
    pub fn encode(&self) -> [u8; 4] {
        [
            PROTOCOL_VERSION,
            self.brightness as u8,
            self.horizontal_offset as u8,
            self.vertical_offset as u8,
        ]
    }
}

/// Error response carrying the originating command and a signed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub command: u8,
    pub code: i8,
}

impl ErrorMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != 2 {
            return Err(DecodeError::PayloadSize {
                expected: 2,
                actual: payload.len(),
            });
        }
        Ok(Self {
            command: payload[0],
            code: payload[1] as i8,
        })
    }
}

/// Unrecognized OSD command with its verbatim payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub command: u16,
    pub payload: Vec<u8>,
}

/// Flight controller firmware identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcVariantMessage {
    pub variant: String,
}

impl FcVariantMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Truncated { actual: 0 });
        }
        // Skip the direction byte.
        Ok(Self {
            variant: String::from_utf8_lossy(&payload[1..]).into_owned(),
        })
    }
}

/// Flight controller firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcVersionMessage {
    pub version: Version,
}

impl FcVersionMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 4 {
            return Err(DecodeError::Truncated {
                actual: payload.len(),
            });
        }
        // Skip the direction byte.
        Ok(Self {
            version: Version::new(payload[1], payload[2], payload[3]),
        })
    }
}

/// Asynchronous human-readable diagnostic from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub message: String,
}

impl LogMessage {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 3 {
            return Err(DecodeError::Truncated {
                actual: payload.len(),
            });
        }
        // Skip direction and flag bytes and the trailing NUL.
        Ok(Self {
            message: String::from_utf8_lossy(&payload[2..payload.len() - 1]).into_owned(),
        })
    }
}

/// Opaque MSP message for commands we don't decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspRawMessage {
    pub command: u16,
    pub payload: Vec<u8>,
}

impl MspRawMessage {
    fn decode(command: u16, payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Truncated { actual: 0 });
        }
        // Skip the direction byte.
        Ok(Self {
            command,
            payload: payload[1..].to_vec(),
        })
    }
}

/// Closed set of messages the device can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Info(InfoMessage),
    FontChar(FontCharMessage),
    Settings(SettingsMessage),
    Error(ErrorMessage),
    Raw(RawMessage),
    FcVariant(FcVariantMessage),
    FcVersion(FcVersionMessage),
    Log(LogMessage),
    MspRaw(MspRawMessage),
}

impl Message {
    /// Decode a validated frame into its typed message.
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        match frame.dialect {
            Dialect::Osd => match OsdCommand::from_id(frame.command) {
                Some(OsdCommand::Error) => ErrorMessage::decode(&frame.payload).map(Self::Error),
                Some(OsdCommand::Info) => InfoMessage::decode(&frame.payload).map(Self::Info),
                Some(OsdCommand::ReadFont) => {
                    FontCharMessage::decode(&frame.payload).map(Self::FontChar)
                }
                Some(OsdCommand::GetSettings) | Some(OsdCommand::SetSettings) => {
                    SettingsMessage::decode(&frame.payload).map(Self::Settings)
                }
                _ => Ok(Self::Raw(RawMessage {
                    command: frame.command,
                    payload: frame.payload.clone(),
                })),
            },
            Dialect::Msp => match MspCommand::from_id(frame.command) {
                Some(MspCommand::FcVariant) => {
                    FcVariantMessage::decode(&frame.payload).map(Self::FcVariant)
                }
                Some(MspCommand::FcVersion) => {
                    FcVersionMessage::decode(&frame.payload).map(Self::FcVersion)
                }
                Some(MspCommand::Log) => LogMessage::decode(&frame.payload).map(Self::Log),
                _ => MspRawMessage::decode(frame.command, &frame.payload).map(Self::MspRaw),
            },
        }
    }

    /// Short human-readable name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::FontChar(_) => "font character",
            Self::Settings(_) => "settings",
            Self::Error(_) => "error",
            Self::Raw(_) => "raw",
            Self::FcVariant(_) => "FC variant",
            Self::FcVersion(_) => "FC version",
            Self::Log(_) => "log",
            Self::MspRaw(_) => "MSP raw",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Info(_)
            | Self::FontChar(_)
            | Self::Settings(_)
            | Self::Error(_)
            | Self::Raw(_) => Dialect::Osd,
            Self::FcVariant(_) | Self::FcVersion(_) | Self::Log(_) | Self::MspRaw(_) => {
                Dialect::Msp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osd_frame(command: u16, payload: &[u8]) -> Frame {
        Frame {
            dialect: Dialect::Osd,
            command,
            payload: payload.to_vec(),
        }
    }

    fn msp_frame(command: u16, payload: &[u8]) -> Frame {
        Frame {
            dialect: Dialect::Msp,
            command,
            payload: payload.to_vec(),
        }
    }

    fn info_payload(version: Version) -> Vec<u8> {
        let mut payload = b"AGH".to_vec();
        payload.extend_from_slice(&[version.major, version.minor, version.patch]);
        payload.extend_from_slice(&[16, 30]); // grid
        payload.extend_from_slice(&360u16.to_le_bytes());
        payload.extend_from_slice(&288u16.to_le_bytes());
        payload.push(2); // PAL
        payload.push(1); // camera detected
        payload.extend_from_slice(&64u16.to_le_bytes());
        payload.push(8); // context stack
        payload
    }

    #[test]
    fn test_info_bootloader_sentinel() {
        let msg = Message::decode(&osd_frame(1, b"B")).unwrap();
        match msg {
            Message::Info(info) => assert!(info.is_bootloader),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_info_structured() {
        let payload = info_payload(Version::new(1, 99, 0));
        let msg = Message::decode(&osd_frame(1, &payload)).unwrap();
        match msg {
            Message::Info(info) => {
                assert!(!info.is_bootloader);
                assert_eq!(info.version, Version::new(1, 99, 0));
                assert_eq!(info.version.display_name(), "2.0.0-beta.1");
                assert_eq!(info.grid_rows, 16);
                assert_eq!(info.grid_columns, 30);
                assert_eq!(info.pixel_width, 360);
                assert_eq!(info.pixel_height, 288);
                assert_eq!(info.tv_standard, TvStandard::Pal);
                assert!(info.has_detected_camera);
                assert_eq!(info.max_frame_size, 64);
                assert_eq!(info.context_stack_size, 8);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_info_bad_magic() {
        let err = Message::decode(&osd_frame(1, b"XYZ0123456789012345")).unwrap_err();
        assert_eq!(err, DecodeError::InvalidMagic);
        let err = Message::decode(&osd_frame(1, b"Q")).unwrap_err();
        assert_eq!(err, DecodeError::InvalidMagic);
    }

    #[test]
    fn test_settings_decode() {
        let msg = Message::decode(&osd_frame(9, &[2, 10, 0xFE, 3])).unwrap();
        match msg {
            Message::Settings(s) => {
                assert_eq!(s.brightness, 10);
                assert_eq!(s.horizontal_offset, -2);
                assert_eq!(s.vertical_offset, 3);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_settings_version_mismatch() {
        let err = Message::decode(&osd_frame(9, &[1, 10, 0, 3])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::SettingsVersion {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_settings_bad_length() {
        let err = Message::decode(&osd_frame(9, &[2, 10, 0])).unwrap_err();
        assert!(matches!(err, DecodeError::PayloadSize { expected: 4, .. }));
    }

    #[test]
    fn test_settings_encode_roundtrip() {
        let settings = SettingsMessage {
            brightness: -5,
            horizontal_offset: 2,
            vertical_offset: -1,
        };
        let payload = settings.encode();
        let msg = Message::decode(&osd_frame(10, &payload)).unwrap();
        assert_eq!(msg, Message::Settings(settings));
    }

    #[test]
    fn test_error_message() {
        let msg = Message::decode(&osd_frame(0, &[121, 0xFF])).unwrap();
        match msg {
            Message::Error(e) => {
                assert_eq!(e.command, 121);
                assert_eq!(e.code, -1);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_font_char_size_gate() {
        let err = Message::decode(&osd_frame(2, &[0u8; 65])).unwrap_err();
        assert!(matches!(err, DecodeError::PayloadSize { expected: 66, .. }));

        let mut payload = vec![0x34, 0x12];
        payload.extend_from_slice(&[0xAA; 54]);
        payload.extend_from_slice(&[0xBB; 10]);
        let msg = Message::decode(&osd_frame(2, &payload)).unwrap();
        match msg {
            Message::FontChar(fc) => {
                assert_eq!(fc.addr, 0x1234);
                assert_eq!(fc.data, [0xAA; 54]);
                assert_eq!(fc.metadata, [0xBB; 10]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_unknown_osd_command_is_raw() {
        let msg = Message::decode(&osd_frame(121, &[0, 0, 0, 0])).unwrap();
        match msg {
            Message::Raw(raw) => {
                assert_eq!(raw.command, 121);
                assert_eq!(raw.payload, vec![0, 0, 0, 0]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_msp_variants() {
        let msg = Message::decode(&msp_frame(2, b">BTFL")).unwrap();
        assert_eq!(
            msg,
            Message::FcVariant(FcVariantMessage {
                variant: "BTFL".into()
            })
        );

        let msg = Message::decode(&msp_frame(3, &[b'>', 4, 2, 0])).unwrap();
        assert_eq!(
            msg,
            Message::FcVersion(FcVersionMessage {
                version: Version::new(4, 2, 0)
            })
        );

        let msg = Message::decode(&msp_frame(253, b">\0ready\0")).unwrap();
        assert_eq!(
            msg,
            Message::Log(LogMessage {
                message: "ready".into()
            })
        );

        let msg = Message::decode(&msp_frame(245, &[b'>', 1])).unwrap();
        assert_eq!(
            msg,
            Message::MspRaw(MspRawMessage {
                command: 245,
                payload: vec![1]
            })
        );
    }
}
