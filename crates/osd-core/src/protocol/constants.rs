//! Wire protocol constants for the OSD command set.

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Every frame starts with this sync byte.
pub const SYNC: u8 = b'$';

/// Second sync byte selecting the OSD-native dialect (CRC8 checksum).
pub const SYNC_OSD: u8 = b'A';
/// Second sync byte selecting MSP v1 (XOR checksum).
pub const SYNC_MSP_V1: u8 = b'M';
/// Second sync byte selecting MSP v2 (CRC8 checksum).
pub const SYNC_MSP_V2: u8 = b'X';

/// MSP direction markers. Requests from the host use `<`, replies use
/// `>` and errors use `!`.
pub const MSP_DIR_REQUEST: u8 = b'<';
pub const MSP_DIR_RESPONSE: u8 = b'>';
pub const MSP_DIR_ERROR: u8 = b'!';

/// Version byte sent with info/settings queries.
pub const PROTOCOL_VERSION: u8 = 2;

// ============================================================================
// OSD command set
// ============================================================================

/// OSD-dialect command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsdCommand {
    Error = 0,
    Info = 1,
    ReadFont = 2,
    WriteFont = 3,
    GetSettings = 9,
    SetSettings = 10,
    SaveSettings = 11,
    TransactionBegin = 16,
    TransactionCommit = 17,
    TransactionBeginResetDrawing = 19,
    SetStrokeColor = 22,
    SetFillColor = 23,
    ClearScreen = 41,
    DrawingReset = 43,
    MoveToPoint = 50,
    StrokeLineToPoint = 51,
    FillRect = 56,
    Reboot = 120,
    WriteFlash = 121,
}

impl OsdCommand {
    /// Wire identifier for this command.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Reverse lookup used by the message dispatcher.
    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            0 => Self::Error,
            1 => Self::Info,
            2 => Self::ReadFont,
            3 => Self::WriteFont,
            9 => Self::GetSettings,
            10 => Self::SetSettings,
            11 => Self::SaveSettings,
            16 => Self::TransactionBegin,
            17 => Self::TransactionCommit,
            19 => Self::TransactionBeginResetDrawing,
            22 => Self::SetStrokeColor,
            23 => Self::SetFillColor,
            41 => Self::ClearScreen,
            43 => Self::DrawingReset,
            50 => Self::MoveToPoint,
            51 => Self::StrokeLineToPoint,
            56 => Self::FillRect,
            120 => Self::Reboot,
            121 => Self::WriteFlash,
            _ => return None,
        })
    }
}

// ============================================================================
// MSP command set
// ============================================================================

/// MSP-dialect command identifiers the client understands. Everything
/// else decodes to an opaque payload-carrying fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MspCommand {
    FcVariant = 2,
    FcVersion = 3,
    SetPassthrough = 245,
    Log = 253,
}

impl MspCommand {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            2 => Self::FcVariant,
            3 => Self::FcVersion,
            245 => Self::SetPassthrough,
            253 => Self::Log,
            _ => return None,
        })
    }
}

/// Argument to SetPassthrough selecting a serial port by function id.
pub const MSP_PASSTHROUGH_SERIAL_BY_FUNCTION_ID: u8 = 0xFE;

// ============================================================================
// Flashing
// ============================================================================

/// Maximum data bytes per write-flash command.
pub const FLASH_WRITE_MAX_SIZE: usize = 64;

/// Sentinel address signalling end-of-image.
pub const FLASH_WRITE_END: u32 = u32::MAX;

// ============================================================================
// Font
// ============================================================================

/// Visible glyph bitmap bytes per character.
pub const FONT_CHAR_DATA_SIZE: usize = 54;
/// Metadata bytes stored after the bitmap.
pub const FONT_CHAR_METADATA_SIZE: usize = 10;
/// Total bytes per character in a font file.
pub const FONT_CHAR_BYTES: usize = 64;
/// Payload size of a read-font response: 2-byte address + data + metadata.
pub const FONT_CHAR_PAYLOAD_SIZE: usize = 66;

// ============================================================================
// Timing and queue bounds
// ============================================================================

/// Idle timeout while waiting for a response frame.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Settle delay after asking the device to reboot.
pub const REBOOT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Bound of the raw byte queue between reader and decoder.
pub const BYTE_QUEUE_DEPTH: usize = 512;

/// Bound of the decoded frame queue.
pub const FRAME_QUEUE_DEPTH: usize = 8;
