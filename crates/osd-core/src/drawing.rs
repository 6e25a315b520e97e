//! Drawing primitives.
//!
//! These are fire-and-forget: the device renders as commands arrive
//! and sends no acknowledgement. Wrap bursts of drawing in a
//! transaction so the device composes them into one frame.

use byteorder::{ByteOrder, LittleEndian};

use crate::connection::Osd;
use crate::error::{OsdError, Result};
use crate::protocol::OsdCommand;

/// Drawing color. The device renders over live video, so transparent
/// is a first-class color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Transparent = 1,
    White = 2,
    Gray = 3,
}

const COORD_MIN: i32 = -(1 << 12);
const COORD_MAX: i32 = (1 << 12) - 1;

/// Pack two signed 12-bit coordinates into 3 little-endian bytes.
fn pack2int12(x: i32, y: i32) -> Result<[u8; 3]> {
    for v in [x, y] {
        if !(COORD_MIN..=COORD_MAX).contains(&v) {
            return Err(OsdError::PointOutOfRange(v));
        }
    }
    let packed = ((y as u32 & 0xFFF) << 12) | (x as u32 & 0xFFF);
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, packed);
    Ok([buf[0], buf[1], buf[2]])
}

impl Osd {
    pub fn transaction_begin(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::TransactionBegin, &[])
    }

    pub fn transaction_commit(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::TransactionCommit, &[])
    }

    /// Begin a transaction that also resets the drawing context, so
    /// the commands inside start from a known state.
    pub fn transaction_begin_resetting_drawing(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::TransactionBeginResetDrawing, &[])
    }

    pub fn set_stroke_color(&mut self, color: Color) -> Result<()> {
        self.send_osd(OsdCommand::SetStrokeColor, &[color as u8])
    }

    pub fn set_fill_color(&mut self, color: Color) -> Result<()> {
        self.send_osd(OsdCommand::SetFillColor, &[color as u8])
    }

    pub fn clear_screen(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::ClearScreen, &[])
    }

    pub fn reset_drawing(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::DrawingReset, &[])
    }

    pub fn move_to_point(&mut self, x: i32, y: i32) -> Result<()> {
        let data = pack2int12(x, y)?;
        self.send_osd(OsdCommand::MoveToPoint, &data)
    }

    pub fn stroke_line_to_point(&mut self, x: i32, y: i32) -> Result<()> {
        let data = pack2int12(x, y)?;
        self.send_osd(OsdCommand::StrokeLineToPoint, &data)
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        let origin = pack2int12(x, y)?;
        let size = pack2int12(width as i32, height as i32)?;
        let mut data = [0u8; 6];
        data[..3].copy_from_slice(&origin);
        data[3..].copy_from_slice(&size);
        self.send_osd(OsdCommand::FillRect, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_pack2int12_layout() {
        // x in the low 12 bits, y in the next 12, little-endian.
        assert_eq!(pack2int12(1, 0).unwrap(), [0x01, 0x00, 0x00]);
        assert_eq!(pack2int12(0, 1).unwrap(), [0x00, 0x10, 0x00]);
        assert_eq!(pack2int12(0x123, 0x456).unwrap(), [0x23, 0x61, 0x45]);
    }

    #[test]
    fn test_pack2int12_negative() {
        // Negative values are truncated to 12 bits without bleeding
        // into the neighboring field.
        assert_eq!(pack2int12(-1, 0).unwrap(), [0xFF, 0x0F, 0x00]);
        assert_eq!(pack2int12(0, -1).unwrap(), [0x00, 0xF0, 0xFF]);
    }

    #[test]
    fn test_pack2int12_bounds() {
        assert!(pack2int12(COORD_MAX, COORD_MIN).is_ok());
        assert!(matches!(
            pack2int12(COORD_MAX + 1, 0),
            Err(OsdError::PointOutOfRange(_))
        ));
        assert!(matches!(
            pack2int12(0, COORD_MIN - 1),
            Err(OsdError::PointOutOfRange(_))
        ));
    }

    #[test]
    fn test_fill_rect_payload() {
        let mock = MockTransport::new();
        let mut osd = Osd::from_transport(Box::new(mock.clone())).unwrap();
        osd.fill_rect(10, 20, 30, 40).unwrap();

        let mut payload = pack2int12(10, 20).unwrap().to_vec();
        payload.extend_from_slice(&pack2int12(30, 40).unwrap());
        assert_eq!(
            mock.written(),
            encoder::encode_osd(OsdCommand::FillRect.id(), &payload)
        );
    }

    #[test]
    fn test_transaction_commands_are_empty() {
        let mock = MockTransport::new();
        let mut osd = Osd::from_transport(Box::new(mock.clone())).unwrap();
        osd.transaction_begin_resetting_drawing().unwrap();
        osd.set_fill_color(Color::Gray).unwrap();
        osd.transaction_commit().unwrap();

        let mut expected = encoder::encode_osd(OsdCommand::TransactionBeginResetDrawing.id(), &[]);
        expected.extend(encoder::encode_osd(OsdCommand::SetFillColor.id(), &[3]));
        expected.extend(encoder::encode_osd(OsdCommand::TransactionCommit.id(), &[]));
        assert_eq!(mock.written(), expected);
    }
}
