//! Font sources and the font upload workflow.
//!
//! Fonts ship as MCM text files: a `MAX7456` header line followed by
//! one byte per line written as 8 ASCII bits, 64 bytes per character.

use std::io::{BufRead, BufReader, Read};

use crate::connection::Osd;
use crate::error::{OsdError, Result};
use crate::flash::Progress;
use crate::protocol::constants::FONT_CHAR_BYTES;

/// A decoded font: a fixed character count and per-character data of
/// one of the sizes accepted by the write-font command.
pub trait FontSource {
    fn char_count(&self) -> usize;
    fn char_data(&self, index: usize) -> &[u8];
}

/// Font parsed from an MCM file.
#[derive(Debug)]
pub struct McmFont {
    chars: Vec<[u8; FONT_CHAR_BYTES]>,
}

impl McmFont {
    const HEADER: &'static str = "MAX7456";

    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let mut lines = BufReader::new(reader).lines();
        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| OsdError::InvalidFontFile("empty file".into()))?;
        if header.trim_end() != Self::HEADER {
            return Err(OsdError::InvalidFontFile(format!(
                "bad header {:?}, expecting {:?}",
                header.trim_end(),
                Self::HEADER
            )));
        }

        let mut bytes = Vec::new();
        for line in lines {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.len() != 8 || !line.bytes().all(|b| b == b'0' || b == b'1') {
                return Err(OsdError::InvalidFontFile(format!(
                    "bad data line {line:?}"
                )));
            }
            // Unwrap is fine after the digit check above.
            bytes.push(u8::from_str_radix(line, 2).unwrap_or(0));
        }
        if bytes.is_empty() || bytes.len() % FONT_CHAR_BYTES != 0 {
            return Err(OsdError::InvalidFontFile(format!(
                "{} data bytes is not a multiple of {FONT_CHAR_BYTES}",
                bytes.len()
            )));
        }

        let chars = bytes
            .chunks_exact(FONT_CHAR_BYTES)
            .map(|chunk| {
                let mut char_bytes = [0u8; FONT_CHAR_BYTES];
                char_bytes.copy_from_slice(chunk);
                char_bytes
            })
            .collect();
        Ok(Self { chars })
    }
}

impl FontSource for McmFont {
    fn char_count(&self) -> usize {
        self.chars.len()
    }

    fn char_data(&self, index: usize) -> &[u8] {
        &self.chars[index]
    }
}

impl Osd {
    /// Replace the device font with `font`, writing every character
    /// by index and stopping at the first failure.
    pub fn upload_font(&mut self, font: &dyn FontSource, mut progress: Progress<'_>) -> Result<()> {
        let total = font.char_count();
        for index in 0..total {
            self.write_font_char(index as u16, font.char_data(index))?;
            if let Some(cb) = progress.as_mut() {
                cb(index + 1, total);
            }
        }
        Ok(())
    }
}
