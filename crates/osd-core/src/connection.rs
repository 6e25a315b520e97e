//! Connection lifecycle and the request/response correlator.
//!
//! Opening a connection starts two background threads: a reader that
//! drains the transport into a bounded byte queue and a decoder that
//! turns those bytes into frames. Public operations run on the
//! caller's thread, write synchronously and block on the frame queue
//! with a fixed timeout. The protocol is single-outstanding-request;
//! callers must serialize their own calls.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info, trace};

use crate::error::{OsdError, Result};
use crate::message::{FontCharMessage, InfoMessage, Message, SettingsMessage};
use crate::msp;
use crate::protocol::constants::{
    BYTE_QUEUE_DEPTH, FONT_CHAR_BYTES, FONT_CHAR_DATA_SIZE, FRAME_QUEUE_DEPTH,
    REBOOT_SETTLE_DELAY, RESPONSE_TIMEOUT,
};
use crate::protocol::{encoder, Frame, FrameDecoder, MspCommand, OsdCommand, PROTOCOL_VERSION};
use crate::transport::{self, Transport};

/// A live connection to the device.
pub struct Osd {
    transport: Box<dyn Transport>,
    frames: Option<Receiver<Frame>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    decoder: Option<JoinHandle<()>>,
    response_timeout: Duration,
    settle_delay: Duration,
}

impl Osd {
    /// Open a connection to `target` (serial port name or `tcp:` address).
    pub fn open(target: &str) -> Result<Self> {
        let transport = transport::open(target)?;
        Self::from_transport(transport)
    }

    /// Build a connection over an already-open transport.
    pub fn from_transport(transport: Box<dyn Transport>) -> Result<Self> {
        let read_side = transport.try_clone()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let (byte_tx, byte_rx) = mpsc::sync_channel::<u8>(BYTE_QUEUE_DEPTH);
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(FRAME_QUEUE_DEPTH);

        let reader_shutdown = Arc::clone(&shutdown);
        let reader = std::thread::Builder::new()
            .name("osd-reader".into())
            .spawn(move || reader_loop(read_side, byte_tx, reader_shutdown))?;
        let decoder = std::thread::Builder::new()
            .name("osd-decoder".into())
            .spawn(move || decoder_loop(byte_rx, frame_tx))?;

        Ok(Self {
            transport,
            frames: Some(frame_rx),
            shutdown,
            reader: Some(reader),
            decoder: Some(decoder),
            response_timeout: RESPONSE_TIMEOUT,
            settle_delay: REBOOT_SETTLE_DELAY,
        })
    }

    /// Override the per-response idle timeout. Useful on slow links
    /// and in tests.
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    /// Override the post-reboot settle delay. Useful in tests.
    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.settle_delay = delay;
    }

    pub(crate) fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub(crate) fn send_osd(&mut self, command: OsdCommand, payload: &[u8]) -> Result<()> {
        debug!(command = command.id(), len = payload.len(), "sending");
        let bytes = encoder::encode_osd(command.id(), payload);
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;
        Ok(())
    }

    pub(crate) fn send_msp(&mut self, command: MspCommand, payload: &[u8]) -> Result<()> {
        debug!(command = command.id(), len = payload.len(), "sending MSP");
        let bytes = encoder::encode_msp(command.id(), payload);
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;
        Ok(())
    }

    /// Wait for the next decoded message.
    ///
    /// Log notifications never satisfy the wait; they are reported
    /// through tracing and the loop keeps listening.
    pub(crate) fn await_response(&mut self) -> Result<Message> {
        let frames = self.frames.as_ref().ok_or(OsdError::ConnectionClosed)?;
        loop {
            let frame = match frames.recv_timeout(self.response_timeout) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => return Err(OsdError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(OsdError::ConnectionClosed),
            };
            trace!(?frame, "received frame");
            let msg = Message::decode(&frame).map_err(|source| OsdError::Decode {
                command: frame.command,
                source,
            })?;
            if let Message::Log(log) = msg {
                info!(message = %log.message, "device log");
                continue;
            }
            return Ok(msg);
        }
    }

    /// Like [`Self::await_response`], but device error responses
    /// become failures.
    pub(crate) fn await_ok_response(&mut self) -> Result<Message> {
        match self.await_response()? {
            Message::Error(e) => Err(OsdError::Device {
                command: e.command,
                code: e.code,
            }),
            msg => Ok(msg),
        }
    }

    /// Query device hardware and configuration information.
    ///
    /// If the first attempt times out, the device may be reachable
    /// only through a flight controller; passthrough is negotiated
    /// and the query retried exactly once.
    pub fn info(&mut self) -> Result<InfoMessage> {
        self.info_inner(true)
    }

    pub(crate) fn info_inner(&mut self, try_msp_passthrough: bool) -> Result<InfoMessage> {
        self.send_osd(OsdCommand::Info, &[PROTOCOL_VERSION])?;
        match self.await_ok_response() {
            Ok(Message::Info(info)) => Ok(info),
            Ok(other) => Err(OsdError::UnexpectedMessage {
                expected: "info",
                got: other.name(),
            }),
            Err(OsdError::Timeout) if try_msp_passthrough => {
                debug!("info query timed out, trying MSP passthrough");
                msp::setup_passthrough(self)?;
                self.info_inner(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Read the display settings.
    pub fn read_settings(&mut self) -> Result<SettingsMessage> {
        self.send_osd(OsdCommand::GetSettings, &[PROTOCOL_VERSION])?;
        match self.await_ok_response()? {
            Message::Settings(settings) => Ok(settings),
            other => Err(OsdError::UnexpectedMessage {
                expected: "settings",
                got: other.name(),
            }),
        }
    }

    /// Update the settings in volatile memory. The device answers
    /// with the values it actually accepted.
    pub fn set_settings(&mut self, settings: &SettingsMessage) -> Result<SettingsMessage> {
        self.send_osd(OsdCommand::SetSettings, &settings.encode())?;
        match self.await_ok_response()? {
            Message::Settings(settings) => Ok(settings),
            other => Err(OsdError::UnexpectedMessage {
                expected: "settings",
                got: other.name(),
            }),
        }
    }

    /// Commit the current settings to non-volatile memory.
    pub fn save_settings(&mut self) -> Result<()> {
        self.send_osd(OsdCommand::SaveSettings, &[])?;
        self.await_ok_response()?;
        Ok(())
    }

    /// Read one character from the non-volatile font.
    pub fn read_font_char(&mut self, index: u16) -> Result<FontCharMessage> {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, index);
        self.send_osd(OsdCommand::ReadFont, &buf)?;
        match self.await_ok_response()? {
            Message::FontChar(chr) => Ok(chr),
            other => Err(OsdError::UnexpectedMessage {
                expected: "font character",
                got: other.name(),
            }),
        }
    }

    /// Write one font character. `data` is either the 54 visible
    /// bitmap bytes alone or the full 64 bytes including metadata.
    pub fn write_font_char(&mut self, index: u16, data: &[u8]) -> Result<()> {
        if data.len() != FONT_CHAR_DATA_SIZE && data.len() != FONT_CHAR_BYTES {
            return Err(OsdError::InvalidFontCharSize { actual: data.len() });
        }
        let mut payload = Vec::with_capacity(2 + data.len());
        payload.extend_from_slice(&index.to_le_bytes());
        payload.extend_from_slice(data);
        self.send_osd(OsdCommand::WriteFont, &payload)?;
        self.await_ok_response()?;
        Ok(())
    }

    /// Ask the device to reboot. No response is expected.
    pub fn reboot(&mut self, to_bootloader: bool) -> Result<()> {
        self.send_osd(OsdCommand::Reboot, &[u8::from(to_bootloader)])
    }

    /// Shut down the background threads. Called automatically on drop.
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Dropping the frame receiver unblocks a decoder stuck on a
        // full frame queue; its exit drops the byte receiver, which
        // unblocks the reader the same way. Only then is joining safe.
        self.frames.take();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if let Some(decoder) = self.decoder.take() {
            let _ = decoder.join();
        }
    }
}

impl Drop for Osd {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pull bytes off the transport into the bounded queue until shutdown
/// or a read error. Closing the queue cascades into the decoder task.
fn reader_loop(mut transport: Box<dyn Transport>, bytes: SyncSender<u8>, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; 64];
    while !shutdown.load(Ordering::Relaxed) {
        match transport.read(&mut buf) {
            Ok(0) => {
                debug!("transport end of stream");
                break;
            }
            Ok(n) => {
                for &b in &buf[..n] {
                    if bytes.send(b).is_err() {
                        return;
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                debug!("transport read failed: {e}");
                break;
            }
        }
    }
}

/// Run the frame state machine over the byte queue until it closes.
fn decoder_loop(bytes: Receiver<u8>, frames: SyncSender<Frame>) {
    let mut decoder = FrameDecoder::new();
    while let Ok(b) = bytes.recv() {
        if let Some(frame) = decoder.feed(b) {
            if frames.send(frame).is_err() {
                return;
            }
        }
    }
}
