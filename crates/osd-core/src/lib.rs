//! OSD-Core: host-side client for the FrSky PixelOSD protocol.
//!
//! This crate drives an on-screen-display microcontroller over a
//! serial link (or a TCP-tunneled one), speaking the compact binary
//! command/response protocol the device uses.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, checksums, frame decoder and encoder
//! - **Message**: Typed messages decoded from validated frames
//! - **Transport**: Serial/TCP byte stream abstraction (plus a mock)
//! - **Connection**: Background pipeline and synchronous operations
//! - **Workflows**: Firmware flashing, font upload, MSP passthrough
//! - **Drawing**: Fire-and-forget drawing primitives
//!
//! # Example
//!
//! ```no_run
//! use osd_core::Osd;
//!
//! let mut osd = Osd::open("/dev/ttyUSB0").expect("open failed");
//! let info = osd.info().expect("info query failed");
//! println!("firmware {}", info.version.display_name());
//! ```

pub mod config;
pub mod connection;
pub mod drawing;
pub mod error;
pub mod flash;
pub mod font;
pub mod message;
pub mod msp;
pub mod protocol;
pub mod transport;
pub mod version;

// Re-exports for convenience
pub use config::ToolConfig;
pub use connection::Osd;
pub use drawing::Color;
pub use error::{OsdError, Result};
pub use flash::Progress;
pub use font::{FontSource, McmFont};
pub use message::{InfoMessage, Message, SettingsMessage, TvStandard};
pub use transport::{MockTransport, Transport, TransportError};
pub use version::Version;
