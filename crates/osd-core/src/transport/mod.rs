//! Byte-stream transports to the device.

pub mod mock;
pub mod serial;
pub mod traits;

pub use mock::MockTransport;
pub use serial::{discover, open, TCP_PREFIX};
pub use traits::{Transport, TransportError};
