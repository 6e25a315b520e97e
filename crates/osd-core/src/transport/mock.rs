//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use super::traits::{Transport, TransportError};

#[derive(Default)]
struct Shared {
    /// Bytes the device will "send"; drained by reads.
    incoming: VecDeque<u8>,
    /// Scripted replies; each host write consumes one entry.
    replies: VecDeque<Option<Vec<u8>>>,
    /// Everything the host wrote.
    written: Vec<u8>,
    closed: bool,
}

/// Transport backed by shared queues. Clones share the same state so
/// the reader task and the test observe a single device.
#[derive(Clone, Default)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the host to read.
    pub fn push_incoming(&self, bytes: &[u8]) {
        let mut shared = self.shared.lock().unwrap();
        shared.incoming.extend(bytes.iter().copied());
    }

    /// Script a reply that becomes readable once the host writes a
    /// command. Replies are consumed in order, one per write.
    pub fn push_reply(&self, bytes: &[u8]) {
        let mut shared = self.shared.lock().unwrap();
        shared.replies.push_back(Some(bytes.to_vec()));
    }

    /// Script a write that gets no reply at all.
    pub fn push_no_reply(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.replies.push_back(None);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().unwrap().written.clone()
    }

    /// Simulate the device going away; reads fail afterwards.
    pub fn close(&self) {
        self.shared.lock().unwrap().closed = true;
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        if shared.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock transport closed",
            ));
        }
        if shared.incoming.is_empty() {
            // Back off like a real serial read timeout would.
            drop(shared);
            std::thread::sleep(std::time::Duration::from_millis(1));
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no scripted data",
            ));
        }
        let n = buf.len().min(shared.incoming.len());
        for slot in buf.iter_mut().take(n) {
            *slot = shared.incoming.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        if shared.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock transport closed",
            ));
        }
        shared.written.extend_from_slice(buf);
        if let Some(reply) = shared.replies.pop_front() {
            if let Some(bytes) = reply {
                shared.incoming.extend(bytes.iter().copied());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(self.clone()))
    }
}
