//! Serial and TCP transports plus port discovery.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use tracing::debug;

use super::traits::{Transport, TransportError};

/// Prefix selecting a TCP tunnel instead of a serial device.
pub const TCP_PREFIX: &str = "tcp:";

const BAUD_RATE: u32 = 115_200;

/// Reads must return quickly so the reader task can observe shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Bluetooth audio devices that expose bogus serial ports on macOS.
const SKIP_PORT_PATTERNS: &[&str] = &["AirPod", "iPhone", "iPad"];

/// Open a transport for `target`.
///
/// Targets starting with `tcp:` (for example `tcp:localhost:5761`)
/// connect over TCP, anything else is opened as a serial port at
/// 115200 8N1.
pub fn open(target: &str) -> Result<Box<dyn Transport>, TransportError> {
    if let Some(addr) = target.strip_prefix(TCP_PREFIX) {
        debug!(addr, "connecting over TCP");
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::OpenFailed {
            target: target.to_string(),
            message: e.to_string(),
        })?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpTransport { stream }))
    } else {
        debug!(port = target, baud = BAUD_RATE, "opening serial port");
        let port = serialport::new(target, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                target: target.to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(SerialTransport { port }))
    }
}

/// List serial ports that plausibly have an OSD attached, plus any
/// extra TCP pseudo-ports the caller supplies.
pub fn discover(tcp_ports: &[String]) -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports()
        .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;

    let mut found = Vec::new();
    for info in ports {
        if SKIP_PORT_PATTERNS.iter().any(|p| info.port_name.contains(p)) {
            continue;
        }
        match info.port_type {
            SerialPortType::UsbPort(_) | SerialPortType::BluetoothPort | SerialPortType::Unknown => {
                found.push(info.port_name);
            }
            SerialPortType::PciPort => {}
        }
    }
    for addr in tcp_ports {
        found.push(format!("{TCP_PREFIX}{addr}"));
    }
    Ok(found)
}

struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| TransportError::CloneFailed(e.to_string()))?;
        Ok(Box::new(SerialTransport { port }))
    }
}

struct TcpTransport {
    stream: TcpStream,
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        let stream = self
            .stream
            .try_clone()
            .map_err(|e| TransportError::CloneFailed(e.to_string()))?;
        Ok(Box::new(TcpTransport { stream }))
    }
}
