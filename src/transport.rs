/*! Byte-duplex link contract, and two concrete implementations.

The core never assumes the transport is serial-specific; any
full-duplex byte stream meeting [`Transport`] drives a [`DutSession`](
crate::session::DutSession). [`LoopbackTransport`] is an in-memory fake
for tests and development without hardware; [`SerialTransport`], behind
the `serial` feature, is the real adapter for a 115200 8-N-1 link.
*/
use crate::error::{Error, Result};
use log::{debug, trace};

/// A byte-oriented full-duplex link to a device.
pub trait Transport {
    /// Write bytes without waiting for a response.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write `bytes`, then block until exactly `bytes.len()` response bytes
    /// have been read back. The device echoes one response byte-for-byte
    /// per request byte, so request and response lengths always match.
    fn write_and_read(&mut self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Discard any bytes currently buffered for reading.
    fn flush_input(&mut self) -> Result<()>;

    /// Whether the link is currently open.
    fn is_open(&self) -> bool;

    /// Open the link. A no-op if already open.
    fn open(&mut self) -> Result<()>;

    /// Close the link. A no-op if already closed.
    fn close(&mut self) -> Result<()>;
}

/// An in-memory [`Transport`] that echoes writes back, optionally after a
/// configurable number of stale leading frames — used to exercise the
/// pipeline-prefix handling in [`crate::chunker`] and [`crate::session`]
/// without real hardware.
///
/// On open, the echo buffer is pre-seeded with `pipeline_delay_bytes`
/// zero bytes so the first reads returned are the stale prefix a real
/// device would emit from its pre-DUT registers.
pub struct LoopbackTransport {
    open: bool,
    pipeline_delay_bytes: usize,
    pending: std::collections::VecDeque<u8>,
}

impl LoopbackTransport {
    /// Create a closed loopback transport with the given pipeline delay,
    /// in bytes (3 × frame count for a whole-frame delay).
    pub fn new(pipeline_delay_bytes: usize) -> Self {
        Self {
            open: false,
            pipeline_delay_bytes,
            pending: std::collections::VecDeque::new(),
        }
    }
}

impl Transport for LoopbackTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::Transport("write on closed loopback".into()));
        }
        self.pending.extend(bytes.iter().copied());
        Ok(())
    }

    fn write_and_read(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        if !self.open {
            return Err(Error::Transport("write_and_read on closed loopback".into()));
        }
        self.pending.extend(bytes.iter().copied());
        let out: Vec<u8> = (0..bytes.len())
            .map(|_| self.pending.pop_front().unwrap_or(0))
            .collect();
        trace!("loopback: wrote {} bytes, read {} bytes", bytes.len(), out.len());
        Ok(out)
    }

    fn flush_input(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<()> {
        if !self.open {
            self.pending = std::collections::VecDeque::from(vec![0u8; self.pipeline_delay_bytes]);
            self.open = true;
            debug!(
                "loopback transport opened with {} byte pipeline delay",
                self.pipeline_delay_bytes
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.pending.clear();
        Ok(())
    }
}

/// A real serial-port adapter, 115200 baud 8-N-1, no flow control.
#[cfg(feature = "serial")]
pub struct SerialTransport {
    path: String,
    timeout: std::time::Duration,
    port: Option<Box<dyn serialport::SerialPort>>,
}

#[cfg(feature = "serial")]
impl SerialTransport {
    /// Create an adapter for the serial device at `path`. The port isn't
    /// opened until [`Transport::open`] is called.
    pub fn new(path: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            port: None,
        }
    }
}

#[cfg(feature = "serial")]
impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| Error::Transport("write on closed serial port".into()))?;
        std::io::Write::write_all(port, bytes).map_err(|e| Error::Transport(e.to_string()))
    }

    fn write_and_read(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| Error::Transport("write_and_read on closed serial port".into()))?;
        std::io::Write::write_all(port, bytes).map_err(|e| Error::Transport(e.to_string()))?;
        let mut buf = vec![0u8; bytes.len()];
        std::io::Read::read_exact(port, &mut buf).map_err(|e| Error::Transport(e.to_string()))?;
        Ok(buf)
    }

    fn flush_input(&mut self) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| Error::Transport("flush on closed serial port".into()))?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.path, 115_200)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!("opened serial port {} at 115200 8-N-1", self.path);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.port = None;
        Ok(())
    }
}
