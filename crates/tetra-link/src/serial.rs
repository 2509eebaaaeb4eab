use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::Transport;

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    dev: String,
    baud: u32,
}

impl SerialTransport {
    pub fn open(dev: &str, baud: u32) -> Result<Self> {
        // Short read timeout: poll_read checks bytes_to_read first, so this only
        // bounds the rare race where the count drops between the two calls.
        let port = tokio_serial::new(dev, baud)
            .timeout(Duration::from_millis(1))
            .open()
            .with_context(|| format!("open camera serial device {} @ {}", dev, baud))?;

        debug!("link: opened {} @ {}", dev, baud);
        Ok(Self { port, dev: dev.to_string(), baud })
    }

    pub fn dev(&self) -> &str {
        &self.dev
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
