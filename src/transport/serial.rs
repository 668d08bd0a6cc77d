//! Raw serial line discipline, 9600/8n1 by default.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use crate::{Error, Result};
use super::Transport;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
const READ_TIMEOUT: Duration = Duration::from_millis(500);

impl From<serialport::Error> for Error {
    fn from(error: serialport::Error) -> Self {
        Error::Io(error.into())
    }
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "SerialTransport({:?})", self.port.name())
    }
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<SerialTransport> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()?;
        log::debug!("opened serial port {} at {} baud", path, baud_rate);
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn flush(&mut self) -> Result<()> {
        Ok(self.port.clear(ClearBuffer::All)?)
    }

    fn drain(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        let result = self.port.write_all(bytes);
        self.port.set_timeout(READ_TIMEOUT)?;
        match result {
            Ok(()) => Ok(bytes.len()),
            Err(error) if error.kind() == std::io::ErrorKind::TimedOut =>
                Err(Error::WriteTimeout),
            Err(error) => Err(error.into()),
        }
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(0)
        }
        let want = available.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(len) => Ok(len),
            Err(error) if error.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(error) => Err(error.into()),
        }
    }

    fn poll_readable(&mut self, timeout: Duration) -> Result<bool> {
        // serialport has no readiness API; emulate one by watching the
        // input queue depth.
        let deadline = Instant::now() + timeout;
        loop {
            if self.port.bytes_to_read()? > 0 {
                return Ok(true)
            }
            if Instant::now() >= deadline {
                return Ok(false)
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn close(&mut self) -> Result<()> {
        let _ = self.port.flush();
        Ok(())
    }
}
