//! Byte-stream transports the acquisition engine is written against.

use std::time::Duration;

use bitflags::bitflags;

use crate::Result;

bitflags! {
    /// Event set delivered to the engine's event entry point by whoever
    /// drives the transport (an event loop, or `Device::run_to_completion`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Readiness: u32 {
        const READABLE = 1<<0;
        const ERROR    = 1<<1;
    }
}

/// A byte-oriented duplex channel to the instrument.
///
/// The engine only ever performs non-blocking reads; data arrival is
/// signaled externally, by polling `poll_readable` and handing the result
/// to `Device::on_transport_event`. Writes are blocking with a bounded
/// timeout, and a timed-out write is fatal to the run: a stuck write means
/// the transport is wedged, not congested.
pub trait Transport {
    /// Discard bytes buffered in either direction.
    fn flush(&mut self) -> Result<()>;

    /// Wait until all queued output has actually been transmitted.
    fn drain(&mut self) -> Result<()>;

    /// Write `bytes`, waiting at most `timeout`. Returns the number of
    /// bytes written; writing less than `bytes.len()` is reported as
    /// `Error::WriteTimeout` by the caller.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize>;

    /// Read whatever is available right now, up to `buf.len()` bytes.
    /// Returns 0 when nothing is pending; never blocks.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Block until data may be available to read, or `timeout` elapses.
    /// This is the readiness-notification source for the capture loop.
    fn poll_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Wait for the instrument to finish processing the previous command.
    ///
    /// Command/response transports poll the instrument's operation-complete
    /// status here; a plain serial line discipline has no such facility and
    /// uses the default no-op.
    fn operation_complete(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()>;
}

pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;
