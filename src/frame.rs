//! Reassembles non-blocking partial reads into complete protocol records.

use crate::{Error, Result};
use crate::transport::Transport;

/// Three digits and one comma per sample leaves ample headroom for a full
/// curve record.
pub const RECEIVE_CAPACITY: usize = 16384;

/// Bytes pulled per non-blocking read. Small on purpose: the terminator
/// check runs once per chunk, and a comma-terminated record should be
/// noticed as soon after the delimiter as possible.
const READ_CHUNK: usize = 8;

/// Which bytes end the record currently being awaited. Framing is
/// record-type-dependent: command responses end on a newline, while some
/// models' curve records are cut early at the first comma that lands at
/// the end of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Newline,
    CommaOrNewline,
}

impl Terminator {
    fn matches(self, byte: u8) -> bool {
        match self {
            Self::Newline => byte == b'\n',
            Self::CommaOrNewline => byte == b',' || byte == b'\n',
        }
    }
}

/// Bounded accumulation buffer with boundary detection. Never blocks:
/// `on_readable` consumes only what the transport already has, and the
/// capture loop calls it again on the next readiness notification.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    ready: bool,
}

impl FrameAssembler {
    pub fn new() -> FrameAssembler {
        FrameAssembler { buf: Vec::with_capacity(RECEIVE_CAPACITY), ready: false }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The completed record, with trailing CR/LF already stripped.
    /// Meaningful only once `on_readable` reported ready.
    pub fn record(&self) -> &[u8] {
        &self.buf
    }

    /// Drive accumulation from a readiness notification. Returns `true`
    /// once a complete record is buffered, `false` when the transport ran
    /// out of bytes first. Overflowing `RECEIVE_CAPACITY` without seeing a
    /// terminator is a fatal framing error.
    pub fn on_readable(&mut self, transport: &mut dyn Transport, terminator: Terminator)
            -> Result<bool> {
        debug_assert!(!self.ready, "record not taken before refill");
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let space = RECEIVE_CAPACITY - self.buf.len();
            if space == 0 {
                return Err(Error::FrameOverflow)
            }
            let len = transport.read_nonblocking(&mut chunk[..space.min(READ_CHUNK)])?;
            if len == 0 {
                return Ok(false)
            }
            self.buf.extend_from_slice(&chunk[..len]);
            if terminator.matches(self.buf[self.buf.len() - 1]) {
                self.strip_crlf();
                self.ready = true;
                log::trace!("received {:?}", String::from_utf8_lossy(&self.buf));
                return Ok(true)
            }
        }
    }

    fn strip_crlf(&mut self) {
        while let Some(&byte) = self.buf.last() {
            if byte == b'\r' || byte == b'\n' {
                self.buf.pop();
            } else {
                break
            }
        }
    }
}
