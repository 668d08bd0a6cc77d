//! Scripted in-memory transport.
//!
//! Stands in for an instrument in tests, and doubles as the command/response
//! flavor: `operation_complete` is a real (counted) gate here, unlike on a
//! raw serial line.

use std::collections::VecDeque;
use std::time::Duration;

use crate::{Error, Result};
use super::Transport;

#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    sent: Vec<String>,
    replies: VecDeque<(String, Vec<u8>)>,
    read_chunk: usize,
    opc_polls: usize,
    flushes: usize,
    fail_writes: bool,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport { read_chunk: usize::MAX, ..Default::default() }
    }

    /// Queue `response` to be delivered once the engine sends `command`
    /// (compared without the trailing newline). Replies trigger in order.
    pub fn reply(&mut self, command: &str, response: &[u8]) {
        self.replies.push_back((command.to_owned(), response.to_vec()));
    }

    /// Make bytes available to read without requiring a command first.
    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Cap how many bytes a single `read_nonblocking` call returns.
    /// Lets tests exercise arbitrarily fragmented arrival.
    pub fn set_read_chunk(&mut self, read_chunk: usize) {
        self.read_chunk = read_chunk;
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    /// Every command line written so far, newline stripped.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn opc_polls(&self) -> usize {
        self.opc_polls
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for MockTransport {
    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        self.rx.clear();
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
        if self.fail_writes {
            return Err(Error::WriteTimeout)
        }
        let line = String::from_utf8_lossy(bytes)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        if let Some((expected, _)) = self.replies.front() {
            if *expected == line {
                let (_, response) = self.replies.pop_front().unwrap();
                self.rx.extend(response);
            }
        }
        self.sent.push(line);
        Ok(bytes.len())
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let want = buf.len().min(self.read_chunk).min(self.rx.len());
        for slot in buf[..want].iter_mut() {
            *slot = self.rx.pop_front().unwrap();
        }
        Ok(want)
    }

    fn poll_readable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.rx.is_empty())
    }

    fn operation_complete(&mut self) -> Result<()> {
        self.opc_polls += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scripted_reply() {
        let mut mock = MockTransport::new();
        mock.reply("*IDN?", b"TEKTRONIX,TDS 220,0,CF:91.1CT\n");
        assert_eq!(mock.write(b"*IDN?\n", Duration::from_millis(1)).unwrap(), 6);
        assert_eq!(mock.sent(), &["*IDN?".to_owned()]);
        let mut buf = [0; 64];
        let len = mock.read_nonblocking(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"TEKTRONIX,TDS 220,0,CF:91.1CT\n");
    }

    #[test]
    fn test_chunked_reads() {
        let mut mock = MockTransport::new();
        mock.set_read_chunk(1);
        mock.push(b"abc");
        let mut buf = [0; 64];
        assert_eq!(mock.read_nonblocking(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'a');
        assert_eq!(mock.read_nonblocking(&mut buf).unwrap(), 1);
        assert_eq!(mock.read_nonblocking(&mut buf).unwrap(), 1);
        assert_eq!(mock.read_nonblocking(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_flush_discards() {
        let mut mock = MockTransport::new();
        mock.push(b"stale");
        mock.flush().unwrap();
        assert_eq!(mock.pending(), 0);
        assert_eq!(mock.flushes(), 1);
    }
}
