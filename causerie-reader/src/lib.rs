//! Asynchronous CRLF line reading.
//!
//! [`LineReader`] wraps a byte stream and yields complete lines, one at a
//! time.  A line ends at the first CRLF; split writes, a CR and LF arriving
//! in different reads, and several lines landing in one read are all
//! handled.  Overlong and non-UTF-8 lines are reported as errors, on which
//! the caller is expected to drop the connection.

use memchr::memchr;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest accepted line, in bytes, excluding the CRLF terminator.
pub const MAX_LINE_LENGTH: usize = 65_535;

/// Buffered reader that splits a byte stream on CRLF.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Offset up to which `buf` has already been scanned for a terminator.
    scanned: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> LineReader<R> {
        LineReader {
            inner,
            buf: Vec::with_capacity(1024),
            scanned: 0,
        }
    }

    /// Reads the next line, without its terminator.
    ///
    /// Returns `Ok(None)` on a clean end of stream; any bytes of a partial
    /// line are discarded.  This method is cancel safe: a dropped call
    /// leaves the buffered bytes in place.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            while let Some(offset) = memchr(b'\n', &self.buf[self.scanned..]) {
                let newline = self.scanned + offset;
                if newline > 0 && self.buf[newline - 1] == b'\r' {
                    return self.take_line(newline).map(Some);
                }
                // lone LF, keep looking for an actual CRLF
                self.scanned = newline + 1;
            }
            self.scanned = self.buf.len();

            let pending = self.buf.len() - if self.buf.ends_with(b"\r") { 1 } else { 0 };
            if pending > MAX_LINE_LENGTH {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return Ok(None);
            }
        }
    }

    fn take_line(&mut self, newline: usize) -> io::Result<String> {
        let line_len = newline - 1;
        if line_len > MAX_LINE_LENGTH {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
        }
        let line = match std::str::from_utf8(&self.buf[..line_len]) {
            Ok(line) => line.to_owned(),
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line is not valid UTF-8",
                ))
            }
        };
        self.buf.drain(..=newline);
        self.scanned = 0;
        Ok(line)
    }
}
