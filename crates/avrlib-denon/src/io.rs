//! Byte-wise command writer and idle-gap line reader.
//!
//! The receiver's UART is slow and unbuffered on older units, so commands
//! are written one byte at a time with a flush after each byte. Each byte
//! write is bounded by the write timeout; a stall surfaces as
//! [`Error::WriteTimeout`].
//!
//! Responses are read with [`LineReader`], which yields trimmed lines until
//! the link stays idle for the read timeout or a blank line arrives. A
//! device that pauses mid-burst for longer than the timeout truncates its
//! own response; callers reconcile through the next full refresh.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Transport;

use crate::protocol::{self, DecodeResult};

/// Default per-line read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default per-byte write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest unterminated line kept before the buffer is reset.
/// Real lines are under 20 bytes.
const MAX_LINE: usize = 4096;

/// Write `command` plus its carriage return, one byte per `send()`.
pub async fn write_command(
    transport: &mut dyn Transport,
    command: &str,
    write_timeout: Duration,
) -> Result<()> {
    let bytes = protocol::encode_command(command);
    for (index, byte) in bytes.iter().enumerate() {
        match tokio::time::timeout(write_timeout, transport.send(std::slice::from_ref(byte))).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    command = %command,
                    written = index,
                    timeout_ms = write_timeout.as_millis(),
                    "write stalled"
                );
                return Err(Error::WriteTimeout);
            }
        }
    }
    trace!(command = %command, "command written");
    Ok(())
}

/// Lazily reads response lines until the idle gap.
pub struct LineReader<'a> {
    transport: &'a mut dyn Transport,
    read_timeout: Duration,
    buf: Vec<u8>,
    /// The previous line ended in `\r`; a leading `\n` belongs to it.
    skip_newline: bool,
    finished: bool,
}

impl<'a> LineReader<'a> {
    /// Create a reader over `transport` with a per-line read timeout.
    pub fn new(transport: &'a mut dyn Transport, read_timeout: Duration) -> Self {
        LineReader {
            transport,
            read_timeout,
            buf: Vec::new(),
            skip_newline: false,
            finished: false,
        }
    }

    /// Return the next response line, or `None` once the response is over.
    ///
    /// The response is over when no complete line arrives within the read
    /// timeout, when the transport reports end of stream, or when a blank
    /// line is received. Bytes left without a terminator at that point are
    /// returned as a final line.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            if self.skip_newline && !self.buf.is_empty() {
                if self.buf[0] == b'\n' {
                    self.buf.drain(..1);
                }
                self.skip_newline = false;
            }

            if let DecodeResult::Line {
                text,
                consumed,
                terminator,
            } = protocol::decode_line(&self.buf)
            {
                self.buf.drain(..consumed);
                self.skip_newline = terminator == b'\r';
                if text.is_empty() {
                    debug!("blank line ends response");
                    self.finished = true;
                    return Ok(None);
                }
                debug!(line = %text, "received line");
                return Ok(Some(text));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(self.finish());
            }

            let mut chunk = [0u8; 256];
            match self.transport.receive(&mut chunk, remaining).await {
                Ok(0) => return Ok(self.finish()),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    if self.buf.len() > MAX_LINE {
                        warn!(len = self.buf.len(), "line buffer overflow, resetting");
                        self.buf.clear();
                    }
                }
                Err(Error::Timeout) => return Ok(self.finish()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Read every remaining line of the response.
    pub async fn read_all(mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// End the response, salvaging an unterminated trailing line.
    fn finish(&mut self) -> Option<String> {
        self.finished = true;
        let text = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if text.is_empty() {
            None
        } else {
            debug!(line = %text, "received unterminated line");
            Some(text)
        }
    }
}
