//! Denon serial text-protocol framing.
//!
//! Commands are plain ASCII terminated by a carriage return. Responses are
//! ASCII lines terminated by `\n` or `\r\n` (many units send a bare `\r`),
//! and nothing marks the end of a multi-line response: the driver stops
//! reading when the line stays idle for the read timeout.
//!
//! # Command format
//!
//! ```text
//! <prefix><parameter>\r
//! ```
//!
//! - `prefix`: two characters naming the command family (`PW`, `MV`, `MU`,
//!   `SI`, `MS`) or a zone identifier (`Z2`, `Z3`, `Z1`).
//! - `parameter`: `?` for a status query, otherwise the value to set.

use bytes::{BufMut, BytesMut};

/// Terminator appended to every command.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Suffix that turns a command prefix into a status query.
pub const QUERY_SUFFIX: char = '?';

/// Result of attempting to decode one response line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete line was decoded.
    Line {
        /// Line text with surrounding whitespace trimmed. May be empty.
        text: String,
        /// Number of bytes consumed from the input buffer, terminator included.
        consumed: usize,
        /// The terminator byte that ended the line (`\r` or `\n`).
        terminator: u8,
    },

    /// The buffer does not yet contain a complete line.
    Incomplete,
}

/// Encode a command into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use avrlib_denon::protocol::encode_command;
///
/// assert_eq!(encode_command("PW?"), b"PW?\r");
/// assert_eq!(encode_command("MV45"), b"MV45\r");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + 1);
    buf.put_slice(command.as_bytes());
    buf.put_u8(COMMAND_TERMINATOR);
    buf.to_vec()
}

/// Attempt to decode one line from a byte buffer.
///
/// Either `\r` or `\n` ends a line. Invalid UTF-8 is replaced rather than
/// rejected so that one garbled line cannot wedge the reader.
///
/// # Example
///
/// ```
/// use avrlib_denon::protocol::{decode_line, DecodeResult};
///
/// match decode_line(b"MV45\r\nMVMAX 80\r\n") {
///     DecodeResult::Line { text, consumed, .. } => {
///         assert_eq!(text, "MV45");
///         assert_eq!(consumed, 5);
///     }
///     DecodeResult::Incomplete => panic!("expected a line"),
/// }
/// ```
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let Some(pos) = buf.iter().position(|&b| b == b'\r' || b == b'\n') else {
        return DecodeResult::Incomplete;
    };

    DecodeResult::Line {
        text: String::from_utf8_lossy(&buf[..pos]).trim().to_string(),
        consumed: pos + 1,
        terminator: buf[pos],
    }
}

/// Whether a command is a status query (`PW?`, `Z2?`, ...).
pub fn is_query(command: &str) -> bool {
    command.ends_with(QUERY_SUFFIX)
}
