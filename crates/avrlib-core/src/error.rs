//! Error types for avrlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Link failures, stalled writes, device
//! identification failures, and caller mistakes are all captured here.

/// The error type for all avrlib operations.
///
/// Note that an idle read is *not* an error at the driver level: the
/// protocol has no end-of-response marker, so a read timeout is how a
/// multi-line response ends. [`Error::Timeout`] only travels between a
/// [`Transport`](crate::Transport) and the line reader that consumes it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial link could not be opened.
    ///
    /// Fatal to setup; the driver never retries this internally.
    #[error("connection error: {0}")]
    Connection(String),

    /// A byte could not be written within the write timeout.
    #[error("write timed out")]
    WriteTimeout,

    /// No data arrived within the read timeout.
    #[error("timeout waiting for data")]
    Timeout,

    /// A response field did not match the pattern expected for it.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The device answered the power probe with something other than a
    /// known power token.
    #[error("unsupported device: {0}")]
    UnsupportedDevice(String),

    /// An invalid parameter was passed to a receiver command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transport-level error (serial port, mock link).
    #[error("transport error: {0}")]
    Transport(String),

    /// No connection to the receiver has been established, or it was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the receiver was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
