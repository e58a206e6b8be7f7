//! Error types for the framed transport and the probes.

use std::io;
use thiserror::Error;

/// Failure of a single framed read or write.
///
/// Nothing is recovered locally: whatever bytes were consumed before the
/// failure are gone, and the stream should be considered unusable.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before the expected byte count arrived.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// The underlying stream failed a read.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The underlying stream rejected a write.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The payload length does not fit the 32-bit length prefix.
    #[error("payload of {0} bytes does not fit a 32-bit length prefix")]
    PayloadTooLarge(usize),

    /// A length prefix exceeded the configured maximum frame size.
    #[error("frame length {length} exceeds maximum of {max} bytes")]
    FrameTooLarge { length: u32, max: u32 },
}

impl FrameError {
    /// True when the peer went away, as opposed to a local or protocol failure.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, FrameError::ConnectionClosed { .. })
    }
}

/// Errors that end a probe run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not resolve {0}")]
    Resolve(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The peer closed the connection before an unframed reply arrived.
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// `repeat` copies of the message do not fit in one frame.
    #[error("message of {len} bytes repeated {repeat} times does not fit in a frame")]
    MessageTooLarge { len: usize, repeat: usize },
}

/// Result type alias for framing operations.
pub type Result<T> = std::result::Result<T, FrameError>;
