//! Length-prefixed message framing over blocking byte streams.
//!
//! Every message on the wire is a 4-byte big-endian length followed by
//! exactly that many payload bytes:
//!
//! ```text
//! Frame := LENGTH(4 bytes, big-endian, unsigned) || PAYLOAD(LENGTH bytes)
//!
//! Example:
//! payload "hi" <-> 00 00 00 02 68 69
//! ```
//!
//! There is no magic number, version byte, checksum or terminator.
//!
//! The functions here take any caller-owned `Read`/`Write` and perform one
//! blocking operation each. They never retry, time out or reconnect; the
//! stream's own settings (e.g. socket timeouts) apply. `read_frame` trusts
//! the length prefix as-is, so a hostile peer can request an arbitrarily
//! large read. Use `read_frame_limited` or `FrameDecoder::with_max_frame_len`
//! where that matters.
//!
//! For async streams see [`crate::frame_async`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read, Write};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest slice requested from the stream in one `read` call.
///
/// The accumulator grows by at most this much per read, so a bogus length
/// prefix does not allocate its full size before any payload arrives.
pub(crate) const READ_CHUNK: usize = 8192;

/// Read exactly `n` bytes from `stream`.
///
/// Short reads are expected and looped over; `Interrupted` is retried. A
/// zero-byte read before `n` bytes have arrived means the peer closed the
/// connection and yields `FrameError::ConnectionClosed`; the partial data is
/// discarded. Never consumes more than `n` bytes.
pub fn read_exact<R: Read + ?Sized>(stream: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(n.min(READ_CHUNK));

    while buffer.len() < n {
        let start = buffer.len();
        let chunk_size = (n - start).min(READ_CHUNK);
        buffer.resize(start + chunk_size, 0);

        match stream.read(&mut buffer[start..start + chunk_size]) {
            Ok(0) => {
                return Err(FrameError::ConnectionClosed {
                    expected: n,
                    received: start,
                });
            }
            Ok(read) => {
                buffer.truncate(start + read);
                trace!(read, total = buffer.len(), expected = n, "Read chunk");
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                buffer.truncate(start);
            }
            Err(e) => return Err(FrameError::Read(e)),
        }
    }

    Ok(buffer)
}

/// Read one frame and return its payload.
///
/// The stream must be positioned at a frame boundary. The length prefix is
/// not bounded.
pub fn read_frame<R: Read + ?Sized>(stream: &mut R) -> Result<Vec<u8>> {
    let length = read_length(stream)?;
    read_exact(stream, length as usize)
}

/// Read one frame, rejecting length prefixes above `max_len`.
///
/// On `FrameTooLarge` the payload is left unread, so the stream is no longer
/// at a frame boundary and should be dropped.
pub fn read_frame_limited<R: Read + ?Sized>(stream: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let length = read_length(stream)?;
    if length > max_len {
        return Err(FrameError::FrameTooLarge {
            length,
            max: max_len,
        });
    }
    read_exact(stream, length as usize)
}

/// Write `payload` as one frame and flush.
///
/// Header and payload go out in a single `write_all`, which loops over
/// partial writes. Stream failures surface as `FrameError::Write`.
pub fn write_frame<W: Write + ?Sized>(stream: &mut W, payload: &[u8]) -> Result<()> {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encode_frame(payload, &mut frame)?;

    stream.write_all(&frame).map_err(FrameError::Write)?;
    stream.flush().map_err(FrameError::Write)?;

    trace!(len = payload.len(), "Wrote frame");
    Ok(())
}

/// Append the wire form of `payload` to `dst`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length =
        u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(length);
    dst.put_slice(payload);
    Ok(())
}

/// Read and decode the 4-byte length prefix.
fn read_length<R: Read + ?Sized>(stream: &mut R) -> Result<u32> {
    let header = read_exact(stream, HEADER_LEN)?;
    let length = decode_length(&header);
    trace!(length, "Read frame header");
    Ok(length)
}

/// Decode a big-endian length prefix. `header` must hold at least 4 bytes.
pub(crate) fn decode_length(header: &[u8]) -> u32 {
    let mut prefix = [0u8; HEADER_LEN];
    prefix.copy_from_slice(&header[..HEADER_LEN]);
    u32::from_be_bytes(prefix)
}

/// Incremental decoder for callers that run their own read loop.
///
/// Bytes are fed in whatever chunks the transport delivers; complete
/// payloads are pulled out one at a time, in order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_len: Option<u32>,
}

impl FrameDecoder {
    /// Create a decoder with no frame size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that rejects frames longer than `max`.
    pub fn with_max_frame_len(max: u32) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_len: Some(max),
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pop the next complete payload.
    ///
    /// Returns `Ok(None)` while the header or payload is incomplete. An
    /// oversized header is reported every time it is polled; the decoder
    /// cannot resynchronize past it.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let length = decode_length(&self.buffer);
        if let Some(max) = self.max_frame_len {
            if length > max {
                return Err(FrameError::FrameTooLarge { length, max });
            }
        }

        let total = HEADER_LEN + length as usize;
        if self.buffer.len() < total {
            // Grow with the data, not with the prefix.
            self.buffer.reserve((total - self.buffer.len()).min(READ_CHUNK));
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        Ok(Some(self.buffer.split_to(length as usize).freeze()))
    }

    /// Number of bytes fed but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
