//! The framing of [`crate::frame`] over Tokio streams.
//!
//! Same wire format, same error semantics. Each function is one awaited
//! operation on a caller-owned stream; spawning, timeouts and cancellation
//! are left to the caller.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::frame::{decode_length, encode_frame, HEADER_LEN, READ_CHUNK};

/// Read exactly `n` bytes, failing with `ConnectionClosed` on early EOF.
pub async fn read_exact<R: AsyncRead + Unpin + ?Sized>(
    stream: &mut R,
    n: usize,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(n.min(READ_CHUNK));

    while buffer.len() < n {
        let start = buffer.len();
        let chunk_size = (n - start).min(READ_CHUNK);
        buffer.resize(start + chunk_size, 0);

        match stream.read(&mut buffer[start..start + chunk_size]).await {
            Ok(0) => {
                return Err(FrameError::ConnectionClosed {
                    expected: n,
                    received: start,
                });
            }
            Ok(read) => buffer.truncate(start + read),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => buffer.truncate(start),
            Err(e) => return Err(FrameError::Read(e)),
        }
    }

    Ok(buffer)
}

/// Read one frame and return its payload. The length prefix is not bounded.
pub async fn read_frame<R: AsyncRead + Unpin + ?Sized>(stream: &mut R) -> Result<Vec<u8>> {
    let length = read_length(stream).await?;
    read_exact(stream, length as usize).await
}

/// Read one frame, rejecting length prefixes above `max_len`.
pub async fn read_frame_limited<R: AsyncRead + Unpin + ?Sized>(
    stream: &mut R,
    max_len: u32,
) -> Result<Vec<u8>> {
    let length = read_length(stream).await?;
    if length > max_len {
        return Err(FrameError::FrameTooLarge {
            length,
            max: max_len,
        });
    }
    read_exact(stream, length as usize).await
}

/// Write `payload` as one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin + ?Sized>(
    stream: &mut W,
    payload: &[u8],
) -> Result<()> {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encode_frame(payload, &mut frame)?;

    stream.write_all(&frame).await.map_err(FrameError::Write)?;
    stream.flush().await.map_err(FrameError::Write)?;

    trace!(len = payload.len(), "Wrote frame");
    Ok(())
}

/// Read and decode the 4-byte length prefix.
async fn read_length<R: AsyncRead + Unpin + ?Sized>(stream: &mut R) -> Result<u32> {
    let header = read_exact(stream, HEADER_LEN).await?;
    let length = decode_length(&header);
    trace!(length, "Read frame header");
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_short_reads() {
        let mut stream = Builder::new()
            .read(&[0x00])
            .read(&[0x00, 0x00])
            .read(&[0x02, 0x68])
            .read(&[0x69])
            .build();

        assert_eq!(read_frame(&mut stream).await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_write_hi() {
        let mut stream = Builder::new().write(&[0x00, 0x00, 0x00, 0x02, 0x68, 0x69]).build();
        write_frame(&mut stream, b"hi").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_payload() {
        let mut stream = Builder::new().read(&[0, 0, 0, 0]).build();
        assert!(read_frame(&mut stream).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_inside_header() {
        let mut stream = Builder::new().read(&[0x00, 0x00, 0x00]).build();
        match read_frame(&mut stream).await {
            Err(FrameError::ConnectionClosed { expected, received }) => {
                assert_eq!(expected, 4);
                assert_eq!(received, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_inside_payload() {
        let mut stream = Builder::new()
            .read(&8u32.to_be_bytes())
            .read(b"1234")
            .build();
        match read_frame(&mut stream).await {
            Err(FrameError::ConnectionClosed { expected, received }) => {
                assert_eq!(expected, 8);
                assert_eq!(received, 4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let mut stream = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        match read_frame(&mut stream).await {
            Err(FrameError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_failure() {
        let mut stream = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();
        match write_frame(&mut stream, b"lost").await {
            Err(FrameError::Write(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_limited_rejects_oversized() {
        let mut stream = Builder::new().read(&100u32.to_be_bytes()).build();
        match read_frame_limited(&mut stream, 64).await {
            Err(FrameError::FrameTooLarge { length, max }) => {
                assert_eq!(length, 100);
                assert_eq!(max, 64);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_limited_accepts_exact_max() {
        let mut stream = Builder::new()
            .read(&5u32.to_be_bytes())
            .read(b"12345")
            .build();
        assert_eq!(read_frame_limited(&mut stream, 5).await.unwrap(), b"12345");
    }

    #[tokio::test]
    async fn test_limited_empty_payload() {
        let mut stream = Builder::new().read(&[0, 0, 0, 0]).build();
        assert!(read_frame_limited(&mut stream, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        // Small duplex buffer forces partial writes and short reads.
        let (mut client, mut server) = duplex(16);

        let echo = tokio::spawn(async move {
            while let Ok(payload) = read_frame(&mut server).await {
                write_frame(&mut server, &payload).await.unwrap();
            }
        });

        let payload: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        write_frame(&mut client, &payload).await.unwrap();
        assert_eq!(read_frame(&mut client).await.unwrap(), payload);

        write_frame(&mut client, b"").await.unwrap();
        assert!(read_frame(&mut client).await.unwrap().is_empty());

        drop(client);
        echo.await.unwrap();
    }
}
