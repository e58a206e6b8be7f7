//! Raw HTTP/1.1 probe.
//!
//! The request is assembled by hand so malformed or unusual requests can be
//! sent as-is:
//!
//! ```text
//! <METHOD> <PATH> HTTP/1.1\r\n
//! Header-Name: value\r\n
//! \r\n
//! <optional body>
//! ```
//!
//! No `Content-Length` is added. Only the first chunk of the response is read.

use bytes::{BufMut, BytesMut};
use std::io::{Read, Write};
use tracing::info;

use super::{read_chunk, send_raw, Pacer, RunStats};
use crate::config::HttpSettings;
use crate::error::ProbeError;

/// Serialize the request exactly as it goes on the wire.
pub fn build_request(settings: &HttpSettings) -> BytesMut {
    let mut request = BytesMut::with_capacity(128 + settings.body.len());
    request.put_slice(settings.method.as_bytes());
    request.put_u8(b' ');
    request.put_slice(settings.path.as_bytes());
    request.put_slice(b" HTTP/1.1\r\n");
    for (name, value) in &settings.headers {
        request.put_slice(name.as_bytes());
        request.put_slice(b": ");
        request.put_slice(value.as_bytes());
        request.put_slice(b"\r\n");
    }
    request.put_slice(b"\r\n");
    request.put_slice(settings.body.as_bytes());
    request
}

/// First line of a response, without the line ending.
pub fn status_line(response: &[u8]) -> Option<&str> {
    let end = response.windows(2).position(|w| w == b"\r\n")?;
    std::str::from_utf8(&response[..end]).ok()
}

pub fn run<S: Read + Write>(
    stream: &mut S,
    settings: &HttpSettings,
    buffer_size: usize,
    pacer: &mut Pacer,
) -> Result<RunStats, ProbeError> {
    let request = build_request(settings);
    let mut stats = RunStats::default();

    while let Some(round) = pacer.next_round() {
        send_raw(stream, &request)?;
        info!(
            round,
            method = %settings.method,
            path = %settings.path,
            len = request.len(),
            "Request sent"
        );

        let response = read_chunk(stream, buffer_size)?;
        info!(
            round,
            status = status_line(&response).unwrap_or("<unparsed>"),
            len = response.len(),
            "Received: {}",
            String::from_utf8_lossy(&response)
        );
        stats.record(request.len(), response.len());
    }

    Ok(stats)
}
