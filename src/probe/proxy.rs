//! Reverse proxy probe.
//!
//! Sends raw text with no framing and logs whatever the first read returns.
//! Useful against a proxy fronting an unframed echo server.

use std::io::{Read, Write};
use tracing::info;

use super::{read_chunk, send_raw, Pacer, RunStats};
use crate::config::ProxySettings;
use crate::error::ProbeError;

pub fn build_message(settings: &ProxySettings, client_id: &str) -> String {
    match &settings.message {
        Some(message) => message.clone(),
        None => format!("Hello reverse proxy from wireprobe: {client_id}"),
    }
}

pub fn run<S: Read + Write>(
    stream: &mut S,
    settings: &ProxySettings,
    client_id: &str,
    buffer_size: usize,
    pacer: &mut Pacer,
) -> Result<RunStats, ProbeError> {
    let message = build_message(settings, client_id);
    let mut stats = RunStats::default();

    while let Some(round) = pacer.next_round() {
        send_raw(stream, message.as_bytes())?;

        let reply = read_chunk(stream, buffer_size)?;
        info!(round, len = reply.len(), "Received: {}", String::from_utf8_lossy(&reply));
        stats.record(message.len(), reply.len());
    }

    Ok(stats)
}
