//! Framed echo probe.
//!
//! Each round sends one frame holding the message repeated `repeat` times,
//! then reads one frame back and compares it with what was sent.

use std::io::{Read, Write};
use tracing::{info, warn};

use super::{Pacer, RunStats};
use crate::config::EchoSettings;
use crate::error::ProbeError;
use crate::frame::{read_frame, read_frame_limited, write_frame};

/// Payload sent every round.
///
/// Fails without allocating when the repeated message would not fit the
/// 32-bit length prefix.
pub fn build_payload(settings: &EchoSettings, client_id: &str) -> Result<Vec<u8>, ProbeError> {
    let message = match &settings.message {
        Some(message) => message.clone(),
        None => format!("Hello framed echo server from wireprobe: {client_id}"),
    };

    let too_large = ProbeError::MessageTooLarge {
        len: message.len(),
        repeat: settings.repeat,
    };
    match message.len().checked_mul(settings.repeat) {
        Some(total) if total <= u32::MAX as usize => {}
        _ => return Err(too_large),
    }

    Ok(message.repeat(settings.repeat).into_bytes())
}

pub fn run<S: Read + Write>(
    stream: &mut S,
    settings: &EchoSettings,
    client_id: &str,
    pacer: &mut Pacer,
) -> Result<RunStats, ProbeError> {
    let payload = build_payload(settings, client_id)?;
    let mut stats = RunStats::default();

    while let Some(round) = pacer.next_round() {
        write_frame(stream, &payload)?;
        info!(round, len = payload.len(), "Frame sent");

        let reply = match settings.max_frame_size {
            Some(max) => read_frame_limited(stream, max)?,
            None => read_frame(stream)?,
        };
        info!(round, len = reply.len(), "Frame received");

        if reply != payload {
            stats.mismatches += 1;
            warn!(
                round,
                sent = payload.len(),
                received = reply.len(),
                "Echo does not match request"
            );
        }
        stats.record(payload.len(), reply.len());
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::probe::tests::spawn_peer;
    use std::net::TcpStream;
    use std::time::Duration;

    fn settings(message: &str, repeat: usize) -> EchoSettings {
        EchoSettings {
            message: Some(message.to_string()),
            repeat,
            max_frame_size: None,
        }
    }

    #[test]
    fn test_default_payload() {
        let settings = EchoSettings {
            message: None,
            repeat: 2,
            max_frame_size: None,
        };
        let payload = build_payload(&settings, "42-1").unwrap();
        let one = "Hello framed echo server from wireprobe: 42-1";
        assert_eq!(payload, format!("{one}{one}").into_bytes());
    }

    #[test]
    fn test_zero_repeat_sends_empty_frame() {
        assert!(build_payload(&settings("abc", 0), "id").unwrap().is_empty());
    }

    #[test]
    fn test_oversized_repeat_is_an_error() {
        match build_payload(&settings("abc", usize::MAX), "id") {
            Err(ProbeError::MessageTooLarge { len, repeat }) => {
                assert_eq!(len, 3);
                assert_eq!(repeat, usize::MAX);
            }
            other => panic!("unexpected: {:?}", other),
        }

        // Fits in memory arithmetic but not in a 32-bit length prefix.
        let repeat = (u32::MAX as usize) / 2 + 1;
        assert!(matches!(
            build_payload(&settings("ab", repeat), "id"),
            Err(ProbeError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_echo_rounds() {
        let (addr, peer) = spawn_peer(|mut stream| {
            while let Ok(payload) = read_frame(&mut stream) {
                write_frame(&mut stream, &payload).unwrap();
            }
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut pacer = Pacer::new(3, Duration::ZERO);
        let stats = run(&mut stream, &settings("ping ", 100), "id", &mut pacer).unwrap();

        assert_eq!(stats.rounds, 3);
        assert_eq!(stats.bytes_sent, 1500);
        assert_eq!(stats.bytes_received, 1500);
        assert_eq!(stats.mismatches, 0);

        drop(stream);
        peer.join().unwrap();
    }

    #[test]
    fn test_mismatch_is_counted() {
        let (addr, peer) = spawn_peer(|mut stream| {
            let mut payload = read_frame(&mut stream).unwrap();
            payload.reverse();
            write_frame(&mut stream, &payload).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut pacer = Pacer::new(1, Duration::ZERO);
        let stats = run(&mut stream, &settings("abc", 1), "id", &mut pacer).unwrap();
        assert_eq!(stats.mismatches, 1);
        peer.join().unwrap();
    }

    #[test]
    fn test_peer_close_ends_run() {
        let (addr, peer) = spawn_peer(|mut stream| {
            let _ = read_frame(&mut stream);
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut pacer = Pacer::new(0, Duration::ZERO);
        match run(&mut stream, &settings("bye", 1), "id", &mut pacer) {
            Err(ProbeError::Frame(e)) => assert!(e.is_connection_closed()),
            other => panic!("unexpected: {:?}", other),
        }
        peer.join().unwrap();
    }

    #[test]
    fn test_oversized_reply_rejected() {
        let (addr, peer) = spawn_peer(|mut stream| {
            read_frame(&mut stream).unwrap();
            write_frame(&mut stream, &[0u8; 64]).unwrap();
        });

        let mut settings = settings("x", 1);
        settings.max_frame_size = Some(16);

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut pacer = Pacer::new(1, Duration::ZERO);
        match run(&mut stream, &settings, "id", &mut pacer) {
            Err(ProbeError::Frame(FrameError::FrameTooLarge { length, max })) => {
                assert_eq!(length, 64);
                assert_eq!(max, 16);
            }
            other => panic!("unexpected: {:?}", other),
        }
        peer.join().unwrap();
    }
}
