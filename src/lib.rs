//! wireprobe: length-prefixed message framing and manual TCP probe clients.
//!
//! The reusable piece is the framing in [`frame`] (blocking) and
//! [`frame_async`] (Tokio): a 4-byte big-endian length followed by the
//! payload. The [`probe`] module drives it, and two unframed probes, from
//! the `wireprobe` binary.

pub mod config;
pub mod error;
pub mod frame;
pub mod frame_async;
pub mod probe;

pub use error::{FrameError, ProbeError};
pub use frame::{read_exact, read_frame, read_frame_limited, write_frame, FrameDecoder};
