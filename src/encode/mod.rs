//! Encoder sinks.
//!
//! Sinks consume tone-mapped frames in index order and are driven by the
//! [`Orchestrator`](crate::Orchestrator).

/// `ffmpeg` subprocess sink fed raw `rgb24` on stdin.
pub mod ffmpeg;
/// Generic frame sink trait and the in-memory sink.
pub mod sink;
