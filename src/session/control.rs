use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::core::FrameIndex;

/// Cloneable cancellation flag polled by the orchestrator between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// `true` once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Receives run progress. Called on the producing thread, so implementations should be cheap.
pub trait ProgressSink {
    /// Run is about to stream `total` frames.
    fn on_start(&mut self, total: u64) {
        let _ = total;
    }
    /// Frame `idx` has been handed to the sink.
    fn on_frame(&mut self, idx: FrameIndex);
    /// All frames were written and the encoder exited cleanly.
    fn on_finish(&mut self) {}
}

/// Discards progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_frame(&mut self, _idx: FrameIndex) {}
}

/// Logs progress through `tracing` every `every` frames.
#[derive(Clone, Debug)]
pub struct LogProgress {
    every: u64,
    total: u64,
    started: Option<std::time::Instant>,
}

impl LogProgress {
    /// Log once per `every` frames (at least 1).
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            total: 0,
            started: None,
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressSink for LogProgress {
    fn on_start(&mut self, total: u64) {
        self.total = total;
        self.started = Some(std::time::Instant::now());
        tracing::info!(total, "streaming frames");
    }

    fn on_frame(&mut self, idx: FrameIndex) {
        let done = idx.0 + 1;
        if done % self.every != 0 && done != self.total {
            return;
        }
        let elapsed = self.started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        let rate = if elapsed > 0.0 {
            done as f64 / elapsed
        } else {
            0.0
        };
        tracing::info!(done, total = self.total, fps = format!("{rate:.1}"), "progress");
    }

    fn on_finish(&mut self) {
        let elapsed = self.started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        tracing::info!(frames = self.total, secs = format!("{elapsed:.2}"), "done");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/control.rs"]
mod tests;
