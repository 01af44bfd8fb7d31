use crate::foundation::core::{FrameIndex, FrameSize};
use crate::foundation::error::{ReelError, ReelResult};
use crate::tone::frame::FrameBuffer;

/// Lifecycle of the consumer behind a [`FrameSink`].
///
/// `Spawned -> Streaming -> Closing -> Exited(code)`, or `Failed(reason)` from any state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncoderState {
    /// Process started, nothing written yet.
    Spawned,
    /// At least one frame written.
    Streaming,
    /// Input closed, waiting for the process to exit.
    Closing,
    /// Process exited on its own after end-of-stream. `None` when killed by a signal.
    Exited(Option<i32>),
    /// Aborted or broken; the process has been reaped.
    Failed(String),
}

impl EncoderState {
    /// `true` for `Exited` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Failed(_))
    }
}

/// How the consumer ended after [`FrameSink::finish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderExit {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured diagnostic output (trimmed).
    pub stderr: String,
}

impl EncoderExit {
    /// Exit code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into [`ReelError::EncoderFailed`].
    pub fn into_result(self) -> ReelResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ReelError::EncoderFailed {
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Consumer of tone-mapped frames, written in strictly increasing [`FrameIndex`] order.
///
/// `write_frame` blocks until the whole buffer is handed over; no more than one frame is
/// buffered on this side. `finish` signals end-of-stream and waits for the consumer to exit.
/// `abort` may replace `finish` at any point and is a no-op once the sink is terminal.
pub trait FrameSink: Send {
    /// Write one complete frame.
    fn write_frame(&mut self, idx: FrameIndex, frame: &FrameBuffer) -> ReelResult<()>;
    /// Close the input and wait for the consumer to exit.
    fn finish(&mut self) -> ReelResult<EncoderExit>;
    /// Terminate the consumer immediately and wait for it.
    fn abort(&mut self) -> ReelResult<()>;
    /// Current lifecycle state.
    fn state(&self) -> EncoderState;
    /// Number of frames fully written.
    fn frames_written(&self) -> u64;
}

/// Shared ordering and size checks for sink implementations.
#[derive(Debug, Clone, Default)]
pub(crate) struct WriteGuard {
    pub(crate) last_idx: Option<FrameIndex>,
    pub(crate) written: u64,
}

impl WriteGuard {
    pub(crate) fn check(
        &self,
        idx: FrameIndex,
        frame: &FrameBuffer,
        expected: FrameSize,
    ) -> ReelResult<()> {
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(ReelError::configuration(format!(
                "frame sink received out-of-order frame {} after {}",
                idx.0, last.0
            )));
        }
        if frame.size() != expected || frame.data.len() != expected.frame_bytes() {
            return Err(ReelError::configuration(format!(
                "frame size mismatch: got {}x{} ({} bytes), expected {}x{}",
                frame.width,
                frame.height,
                frame.data.len(),
                expected.width,
                expected.height
            )));
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, idx: FrameIndex) {
        self.last_idx = Some(idx);
        self.written += 1;
    }
}

/// In-memory sink for tests and debugging.
///
/// Optionally simulates a consumer that breaks after N frames or exits with a given code.
#[derive(Debug)]
pub struct InMemorySink {
    size: FrameSize,
    state: EncoderState,
    guard: WriteGuard,
    break_after: Option<u64>,
    exit_code: i32,
    aborted: bool,
    /// Frames in write order.
    pub(crate) frames: Vec<(FrameIndex, FrameBuffer)>,
}

impl InMemorySink {
    /// Sink accepting frames of `size` that exits with code 0.
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            state: EncoderState::Spawned,
            guard: WriteGuard::default(),
            break_after: None,
            exit_code: 0,
            aborted: false,
            frames: Vec::new(),
        }
    }

    /// Fail every write after `frames` frames with [`ReelError::StreamClosed`].
    pub fn breaking_after(mut self, frames: u64) -> Self {
        self.break_after = Some(frames);
        self
    }

    /// Report `code` from `finish`.
    pub fn exiting_with(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameBuffer)] {
        &self.frames
    }

    /// `true` once `abort` has run.
    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// All frame bytes concatenated in wire order.
    pub fn stream_bytes(&self) -> Vec<u8> {
        self.frames
            .iter()
            .flat_map(|(_, f)| f.data.iter().copied())
            .collect()
    }
}

impl FrameSink for InMemorySink {
    fn write_frame(&mut self, idx: FrameIndex, frame: &FrameBuffer) -> ReelResult<()> {
        if self.state.is_terminal() || self.state == EncoderState::Closing {
            return Err(ReelError::stream_closed(
                self.guard.last_idx.map(|i| i.0),
                "sink is no longer accepting frames",
            ));
        }
        self.guard.check(idx, frame, self.size)?;
        if self.break_after.is_some_and(|n| self.guard.written >= n) {
            return Err(ReelError::stream_closed(
                self.guard.last_idx.map(|i| i.0),
                "simulated broken pipe",
            ));
        }
        self.frames.push((idx, frame.clone()));
        self.guard.record(idx);
        self.state = EncoderState::Streaming;
        Ok(())
    }

    fn finish(&mut self) -> ReelResult<EncoderExit> {
        if let EncoderState::Failed(reason) = &self.state {
            return Err(ReelError::stream_closed(
                self.guard.last_idx.map(|i| i.0),
                format!("cannot finish a failed sink: {reason}"),
            ));
        }
        self.state = EncoderState::Exited(Some(self.exit_code));
        Ok(EncoderExit {
            code: Some(self.exit_code),
            stderr: String::new(),
        })
    }

    fn abort(&mut self) -> ReelResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.aborted = true;
        self.state = EncoderState::Failed("aborted".to_string());
        Ok(())
    }

    fn state(&self) -> EncoderState {
        self.state.clone()
    }

    fn frames_written(&self) -> u64 {
        self.guard.written
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
