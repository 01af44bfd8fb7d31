use std::sync::Arc;
use std::sync::mpsc;

use crate::encode::ffmpeg::{EncoderOpts, FfmpegStreamer};
use crate::encode::sink::{EncoderExit, FrameSink};
use crate::foundation::core::{FrameIndex, FrameSize};
use crate::foundation::error::{ReelError, ReelResult};
use crate::session::config::{RunConfig, SimulationParams};
use crate::session::control::{CancelToken, NoProgress, ProgressSink};
use crate::session::generator::FrameGenerator;
use crate::tone::frame::FrameBuffer;
use crate::tone::palette::{Palette, resolve_palette};

/// Why a run ended in [`RunState::Failed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Parameters were rejected before anything was acquired.
    Configuration,
    /// The encoder could not be spawned.
    EncoderUnavailable,
    /// The encoder input broke mid-stream.
    StreamClosed,
    /// The encoder exited unsuccessfully.
    EncoderFailed(Option<i32>),
    /// The run was cancelled.
    Interrupted,
    /// Any other failure.
    Other,
}

impl From<&ReelError> for FailureKind {
    fn from(err: &ReelError) -> Self {
        match err {
            ReelError::Configuration(_) => Self::Configuration,
            ReelError::EncoderUnavailable(_) => Self::EncoderUnavailable,
            ReelError::StreamClosed { .. } => Self::StreamClosed,
            ReelError::EncoderFailed { code, .. } => Self::EncoderFailed(*code),
            ReelError::Interrupted { .. } => Self::Interrupted,
            ReelError::PaletteUnavailable(_) | ReelError::Other(_) => Self::Other,
        }
    }
}

/// Orchestrator lifecycle.
///
/// `Configuring -> Initializing -> Streaming { frame } -> Finalizing -> Succeeded`, or
/// `Failed(kind)` from any state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Validating parameters.
    Configuring,
    /// Building the grid and spawning the encoder.
    Initializing,
    /// Producing frame `frame`.
    Streaming {
        /// Index of the frame being produced.
        frame: u64,
    },
    /// Waiting for the encoder to exit.
    Finalizing,
    /// Every frame was written and the encoder exited with code 0.
    Succeeded,
    /// The run stopped; the encoder, if spawned, has been finished or aborted.
    Failed(FailureKind),
}

impl RunState {
    /// `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Execution knobs that do not change the output bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Tone-map frame `i + 1` while a writer thread streams frame `i`.
    pub pipelined: bool,
}

/// Summary of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Frames handed to the encoder.
    pub frames_written: u64,
    /// Encoder exit code.
    pub exit_code: Option<i32>,
    /// Final state, always [`RunState::Succeeded`].
    pub state: RunState,
    /// Palette actually used.
    pub palette: String,
}

/// Drives one generation run: evolve, tone-map and stream every frame in order, then finalize.
///
/// Every failure and cancellation after the encoder is spawned goes through an explicit
/// `abort`, so no encoder process outlives the run.
pub struct Orchestrator {
    params: SimulationParams,
    palette: Arc<dyn Palette>,
    cancel: CancelToken,
    progress: Box<dyn ProgressSink + Send>,
    options: RunOptions,
    state: RunState,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("params", &self.params)
            .field("palette", &self.palette.name())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator for `params` using `palette`.
    pub fn new(params: SimulationParams, palette: Box<dyn Palette>) -> Self {
        Self {
            params,
            palette: Arc::from(palette),
            cancel: CancelToken::new(),
            progress: Box::new(NoProgress),
            options: RunOptions::default(),
            state: RunState::Configuring,
        }
    }

    /// Orchestrator for a loaded config, with preview capping applied and the palette resolved
    /// (falling back with a warning when unknown).
    pub fn from_config(cfg: &RunConfig) -> Self {
        let resolved = resolve_palette(&cfg.palette);
        Self::new(cfg.effective_simulation(), resolved.palette)
    }

    /// Observe `cancel` between frames.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress to `progress`.
    pub fn with_progress(mut self, progress: impl ProgressSink + Send + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Set execution options.
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Current state; terminal after a run returns.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Parameters of this run.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Run against the ffmpeg encoder described by `opts`.
    pub fn run_ffmpeg(&mut self, opts: &EncoderOpts) -> ReelResult<RunReport> {
        self.run(|_| FfmpegStreamer::spawn(opts))
    }

    /// Validate, spawn the sink through `spawn` and stream every frame into it.
    ///
    /// `spawn` is only called after validation succeeds; a spawn failure leaves no frames
    /// produced.
    pub fn run<S, F>(&mut self, spawn: F) -> ReelResult<RunReport>
    where
        S: FrameSink,
        F: FnOnce(FrameSize) -> ReelResult<S>,
    {
        let mut generator = self.prepare()?;
        let mut sink = match spawn(generator.size()) {
            Ok(sink) => sink,
            Err(err) => return Err(self.fail(err)),
        };
        self.stream(&mut generator, &mut sink)
    }

    /// Like [`Orchestrator::run`] with a sink the caller already owns.
    pub fn run_into(&mut self, sink: &mut dyn FrameSink) -> ReelResult<RunReport> {
        let mut generator = self.prepare()?;
        self.stream(&mut generator, sink)
    }

    fn prepare(&mut self) -> ReelResult<FrameGenerator> {
        self.state = RunState::Configuring;
        if let Err(err) = self.params.validate() {
            return Err(self.fail(err));
        }

        self.state = RunState::Initializing;
        match FrameGenerator::new(&self.params, Box::new(self.palette.clone())) {
            Ok(generator) => Ok(generator),
            Err(err) => Err(self.fail(err)),
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            width = self.params.width,
            height = self.params.height,
            frames = self.params.frame_count,
            seed = self.params.seed,
            palette = self.palette.name(),
            pipelined = self.options.pipelined,
        )
    )]
    fn stream(
        &mut self,
        generator: &mut FrameGenerator,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<RunReport> {
        tracing::info!("run started");
        self.progress.on_start(self.params.frame_count);
        if self.options.pipelined {
            self.stream_pipelined(generator, sink)
        } else {
            self.stream_sequential(generator, sink)
        }
    }

    fn stream_sequential(
        &mut self,
        generator: &mut FrameGenerator,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<RunReport> {
        let mut frame = FrameBuffer::new(generator.size());
        for _ in 0..self.params.frame_count {
            if self.cancel.is_cancelled() {
                let err = ReelError::Interrupted {
                    frames_written: sink.frames_written(),
                };
                return Err(self.abort(sink, err));
            }

            let idx = generator.advance();
            self.state = RunState::Streaming { frame: idx.0 };
            generator.render_into(&mut frame);
            if let Err(err) = sink.write_frame(idx, &frame) {
                return Err(self.abort(sink, err));
            }
            tracing::debug!(frame = idx.0, "frame written");
            self.progress.on_frame(idx);
        }
        self.finalize(sink)
    }

    fn stream_pipelined(
        &mut self,
        generator: &mut FrameGenerator,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<RunReport> {
        let total = self.params.frame_count;
        let size = generator.size();
        let cancel = &self.cancel;
        let state = &mut self.state;
        let progress: &mut (dyn ProgressSink + Send) = self.progress.as_mut();

        let (interrupted, written) = std::thread::scope(|scope| {
            // One frame in flight plus one being written keeps the producer at most a frame
            // ahead of the encoder.
            let (tx, rx) = mpsc::sync_channel::<(FrameIndex, FrameBuffer)>(1);
            let (recycle_tx, recycle_rx) = mpsc::sync_channel::<FrameBuffer>(2);
            let writer_sink = &mut *sink;

            let writer = scope.spawn(move || -> ReelResult<()> {
                for (idx, frame) in rx {
                    writer_sink.write_frame(idx, &frame)?;
                    tracing::debug!(frame = idx.0, "frame written");
                    progress.on_frame(idx);
                    let _ = recycle_tx.try_send(frame);
                }
                Ok(())
            });

            let mut interrupted = false;
            for _ in 0..total {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }
                let idx = generator.advance();
                *state = RunState::Streaming { frame: idx.0 };
                let mut frame = recycle_rx
                    .try_recv()
                    .unwrap_or_else(|_| FrameBuffer::new(size));
                generator.render_into(&mut frame);
                if tx.send((idx, frame)).is_err() {
                    // The writer stopped; its error is reported below.
                    break;
                }
            }
            drop(tx);

            let written = writer.join().unwrap_or_else(|_| {
                Err(ReelError::Other(anyhow::anyhow!(
                    "frame writer thread panicked"
                )))
            });
            (interrupted, written)
        });

        if let Err(err) = written {
            return Err(self.abort(sink, err));
        }
        if interrupted {
            let err = ReelError::Interrupted {
                frames_written: sink.frames_written(),
            };
            return Err(self.abort(sink, err));
        }
        self.finalize(sink)
    }

    fn finalize(&mut self, sink: &mut dyn FrameSink) -> ReelResult<RunReport> {
        if self.cancel.is_cancelled() {
            let err = ReelError::Interrupted {
                frames_written: sink.frames_written(),
            };
            return Err(self.abort(sink, err));
        }

        self.state = RunState::Finalizing;
        let exit = match sink.finish().and_then(EncoderExit::into_result) {
            Ok(exit) => exit,
            Err(err) => return Err(self.abort(sink, err)),
        };

        self.state = RunState::Succeeded;
        self.progress.on_finish();
        let frames_written = sink.frames_written();
        tracing::info!(frames_written, code = ?exit.code, "run finished");
        Ok(RunReport {
            frames_written,
            exit_code: exit.code,
            state: self.state.clone(),
            palette: self.palette.name().to_string(),
        })
    }

    /// Terminate the sink if it is still live, then record the failure.
    ///
    /// Once cancellation was requested any failure is reported as `Interrupted`: an interrupt
    /// usually surfaces first as a broken pipe or a killed encoder.
    fn abort(&mut self, sink: &mut dyn FrameSink, err: ReelError) -> ReelError {
        let err = if self.cancel.is_cancelled() && !err.is_interrupted() {
            tracing::debug!(error = %err, "failure after cancellation");
            ReelError::Interrupted {
                frames_written: sink.frames_written(),
            }
        } else {
            err
        };
        if !sink.state().is_terminal() {
            tracing::error!(
                error = %err,
                frames_written = sink.frames_written(),
                "aborting encoder"
            );
            if let Err(abort_err) = sink.abort() {
                tracing::error!(error = %abort_err, "encoder abort failed");
            }
        }
        self.fail(err)
    }

    fn fail(&mut self, err: ReelError) -> ReelError {
        self.state = RunState::Failed(FailureKind::from(&err));
        err
    }
}

/// Run `cfg` end to end against its configured encoder.
pub fn generate_video(
    cfg: &RunConfig,
    cancel: CancelToken,
    progress: impl ProgressSink + Send + 'static,
    options: RunOptions,
) -> ReelResult<RunReport> {
    cfg.validate()?;
    let opts = cfg.encoder_opts()?;
    Orchestrator::from_config(cfg)
        .with_cancel(cancel)
        .with_progress(progress)
        .with_options(options)
        .run_ffmpeg(&opts)
}

#[cfg(test)]
#[path = "../../tests/unit/session/run.rs"]
mod tests;
