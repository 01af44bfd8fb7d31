use super::*;
use crate::encode::sink::{EncoderState, InMemorySink};
use crate::tone::palette::Grayscale;

fn params(frames: u64) -> SimulationParams {
    SimulationParams {
        width: 8,
        height: 6,
        frame_count: frames,
        seed: 11,
        ..SimulationParams::default()
    }
}

fn orchestrator(frames: u64) -> Orchestrator {
    Orchestrator::new(params(frames), Box::new(Grayscale))
}

struct CancelAfter {
    token: CancelToken,
    frames: u64,
}

impl ProgressSink for CancelAfter {
    fn on_frame(&mut self, idx: FrameIndex) {
        if idx.0 + 1 == self.frames {
            self.token.cancel();
        }
    }
}

#[test]
fn streams_every_frame_in_order() {
    let mut orch = orchestrator(4);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    let report = orch.run_into(&mut sink).unwrap();

    assert_eq!(report.frames_written, 4);
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(report.palette, "gray");
    assert_eq!(orch.state(), &RunState::Succeeded);
    let indices: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(sink.state(), EncoderState::Exited(Some(0)));
    assert!(!sink.was_aborted());
}

#[test]
fn frames_match_the_generator() {
    let mut orch = orchestrator(3);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    orch.run_into(&mut sink).unwrap();

    let mut generator = FrameGenerator::new(&params(3), Box::new(Grayscale)).unwrap();
    for (idx, frame) in sink.frames() {
        let (expected_idx, expected) = generator.next_frame();
        assert_eq!(*idx, expected_idx);
        assert_eq!(frame, &expected);
    }
}

#[test]
fn zero_frames_still_finishes_cleanly() {
    let mut orch = orchestrator(0);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    let report = orch.run_into(&mut sink).unwrap();
    assert_eq!(report.frames_written, 0);
    assert_eq!(report.exit_code, Some(0));
    assert!(sink.frames().is_empty());
    assert_eq!(sink.state(), EncoderState::Exited(Some(0)));
}

#[test]
fn invalid_params_fail_before_spawning() {
    let mut orch = Orchestrator::new(
        SimulationParams {
            gamma: 0.0,
            ..params(3)
        },
        Box::new(Grayscale),
    );
    let mut spawned = false;
    let err = orch
        .run(|size| {
            spawned = true;
            Ok(InMemorySink::new(size))
        })
        .unwrap_err();
    assert!(matches!(err, ReelError::Configuration(_)));
    assert!(!spawned);
    assert_eq!(orch.state(), &RunState::Failed(FailureKind::Configuration));
}

#[test]
fn spawn_failure_is_terminal() {
    let mut orch = orchestrator(3);
    let err = orch
        .run(|_| -> ReelResult<InMemorySink> {
            Err(ReelError::encoder_unavailable("no such program"))
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 127);
    assert_eq!(
        orch.state(),
        &RunState::Failed(FailureKind::EncoderUnavailable)
    );
}

#[test]
fn cancellation_aborts_between_frames() {
    let token = CancelToken::new();
    let mut orch = orchestrator(10)
        .with_cancel(token.clone())
        .with_progress(CancelAfter {
            token: token.clone(),
            frames: 5,
        });
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    let err = orch.run_into(&mut sink).unwrap_err();

    assert!(matches!(err, ReelError::Interrupted { frames_written: 5 }));
    assert!(sink.was_aborted());
    assert!(sink.state().is_terminal());
    assert_eq!(sink.frames().len(), 5);
    assert_eq!(orch.state(), &RunState::Failed(FailureKind::Interrupted));
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let token = CancelToken::new();
    token.cancel();
    let mut orch = orchestrator(3).with_cancel(token);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    let err = orch.run_into(&mut sink).unwrap_err();
    assert!(err.is_interrupted());
    assert!(sink.frames().is_empty());
    assert!(sink.was_aborted());
}

#[test]
fn broken_stream_aborts_and_reports_last_frame() {
    let mut orch = orchestrator(6);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap()).breaking_after(2);
    let err = orch.run_into(&mut sink).unwrap_err();

    match err {
        ReelError::StreamClosed { last_written, .. } => assert_eq!(last_written, Some(1)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sink.was_aborted());
    assert_eq!(orch.state(), &RunState::Failed(FailureKind::StreamClosed));
}

#[test]
fn encoder_failure_carries_exit_code() {
    let mut orch = orchestrator(2);
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap()).exiting_with(3);
    let err = orch.run_into(&mut sink).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert_eq!(
        orch.state(),
        &RunState::Failed(FailureKind::EncoderFailed(Some(3)))
    );
    // The encoder already exited on its own; nothing left to abort.
    assert!(!sink.was_aborted());
}

#[test]
fn pipelined_output_matches_sequential() {
    let p = SimulationParams {
        noise_amplitude: 0.02,
        ..params(7)
    };
    let mut seq = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    Orchestrator::new(p.clone(), Box::new(Grayscale))
        .run_into(&mut seq)
        .unwrap();

    let mut piped = InMemorySink::new(FrameSize::new(8, 6).unwrap());
    let report = Orchestrator::new(p, Box::new(Grayscale))
        .with_options(RunOptions { pipelined: true })
        .run_into(&mut piped)
        .unwrap();

    assert_eq!(report.frames_written, 7);
    assert_eq!(seq.stream_bytes(), piped.stream_bytes());
}

#[test]
fn pipelined_broken_stream_aborts() {
    let mut orch = orchestrator(6).with_options(RunOptions { pipelined: true });
    let mut sink = InMemorySink::new(FrameSize::new(8, 6).unwrap()).breaking_after(3);
    let err = orch.run_into(&mut sink).unwrap_err();
    assert!(matches!(err, ReelError::StreamClosed { .. }));
    assert!(sink.was_aborted());
    assert_eq!(sink.frames().len(), 3);
}

#[test]
fn from_config_applies_preview_and_palette_fallback() {
    let mut cfg = RunConfig::default();
    cfg.simulation.width = 4;
    cfg.simulation.height = 4;
    cfg.preview = true;
    cfg.palette = "gray".to_string();
    let orch = Orchestrator::from_config(&cfg);
    assert_eq!(orch.params().frame_count, crate::session::config::PREVIEW_FRAME_CAP);
    assert_eq!(orch.state(), &RunState::Configuring);
}

#[test]
fn failure_kind_covers_taxonomy() {
    assert_eq!(
        FailureKind::from(&ReelError::Interrupted { frames_written: 1 }),
        FailureKind::Interrupted
    );
    assert_eq!(
        FailureKind::from(&ReelError::EncoderFailed {
            code: None,
            stderr: String::new()
        }),
        FailureKind::EncoderFailed(None)
    );
    assert_eq!(
        FailureKind::from(&ReelError::Other(anyhow::anyhow!("x"))),
        FailureKind::Other
    );
}

/// Trips the token on the third write and fails that write, like an encoder that died from
/// the same interrupt.
struct DiesOnInterrupt {
    inner: InMemorySink,
    token: CancelToken,
}

impl FrameSink for DiesOnInterrupt {
    fn write_frame(&mut self, idx: FrameIndex, frame: &FrameBuffer) -> ReelResult<()> {
        if self.inner.frames_written() == 2 {
            self.token.cancel();
            return Err(ReelError::stream_closed(
                Some(1),
                "write to encoder failed: Broken pipe",
            ));
        }
        self.inner.write_frame(idx, frame)
    }

    fn finish(&mut self) -> ReelResult<EncoderExit> {
        self.inner.finish()
    }

    fn abort(&mut self) -> ReelResult<()> {
        self.inner.abort()
    }

    fn state(&self) -> EncoderState {
        self.inner.state()
    }

    fn frames_written(&self) -> u64 {
        self.inner.frames_written()
    }
}

#[test]
fn broken_stream_after_cancel_is_reported_as_interrupt() {
    for pipelined in [false, true] {
        let token = CancelToken::new();
        let mut orch = orchestrator(10)
            .with_cancel(token.clone())
            .with_options(RunOptions { pipelined });
        let mut sink = DiesOnInterrupt {
            inner: InMemorySink::new(FrameSize::new(8, 6).unwrap()),
            token,
        };
        let err = orch.run_into(&mut sink).unwrap_err();

        assert!(
            matches!(err, ReelError::Interrupted { frames_written: 2 }),
            "pipelined={pipelined}: {err:?}"
        );
        assert_eq!(err.exit_code(), 130);
        assert!(sink.inner.was_aborted());
        assert_eq!(orch.state(), &RunState::Failed(FailureKind::Interrupted));
    }
}
