//! fieldreel generates deterministic videos of an evolving 2-D scalar field.
//!
//! A seeded random grid is advanced by a toroidal 3x3 smoothing stencil, a slow sinusoidal
//! wave, optional Gaussian noise and a whole-field drift. Each step is tone-mapped to `rgb24`
//! and streamed into an external encoder:
//!
//! - Describe a run with [`RunConfig`] / [`SimulationParams`]
//! - Drive it with an [`Orchestrator`] into any [`FrameSink`] ([`FfmpegStreamer`] for video)
//! - Or render single frames with [`FrameGenerator`] / [`render_frame`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
pub(crate) mod sim;
pub(crate) mod tone;

/// Encoder sinks.
pub mod encode;
/// Run configuration and orchestration.
pub mod session;

pub use crate::foundation::core::{Fps, FrameIndex, FrameSize, RGB_CHANNELS};
pub use crate::foundation::error::{
    EXIT_CONFIGURATION, EXIT_ENCODER_NOT_FOUND, EXIT_INTERRUPTED, ReelError, ReelResult,
};

pub use crate::sim::grid::Grid;
pub use crate::sim::rng::FieldRng;
pub use crate::sim::stencil::{
    DriftParams, EvolveParams, Evolver, MAX_DRIFT_CELLS, StencilWeights, WaveParams, evolve,
};

#[cfg(feature = "colormaps")]
pub use crate::tone::palette::GradientCatalog;
pub use crate::tone::frame::FrameBuffer;
pub use crate::tone::mapper::{ToneMapper, ToneParams, map_grid};
pub use crate::tone::palette::{
    DEFAULT_RAMP_NAME, GRAYSCALE_NAME, Grayscale, GrayscaleOnly, Palette, PaletteCatalog,
    RAMP_LEN, RampPalette, ResolvedPalette, default_catalog, is_grayscale_name, lookup_palette,
    resolve_palette, resolve_palette_in,
};

pub use crate::encode::ffmpeg::{
    CodecProfile, DEFAULT_ENCODER_PROGRAM, EncoderOpts, FfmpegStreamer, ensure_parent_dir,
    is_encoder_available,
};
pub use crate::encode::sink::{EncoderExit, EncoderState, FrameSink, InMemorySink};

pub use crate::session::config::{PREVIEW_FRAME_CAP, RunConfig, SimulationParams};
pub use crate::session::control::{CancelToken, LogProgress, NoProgress, ProgressSink};
pub use crate::session::generator::{FrameGenerator, render_frame};
pub use crate::session::run::{
    FailureKind, Orchestrator, RunOptions, RunReport, RunState, generate_video,
};
