use std::path::{Path, PathBuf};

use crate::encode::ffmpeg::{CodecProfile, DEFAULT_ENCODER_PROGRAM, EncoderOpts};
use crate::foundation::core::{Fps, FrameSize};
use crate::foundation::error::{ReelError, ReelResult};
use crate::sim::stencil::{DriftParams, EvolveParams, StencilWeights, WaveParams};
use crate::tone::mapper::ToneParams;
use crate::tone::palette::DEFAULT_RAMP_NAME;

/// Frame count ceiling applied by preview mode.
pub const PREVIEW_FRAME_CAP: u64 = 300;

/// Immutable simulation bundle. Constructed once, validated, never mutated during a run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParams {
    /// Grid / frame width.
    pub width: u32,
    /// Grid / frame height.
    pub height: u32,
    /// Frames to produce.
    pub frame_count: u64,
    /// Seed for initialization and noise.
    pub seed: u64,
    /// Standard deviation of per-step Gaussian noise; `0` disables it.
    pub noise_amplitude: f64,
    /// Tone-mapping contrast multiplier.
    pub contrast: f64,
    /// Tone-mapping gamma.
    pub gamma: f64,
    /// Scales the wave perturbation.
    pub global_modulation: f64,
    /// Added to the frame index to form the evolution step index.
    pub time_step_offset: u64,
    /// Stencil kernel.
    pub weights: StencilWeights,
    /// Wave perturbation shape.
    pub wave: WaveParams,
    /// Whole-field drift.
    pub drift: DriftParams,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            frame_count: 10_000,
            seed: 1337,
            noise_amplitude: 0.0,
            contrast: 1.0,
            gamma: 1.0,
            global_modulation: 0.6,
            time_step_offset: 0,
            weights: StencilWeights::default(),
            wave: WaveParams::default(),
            drift: DriftParams::default(),
        }
    }
}

impl SimulationParams {
    /// Check every parameter; nothing is spawned or allocated before this passes.
    pub fn validate(&self) -> ReelResult<()> {
        self.size()?;
        self.tone().validate()?;
        if !self.noise_amplitude.is_finite() || self.noise_amplitude < 0.0 {
            return Err(ReelError::configuration(format!(
                "noise amplitude must be finite and >= 0, got {}",
                self.noise_amplitude
            )));
        }
        if !self.global_modulation.is_finite() {
            return Err(ReelError::configuration(
                "global modulation must be finite",
            ));
        }
        self.weights.validate()?;
        self.wave.validate()?;
        self.drift.validate()?;
        Ok(())
    }

    /// Validated frame size.
    pub fn size(&self) -> ReelResult<FrameSize> {
        FrameSize::new(self.width, self.height)
    }

    /// Parameters read by each evolution step.
    pub fn evolve(&self) -> EvolveParams {
        EvolveParams {
            weights: self.weights,
            wave: self.wave,
            drift: self.drift,
            noise_amplitude: self.noise_amplitude,
            global_modulation: self.global_modulation,
        }
    }

    /// Contrast and gamma.
    pub fn tone(&self) -> ToneParams {
        ToneParams {
            contrast: self.contrast,
            gamma: self.gamma,
        }
    }
}

/// Full configuration surface of a generation run, loadable from JSON.
///
/// Every field has a default, so a partial file is valid.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Simulation and tone parameters.
    pub simulation: SimulationParams,
    /// Nominal output frame rate.
    pub fps: u32,
    /// Output video path.
    pub output: PathBuf,
    /// Encoder codec profile.
    pub codec: CodecProfile,
    /// Palette name; unknown names fall back with a warning.
    pub palette: String,
    /// Cap the frame count at [`PREVIEW_FRAME_CAP`].
    pub preview: bool,
    /// Encoder executable.
    pub encoder_program: String,
    /// Overwrite an existing output file.
    pub overwrite: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationParams::default(),
            fps: 30,
            output: PathBuf::from("out.mkv"),
            codec: CodecProfile::default(),
            palette: DEFAULT_RAMP_NAME.to_string(),
            preview: false,
            encoder_program: DEFAULT_ENCODER_PROGRAM.to_string(),
            overwrite: true,
        }
    }
}

impl RunConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> ReelResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReelError::configuration(format!("invalid run config: {e}")))
    }

    /// Load a JSON file.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&text).map_err(|e| match e {
            ReelError::Configuration(msg) => {
                ReelError::configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> ReelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReelError::Other(anyhow::Error::new(e).context("serialize run config")))
    }

    /// Validate simulation and output settings.
    pub fn validate(&self) -> ReelResult<()> {
        self.simulation.validate()?;
        self.fps()?;
        if self.output.as_os_str().is_empty() {
            return Err(ReelError::configuration("output path must not be empty"));
        }
        if self.encoder_program.trim().is_empty() {
            return Err(ReelError::configuration(
                "encoder program must not be empty",
            ));
        }
        Ok(())
    }

    /// Validated frame rate.
    pub fn fps(&self) -> ReelResult<Fps> {
        Fps::whole(self.fps)
    }

    /// Frames to produce after applying preview mode.
    pub fn effective_frame_count(&self) -> u64 {
        if self.preview {
            self.simulation.frame_count.min(PREVIEW_FRAME_CAP)
        } else {
            self.simulation.frame_count
        }
    }

    /// Simulation parameters with preview mode applied.
    pub fn effective_simulation(&self) -> SimulationParams {
        SimulationParams {
            frame_count: self.effective_frame_count(),
            ..self.simulation.clone()
        }
    }

    /// Encoder launch options.
    pub fn encoder_opts(&self) -> ReelResult<EncoderOpts> {
        Ok(EncoderOpts {
            program: self.encoder_program.clone().into(),
            out_path: self.output.clone(),
            overwrite: self.overwrite,
            codec: self.codec,
            size: self.simulation.size()?,
            fps: self.fps()?,
        })
    }

    /// Raw bytes that will be streamed to the encoder.
    pub fn raw_stream_bytes(&self) -> u64 {
        let frame = u64::from(self.simulation.width) * u64::from(self.simulation.height) * 3;
        frame.saturating_mul(self.effective_frame_count())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
