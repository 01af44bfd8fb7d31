/// Convenience result type used across fieldreel.
pub type ReelResult<T> = Result<T, ReelError>;

/// Exit code reported when the encoder executable cannot be launched.
pub const EXIT_ENCODER_NOT_FOUND: i32 = 127;
/// Exit code reported when the run was cancelled by the user.
pub const EXIT_INTERRUPTED: i32 = 130;
/// Exit code reported for invalid configuration.
pub const EXIT_CONFIGURATION: i32 = 2;

/// Top-level error taxonomy for a generation run.
///
/// None of these are retried. `PaletteUnavailable` is the only variant that is recovered
/// locally (see [`crate::resolve_palette`]); every other variant terminates the run.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid parameters, detected before any resource is acquired.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The external encoder could not be located or spawned.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The encoder's input pipe broke mid-run.
    #[error("stream closed (last written frame: {}): {reason}", fmt_last(.last_written))]
    StreamClosed {
        /// Index of the last frame fully handed to the encoder, if any.
        last_written: Option<u64>,
        /// Underlying failure description.
        reason: String,
    },

    /// The encoder ran to completion but reported failure.
    #[error("encoder failed with {}: {stderr}", fmt_code(.code))]
    EncoderFailed {
        /// Exit code, `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Trimmed encoder stderr.
        stderr: String,
    },

    /// The run was cancelled externally; the encoder has been terminated and reaped.
    #[error("interrupted after {frames_written} frame(s)")]
    Interrupted {
        /// Frames fully written before cancellation was observed.
        frames_written: u64,
    },

    /// Requested palette is missing.
    #[error("palette unavailable: {0}")]
    PaletteUnavailable(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn fmt_last(last: &Option<u64>) -> String {
    match last {
        Some(i) => i.to_string(),
        None => "none".to_string(),
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "termination by signal".to_string(),
    }
}

impl ReelError {
    /// Build a [`ReelError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`ReelError::EncoderUnavailable`] value.
    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable(msg.into())
    }

    /// Build a [`ReelError::StreamClosed`] value.
    pub fn stream_closed(last_written: Option<u64>, reason: impl Into<String>) -> Self {
        Self::StreamClosed {
            last_written,
            reason: reason.into(),
        }
    }

    /// Build a [`ReelError::PaletteUnavailable`] value.
    pub fn palette_unavailable(msg: impl Into<String>) -> Self {
        Self::PaletteUnavailable(msg.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::EncoderUnavailable(_) => EXIT_ENCODER_NOT_FOUND,
            Self::Interrupted { .. } => EXIT_INTERRUPTED,
            Self::EncoderFailed { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }

    /// Return `true` for the controlled-abort path.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
