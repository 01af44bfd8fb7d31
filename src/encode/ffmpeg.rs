use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use crate::encode::sink::{EncoderExit, EncoderState, FrameSink, WriteGuard};
use crate::foundation::core::{Fps, FrameIndex, FrameSize};
use crate::foundation::error::{ReelError, ReelResult};
use crate::tone::frame::FrameBuffer;

/// Default encoder executable, resolved through `PATH`.
pub const DEFAULT_ENCODER_PROGRAM: &str = "ffmpeg";

/// Output codec settings passed to ffmpeg.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    /// FFV1 intra-only lossless, kept in `rgb24`. Large files, universal decoders.
    Ffv1,
    /// H.264 lossless (`-crf 0`), `yuv444p`. Broadest player compatibility.
    Libx264,
    /// HEVC lossless (`-x265-params lossless=1`), `yuv444p`. Best compression.
    #[default]
    Libx265,
}

impl CodecProfile {
    /// Every profile, in CLI order.
    pub const ALL: [CodecProfile; 3] = [Self::Ffv1, Self::Libx264, Self::Libx265];

    /// Profile name as accepted by [`CodecProfile::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Ffv1 => "ffv1",
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
        }
    }

    /// Parse a profile name (case-insensitive).
    pub fn from_name(name: &str) -> ReelResult<Self> {
        let key = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == key)
            .ok_or_else(|| {
                ReelError::configuration(format!(
                    "unknown codec profile '{name}' (expected ffv1, libx264 or libx265)"
                ))
            })
    }

    fn output_args(self) -> &'static [&'static str] {
        match self {
            Self::Ffv1 => &["-c:v", "ffv1", "-pix_fmt", "rgb24"],
            Self::Libx264 => &[
                "-c:v", "libx264", "-crf", "0", "-preset", "veryslow", "-pix_fmt", "yuv444p",
            ],
            Self::Libx265 => &[
                "-c:v",
                "libx265",
                "-preset",
                "veryslow",
                "-x265-params",
                "lossless=1",
                "-pix_fmt",
                "yuv444p",
            ],
        }
    }
}

impl std::fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to launch the encoder.
#[derive(Clone, Debug)]
pub struct EncoderOpts {
    /// Executable to launch.
    pub program: OsString,
    /// Output video path.
    pub out_path: PathBuf,
    /// Overwrite `out_path` if it already exists.
    pub overwrite: bool,
    /// Codec profile.
    pub codec: CodecProfile,
    /// Frame dimensions of the raw input.
    pub size: FrameSize,
    /// Nominal input frame rate.
    pub fps: Fps,
}

impl EncoderOpts {
    /// Options for `ffmpeg` writing `out_path`.
    pub fn new(out_path: impl Into<PathBuf>, size: FrameSize, fps: Fps) -> Self {
        Self {
            program: OsString::from(DEFAULT_ENCODER_PROGRAM),
            out_path: out_path.into(),
            overwrite: true,
            codec: CodecProfile::default(),
            size,
            fps,
        }
    }

    /// Arguments after the program name.
    ///
    /// Input is headerless `rgb24` on stdin at a fixed size and rate.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        args.push(if self.overwrite { "-y" } else { "-n" }.into());
        for a in ["-loglevel", "error", "-f", "rawvideo", "-pixel_format", "rgb24"] {
            args.push(a.into());
        }
        args.push("-video_size".into());
        args.push(self.size.to_ffmpeg_arg().into());
        args.push("-framerate".into());
        args.push(self.fps.to_ffmpeg_arg().into());
        args.push("-i".into());
        args.push("-".into());
        args.push("-an".into());
        for a in self.codec.output_args() {
            args.push((*a).into());
        }
        args.push(self.out_path.clone().into_os_string());
        args
    }

    /// Build the process command.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args());
        cmd
    }

    /// Shell-like rendering of the command, for diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Streams raw frames into a child process's stdin.
///
/// The child's stderr is drained on a background thread so a chatty encoder can never stall
/// on its own output while we block writing frames.
pub struct FfmpegStreamer {
    size: FrameSize,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    state: EncoderState,
    guard: WriteGuard,
    exit: Option<EncoderExit>,
}

impl std::fmt::Debug for FfmpegStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegStreamer")
            .field("size", &self.size)
            .field("pid", &self.child.as_ref().map(Child::id))
            .field("state", &self.state)
            .field("frames_written", &self.guard.written)
            .finish()
    }
}

impl FfmpegStreamer {
    /// Launch the encoder described by `opts`.
    pub fn spawn(opts: &EncoderOpts) -> ReelResult<Self> {
        ensure_parent_dir(&opts.out_path)?;
        if !opts.overwrite && opts.out_path.exists() {
            return Err(ReelError::configuration(format!(
                "output file '{}' already exists",
                opts.out_path.display()
            )));
        }
        tracing::debug!(command = %opts.command_line(), "spawning encoder");
        Self::spawn_command(opts.command(), opts.size)
    }

    /// Launch an arbitrary command that reads `size`-sized `rgb24` frames on stdin.
    pub fn spawn_command(mut cmd: Command, size: FrameSize) -> ReelResult<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // Own process group: a terminal Ctrl-C reaches only us, and `abort` stops the encoder.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            cmd.process_group(0);
        }

        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut child = cmd.spawn().map_err(|e| {
            ReelError::encoder_unavailable(format!(
                "failed to spawn '{program}' (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(mut stderr)) = (stdin, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ReelError::encoder_unavailable(format!(
                "failed to open pipes to '{program}'"
            )));
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            size,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            state: EncoderState::Spawned,
            guard: WriteGuard::default(),
            exit: None,
        })
    }

    /// OS process id, while the child is still owned.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// How the child ended, once reaped by `finish` or `abort`.
    pub fn exit(&self) -> Option<&EncoderExit> {
        self.exit.as_ref()
    }

    fn last_written(&self) -> Option<u64> {
        self.guard.last_idx.map(|i| i.0)
    }

    fn reap(&mut self, status: ExitStatus) -> EncoderExit {
        let stderr = match self.stderr_drain.take().map(JoinHandle::join) {
            Some(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Some(Ok(Err(e))) => format!("<stderr read failed: {e}>"),
            Some(Err(_)) => "<stderr drain thread panicked>".to_string(),
            None => String::new(),
        };
        let exit = EncoderExit {
            code: status.code(),
            stderr,
        };
        self.exit = Some(exit.clone());
        exit
    }
}

impl FrameSink for FfmpegStreamer {
    fn write_frame(&mut self, idx: FrameIndex, frame: &FrameBuffer) -> ReelResult<()> {
        let last = self.last_written();
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::stream_closed(
                last,
                "encoder input is already closed",
            ));
        };
        self.guard.check(idx, frame, self.size)?;

        // Blocks while the pipe is full; that is the back-pressure path, not an error.
        stdin
            .write_all(&frame.data)
            .map_err(|e| ReelError::stream_closed(last, format!("write to encoder failed: {e}")))?;

        self.guard.record(idx);
        self.state = EncoderState::Streaming;
        Ok(())
    }

    fn finish(&mut self) -> ReelResult<EncoderExit> {
        match &self.state {
            EncoderState::Exited(_) => {
                if let Some(exit) = &self.exit {
                    return Ok(exit.clone());
                }
            }
            EncoderState::Failed(reason) => {
                return Err(ReelError::stream_closed(
                    self.last_written(),
                    format!("cannot finish encoder: {reason}"),
                ));
            }
            _ => {}
        }

        // Dropping stdin is the end-of-stream signal.
        drop(self.stdin.take());
        self.state = EncoderState::Closing;

        let mut child = self.child.take().ok_or_else(|| {
            ReelError::Other(anyhow::anyhow!("encoder process handle missing"))
        })?;
        let status = child.wait().map_err(|e| {
            self.state = EncoderState::Failed(format!("wait failed: {e}"));
            ReelError::Other(anyhow::Error::new(e).context("failed to wait for encoder"))
        })?;

        let exit = self.reap(status);
        self.state = EncoderState::Exited(exit.code);
        Ok(exit)
    }

    fn abort(&mut self) -> ReelResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            self.state = EncoderState::Failed("aborted".to_string());
            return Ok(());
        };
        // Already-exited children make `kill` fail with InvalidInput; `wait` still reaps them.
        if let Err(e) = child.kill()
            && e.kind() != std::io::ErrorKind::InvalidInput
        {
            tracing::warn!(error = %e, "failed to kill encoder");
        }
        let status = child.wait().map_err(|e| {
            ReelError::Other(anyhow::Error::new(e).context("failed to reap aborted encoder"))
        });
        self.state = EncoderState::Failed("aborted".to_string());
        let exit = self.reap(status?);
        tracing::debug!(code = ?exit.code, "encoder aborted");
        Ok(())
    }

    fn state(&self) -> EncoderState {
        self.state.clone()
    }

    fn frames_written(&self) -> u64 {
        self.guard.written
    }
}

impl Drop for FfmpegStreamer {
    fn drop(&mut self) {
        if self.child.is_some() {
            let _ = self.abort();
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `program -version` runs successfully.
pub fn is_encoder_available(program: impl AsRef<std::ffi::OsStr>) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
