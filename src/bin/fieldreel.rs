use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "fieldreel", version, about = "Evolving scalar-field video generator")]
struct Cli {
    /// More log output (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the simulation into ffmpeg.
    Render(RenderArgs),
    /// Render a single frame as a PNG (no encoder needed).
    Frame(FrameArgs),
    /// Print the resolved configuration as JSON.
    Config(ConfigArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CodecArg {
    /// FFV1, rgb24, lossless.
    Ffv1,
    /// H.264, crf 0, yuv444p.
    Libx264,
    /// HEVC, lossless, yuv444p.
    Libx265,
}

impl From<CodecArg> for fieldreel::CodecProfile {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::Ffv1 => Self::Ffv1,
            CodecArg::Libx264 => Self::Libx264,
            CodecArg::Libx265 => Self::Libx265,
        }
    }
}

/// Parameters shared by every subcommand; each overrides the config file when set.
#[derive(Args, Debug, Default)]
struct SimArgs {
    /// JSON run config; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Number of frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Nominal frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Per-step Gaussian noise standard deviation.
    #[arg(long)]
    noise: Option<f64>,

    /// Contrast multiplier.
    #[arg(long)]
    contrast: Option<f64>,

    /// Gamma.
    #[arg(long)]
    gamma: Option<f64>,

    /// Palette name (`gray`, `plasma`, `viridis`, ...).
    #[arg(long)]
    palette: Option<String>,

    /// Cap the frame count for a quick look.
    #[arg(long)]
    preview: bool,
}

impl SimArgs {
    fn resolve(&self) -> anyhow::Result<fieldreel::RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => fieldreel::RunConfig::from_path(path)?,
            None => fieldreel::RunConfig::default(),
        };
        let sim = &mut cfg.simulation;
        if let Some(v) = self.width {
            sim.width = v;
        }
        if let Some(v) = self.height {
            sim.height = v;
        }
        if let Some(v) = self.frames {
            sim.frame_count = v;
        }
        if let Some(v) = self.seed {
            sim.seed = v;
        }
        if let Some(v) = self.noise {
            sim.noise_amplitude = v;
        }
        if let Some(v) = self.contrast {
            sim.contrast = v;
        }
        if let Some(v) = self.gamma {
            sim.gamma = v;
        }
        if let Some(v) = self.fps {
            cfg.fps = v;
        }
        if let Some(v) = &self.palette {
            cfg.palette = v.clone();
        }
        cfg.preview |= self.preview;
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    sim: SimArgs,

    /// Output video path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Codec profile.
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// Encoder executable.
    #[arg(long = "encoder-bin")]
    encoder_bin: Option<String>,

    /// Refuse to overwrite an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    /// Tone-map the next frame while the previous one is written.
    #[arg(long, default_value_t = false)]
    pipelined: bool,

    /// Log progress every N frames.
    #[arg(long, default_value_t = 100)]
    progress_every: u64,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    sim: SimArgs,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    #[command(flatten)]
    sim: SimArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let res = match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Config(args) => cmd_config(args),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<fieldreel::ReelError>()
        .map(fieldreel::ReelError::exit_code)
        .unwrap_or(1);
    u8::try_from(code.clamp(1, 255)).unwrap_or(1)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = args.sim.resolve()?;
    if let Some(out) = args.out {
        cfg.output = out;
    }
    if let Some(codec) = args.codec {
        cfg.codec = codec.into();
    }
    if let Some(bin) = args.encoder_bin {
        cfg.encoder_program = bin;
    }
    if args.no_overwrite {
        cfg.overwrite = false;
    }
    cfg.validate()?;

    let opts = cfg.encoder_opts()?;
    eprintln!("encoder: {}", opts.command_line());
    let frames = cfg.effective_frame_count();
    eprintln!(
        "streaming {} frame(s) of {}x{} ({:.1}s at {} fps, ~{:.2} GB raw)",
        frames,
        cfg.simulation.width,
        cfg.simulation.height,
        opts.fps.frames_to_secs(frames),
        opts.fps.to_ffmpeg_arg(),
        cfg.raw_stream_bytes() as f64 / 1e9
    );

    let cancel = fieldreel::CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install interrupt handler")?;

    let report = fieldreel::generate_video(
        &cfg,
        cancel,
        fieldreel::LogProgress::new(args.progress_every),
        fieldreel::RunOptions {
            pipelined: args.pipelined,
        },
    )?;

    eprintln!(
        "wrote {} ({} frames, palette {})",
        cfg.output.display(),
        report.frames_written,
        report.palette
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.sim.resolve()?;
    cfg.validate()?;
    let resolved = fieldreel::resolve_palette(&cfg.palette);
    let frame = fieldreel::render_frame(
        &cfg.simulation,
        resolved.palette,
        fieldreel::FrameIndex(args.frame),
    )?;

    fieldreel::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let cfg = args.sim.resolve()?;
    cfg.validate()?;
    println!("{}", cfg.to_json_pretty()?);
    Ok(())
}
