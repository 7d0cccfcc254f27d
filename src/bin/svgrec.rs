use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use svgrec::{
    Capabilities, FfmpegStreamEncoder, IntervalTicks, Placeholders, RawFields, SessionConfig,
    SessionManager, SimulatedTicks, StreamEncoder, SvgSource, TickSource,
};

#[derive(Parser, Debug)]
#[command(name = "svgrec", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record an SVG into a video file or a numbered PNG sequence.
    Record(RecordArgs),
    /// List the output formats available on this machine.
    Formats(FormatsArgs),
}

#[derive(Parser, Debug)]
struct FormatsArgs {
    /// Print the list as JSON (`[{"label": ..., "value": ...}]`).
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Input SVG file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// JSON file with default field values; flags override it.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Output width in pixels (defaults to the SVG's natural width).
    #[arg(long)]
    width: Option<String>,

    /// Output height in pixels (defaults to the SVG's natural height).
    #[arg(long)]
    height: Option<String>,

    /// Capture duration in milliseconds.
    #[arg(long)]
    duration: Option<String>,

    /// Frames per second.
    #[arg(long)]
    framerate: Option<String>,

    /// Background color as `#rrggbb`.
    #[arg(long)]
    background: Option<String>,

    /// Output format: `image/png` or a video mime type such as `video/webm;codecs=vp9`.
    #[arg(long)]
    format: Option<String>,

    /// Keep the aspect ratio when only one of width/height is given.
    #[arg(long)]
    link_dimensions: bool,

    /// Where scheduler ticks come from.
    #[arg(long, value_enum, default_value_t = ClockChoice::Realtime)]
    clock: ClockChoice,

    /// Tick rate of the scheduler in Hz.
    #[arg(long, default_value_t = svgrec::ticks::DEFAULT_REFRESH_HZ)]
    refresh_hz: u32,

    /// How long to wait for in-flight frame encodes after the capture window closes.
    #[arg(long, default_value_t = 250)]
    finalize_grace_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClockChoice {
    /// Wall-clock ticks at the refresh rate.
    Realtime,
    /// Synthetic ticks delivered as fast as possible.
    Simulated,
}

/// Field defaults read from `--options`.
#[derive(serde::Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<u32>,
    framerate: Option<u32>,
    background: Option<String>,
    format: Option<String>,
    link_dimensions: Option<bool>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Record(args) => cmd_record(args).await,
        Command::Formats(args) => cmd_formats(args),
    }
}

fn read_options_file(path: &Path) -> anyhow::Result<OptionsFile> {
    let f = File::open(path).with_context(|| format!("open options '{}'", path.display()))?;
    let r = BufReader::new(f);
    let opts: OptionsFile =
        serde_json::from_reader(r).with_context(|| "parse options JSON")?;
    Ok(opts)
}

fn pick(flag: Option<String>, file: Option<impl ToString>, default: &str) -> String {
    flag.or_else(|| file.map(|v| v.to_string()))
        .unwrap_or_else(|| default.to_owned())
}

async fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let file = match &args.options {
        Some(path) => read_options_file(path)?,
        None => OptionsFile::default(),
    };

    let source = Arc::new(SvgSource::from_path(&args.in_path)?);
    let source_name = source.name().to_owned();
    let placeholders = Placeholders::for_source(&source);

    let raw = RawFields {
        svg: Some(source),
        width: pick(args.width, file.width, ""),
        height: pick(args.height, file.height, ""),
        duration: pick(args.duration, file.duration, ""),
        framerate: pick(args.framerate, file.framerate, ""),
        background: pick(args.background, file.background, "#ffffff"),
        format: pick(args.format, file.format, svgrec::encode::format::STILL_MIME_TYPE),
        link_dimensions: args.link_dimensions || file.link_dimensions.unwrap_or(false),
    };

    let options = match svgrec::normalize(&raw, &placeholders) {
        Ok(options) => options,
        Err(errors) => {
            for e in errors.iter() {
                eprintln!("  {e}");
            }
            anyhow::bail!("invalid options ({} problem(s))", errors.len());
        }
    };

    let ticks: Box<dyn TickSource> = match args.clock {
        ClockChoice::Realtime => Box::new(IntervalTicks::new(args.refresh_hz)?),
        ClockChoice::Simulated => Box::new(SimulatedTicks::new(args.refresh_hz)?),
    };
    let stream_encoder: Box<dyn StreamEncoder> = Box::new(FfmpegStreamEncoder::new());
    let caps = Capabilities {
        ticks,
        stream_encoder: Some(stream_encoder),
        still_encoder: Arc::new(svgrec::PngEncoder),
    };

    let manager = SessionManager::with_config(SessionConfig {
        finalize_grace: Duration::from_millis(args.finalize_grace_ms),
    });
    let artifact = manager.record(options, caps).await?;

    let written = svgrec::deliver::deliver(&artifact, &source_name, &args.out)?;
    eprintln!("wrote {}", written.display());
    Ok(())
}

fn cmd_formats(args: FormatsArgs) -> anyhow::Result<()> {
    let encoder = FfmpegStreamEncoder::new();
    let formats = svgrec::supported_formats(|mime| encoder.is_type_supported(mime), true);
    if formats.is_empty() {
        anyhow::bail!("no supported output formats");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
        return Ok(());
    }
    for f in formats {
        println!("{}\t{}", f.label, f.value);
    }
    Ok(())
}
