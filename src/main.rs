//! Application entry point — Tuned.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse command-line arguments.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Build the codec adapter and start warming the engine.
//! 6. Run one recording session: start → record for the requested
//!    duration → stop → print the published artifact path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tuned::{
    codec::{CodecAdapter, FfmpegEngine},
    config::AppConfig,
    session::SessionController,
    source::{InputFile, InputMode, SystemSourceProvider},
};

// ---------------------------------------------------------------------------
// Command-line arguments
// ---------------------------------------------------------------------------

const USAGE: &str = "\
tuned — pitch-shifted recording sessions

USAGE:
    tuned [OPTIONS]

OPTIONS:
    --file <PATH>        Record from a WAV file instead of the microphone
    --pitch <SEMITONES>  Pitch offset, -12.0 to 12.0 (default: from config)
    --duration <SECS>    Recording length in seconds (default: 5)
    --output <DIR>       Directory to publish the recording into
    -h, --help           Print this help
";

struct CliArgs {
    file: Option<PathBuf>,
    pitch: Option<f32>,
    duration_secs: f32,
    output_dir: Option<PathBuf>,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Self {
            file: None,
            pitch: None,
            duration_secs: 5.0,
            output_dir: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--file requires a path"))?;
                    parsed.file = Some(PathBuf::from(value));
                }
                "--pitch" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--pitch requires a value"))?;
                    parsed.pitch = Some(value.parse()?);
                }
                "--duration" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--duration requires a value"))?;
                    parsed.duration_secs = value.parse()?;
                }
                "--output" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--output requires a directory"))?;
                    parsed.output_dir = Some(PathBuf::from(value));
                }
                "-h" | "--help" => {
                    print!("{USAGE}");
                    std::process::exit(0);
                }
                other => anyhow::bail!("unknown argument: {other}\n\n{USAGE}"),
            }
        }

        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Tuned starting up");

    // 2. Arguments
    let args = CliArgs::parse(std::env::args().skip(1))?;

    // 3. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 4. Tokio runtime (2 worker threads — session control + codec)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    rt.block_on(run(args, config))
}

async fn run(args: CliArgs, config: AppConfig) -> anyhow::Result<()> {
    // 5. Codec adapter — start warming the engine while the session records
    //    so the transcode at stop does not wait for the probe.
    let engine = FfmpegEngine::new(
        config.codec.ffmpeg_path.clone().map(PathBuf::from),
        config.codec.recipe(),
    );
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.resolved_dir());
    let codec = Arc::new(CodecAdapter::new(Arc::new(engine), output_dir));

    {
        let codec = Arc::clone(&codec);
        tokio::spawn(async move {
            if let Err(e) = codec.ensure_loaded().await {
                log::warn!("codec engine preload failed: {e}");
            }
        });
    }

    // 6. One recording session
    let pitch = args.pitch.unwrap_or_else(|| config.pitch.clamped());
    let mut controller = SessionController::new(
        Arc::new(SystemSourceProvider),
        codec,
        pitch,
        config.audio.monitor_enabled,
    );

    match &args.file {
        Some(path) => {
            controller.set_input_mode(InputMode::File);
            controller.set_input_file(Some(InputFile::from_path(path)?));
        }
        None => controller.set_input_mode(config.audio.input_mode),
    }

    controller.start().await?;
    log::info!(
        "recording for {:.1}s at {pitch:+.1} semitones (Ctrl-C aborts)",
        args.duration_secs
    );
    tokio::time::sleep(Duration::from_secs_f32(args.duration_secs.max(0.0))).await;
    controller.stop().await?;

    let snapshot = controller.snapshot();
    match snapshot.artifact_path {
        Some(path) => println!("{}", path.display()),
        None => anyhow::bail!("session finished without an artifact"),
    }
    Ok(())
}
