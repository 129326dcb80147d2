//! Ember binary: wake-word voice assistant

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ember::audio::{self, tones, CaptureSource, OutputMixer};
use ember::{state, AppContext, Settings};

#[derive(Parser)]
#[command(name = "ember", version, about = "Wake-word voice assistant with timers and reminders")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a settings file (defaults to ember.toml)
    #[arg(long, env = "EMBER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show microphone input levels
    TestMic {
        /// How long to monitor, in seconds
        #[arg(long, default_value_t = 5)]
        duration: u64,
    },
    /// Play the feedback tones through the output device
    TestSpeaker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load().context("loading settings")?,
    };

    match cli.command {
        Some(Command::TestMic { duration }) => test_mic(duration),
        Some(Command::TestSpeaker) => test_speaker(),
        None => run_assistant(settings).await,
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info,ember=info",
        1 => "debug,ember=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_assistant(settings: Settings) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let interrupt = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
                // Break any blocked listening wait
                interrupt.store(true, Ordering::SeqCst);
            }
        });
    }

    // The audio streams are not Send, so the whole engine lives on one
    // blocking thread
    tokio::task::spawn_blocking(move || {
        let mut ctx = AppContext::build(settings, shutdown, interrupt)?;
        state::run(&mut ctx)
    })
    .await
    .context("conversation thread panicked")?
    .context("assistant failed")?;

    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = CaptureSource::new().context("opening microphone")?;
    let frames = capture.subscribe();
    capture.start().context("starting capture")?;

    println!("Monitoring microphone for {duration} seconds...");
    let deadline = Instant::now() + Duration::from_secs(duration);
    while Instant::now() < deadline {
        match frames.recv_timeout(Duration::from_millis(250)) {
            Ok(frame) => {
                let rms = audio::rms(&frame);
                let bars = "#".repeat(((rms * 300.0) as usize).min(50));
                println!("rms {rms:.4} |{bars:<50}|");
            }
            Err(_) => println!("rms ------ (no audio)"),
        }
    }

    capture.stop();
    Ok(())
}

fn test_speaker() -> anyhow::Result<()> {
    let mixer = OutputMixer::new().context("opening output device")?;
    let handle = mixer.handle();

    println!("Playing listening cue...");
    handle.queue_blocking(tones::listening_tone(), audio::OUTPUT_SAMPLE_RATE, || false)?;
    println!("Playing done cue...");
    handle.queue_blocking(tones::done_tone(), audio::OUTPUT_SAMPLE_RATE, || false)?;
    println!("Playing reminder chime...");
    handle.queue_blocking(tones::ding_fallback(), audio::OUTPUT_SAMPLE_RATE, || false)?;
    println!("Playing 440 Hz test tone...");
    handle.queue_blocking(
        tones::generate_tone(440.0, 1.0, 0.3, 0.02),
        audio::OUTPUT_SAMPLE_RATE,
        || false,
    )?;

    Ok(())
}
