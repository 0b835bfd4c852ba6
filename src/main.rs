//! Hypnosis line player - main entry point
//!
//! Live mode synthesizes line audio in the background, loops an optional
//! background bed and mantra, and plays lines through two alternating
//! effect channels until the process is killed. Render mode writes the
//! whole session to a single WAV instead of playing it.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entrain::audio::CpalOutput;
use entrain::config::Settings;
use entrain::gen::{CommandEngine, GenerationWorker};
use entrain::lines::LineRegistry;
use entrain::playback::{channel_pair, RepeatingPlayer, Scheduler};
use entrain::render::MixRenderer;

/// Chunk sizes for device writes, in frames.
const BACKGROUND_CHUNK_FRAMES: usize = 8000;
const LINE_CHUNK_FRAMES: usize = 96_000;

/// Poll interval while waiting for the first generation pass.
const REGISTRY_WAIT: Duration = Duration::from_millis(100);

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "entrain")]
#[command(about = "Layered hypnosis line player")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "./config.toml")]
    config_filepath: PathBuf,

    /// Path to the source text file, one line per statement
    #[arg(long, default_value = "./lines.txt")]
    text_filepath: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Render all lines, background, and mantra into one file and exit
    #[arg(long)]
    render_mix: bool,

    /// Output file for the rendered mix
    #[arg(long, default_value = "full_mix.wav")]
    mix_output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "entrain=debug" } else { "entrain=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load(&args.config_filepath).with_context(|| {
        format!(
            "failed to load configuration from {}",
            args.config_filepath.display()
        )
    })?;

    if args.render_mix {
        let renderer = MixRenderer::new(
            args.text_filepath,
            settings.line_dir.clone(),
            settings.chooser,
            settings.effect_params(),
            settings.initial_line_delay,
            settings.mantra_start_delay,
            settings.background_path(),
            settings.mantra_filepath.clone(),
        );
        let engine = CommandEngine::new(settings.tts_command.clone());
        renderer
            .render(&engine, &args.mix_output)
            .context("mix render failed")?;
        return Ok(());
    }

    anyhow::ensure!(
        args.text_filepath.exists(),
        "text file {} not found",
        args.text_filepath.display()
    );

    // Line generation runs on its own thread, replacing the registry
    // whenever the source file changes.
    let registry = Arc::new(LineRegistry::new());
    let worker = GenerationWorker::new(
        args.text_filepath.clone(),
        settings.line_dir.clone(),
        Arc::clone(&registry),
        Box::new(CommandEngine::new(settings.tts_command.clone())),
    );
    thread::spawn(move || worker.run());

    // Wait for the first generation pass before starting any playback
    while registry.is_empty() {
        thread::sleep(REGISTRY_WAIT);
    }
    info!("Initial line generation complete, starting playback");

    if let Some(background) = settings.background_path() {
        thread::spawn(move || {
            let mut sink = match CpalOutput::open() {
                Ok(sink) => sink,
                Err(e) => {
                    error!("Cannot open background output: {}", e);
                    return;
                }
            };
            RepeatingPlayer::new(background).run(&mut sink, BACKGROUND_CHUNK_FRAMES);
        });
    }

    thread::sleep(Duration::from_secs_f64(settings.initial_line_delay));

    // Two playback channels: one starts its next line while the other's
    // echoes are still ringing out.
    let params = settings.effect_params();
    let mut handles = Vec::with_capacity(2);
    let mut channel_threads = Vec::with_capacity(2);
    for index in 0..2 {
        let (handle, channel) = channel_pair(params);
        handles.push(handle);
        channel_threads.push(thread::spawn(move || {
            let mut sink = match CpalOutput::open() {
                Ok(sink) => sink,
                Err(e) => {
                    error!("Cannot open output for channel {}: {}", index, e);
                    return;
                }
            };
            channel.run(&mut sink, LINE_CHUNK_FRAMES);
        }));
    }

    let channels = match <[_; 2]>::try_from(handles) {
        Ok(channels) => channels,
        Err(_) => unreachable!("exactly two channel handles"),
    };
    let chooser = settings.chooser.build(Arc::clone(&registry));
    info!("Starting scheduler with {} chooser", settings.chooser);
    thread::spawn(move || Scheduler::new(chooser, channels).run());

    if let Some(mantra) = settings.mantra_filepath.clone() {
        let delay = settings.mantra_start_delay;
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(delay));
            let mut sink = match CpalOutput::open() {
                Ok(sink) => sink,
                Err(e) => {
                    error!("Cannot open mantra output: {}", e);
                    return;
                }
            };
            RepeatingPlayer::new(mantra).run(&mut sink, BACKGROUND_CHUNK_FRAMES);
        });
    }

    // Runs until killed; the channel threads only exit if the scheduler
    // stops and drops their handles.
    for thread in channel_threads {
        if thread.join().is_err() {
            error!("Playback channel thread panicked");
        }
    }
    Ok(())
}
