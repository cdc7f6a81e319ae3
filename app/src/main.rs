//! Gesture FX host process
//!
//! Loads an audio file, loops it through the effects engine and reads
//! control actions from stdin, one name per line (`increase_bass`,
//! `toggle_echo`, ...). Anything that can produce those names, such as a
//! gesture tracker, can be piped in.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gesture_fx_core::{Action, AudioEngine, AudioSource, EngineConfig, Event};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time audio effects driven by named control actions", long_about = None)]
struct Cli {
    /// Audio file to loop (WAV, FLAC, OGG, MP3, ...)
    audio: PathBuf,

    /// JSON engine configuration; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device buffer size in frames (overrides the config file)
    #[arg(long)]
    buffer_size: Option<u32>,

    /// Device channel count (overrides the config file)
    #[arg(long)]
    channels: Option<u16>,

    /// Print the status as JSON instead of the one-line summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let source = AudioSource::load(&cli.audio)
        .with_context(|| format!("failed to load {}", cli.audio.display()))?;
    info!(
        path = %cli.audio.display(),
        seconds = source.duration_secs(),
        "loaded audio source"
    );

    let mut engine = AudioEngine::new(source, config).context("failed to open audio output")?;
    engine.start().context("failed to start playback")?;

    let result = control_loop(&engine, cli.json);
    engine.shutdown();
    drain_events(&engine);
    result
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gesture_fx=info,gesture_fx_core=info")),
        )
        .try_init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(buffer_size) = cli.buffer_size {
        config.stream.buffer_size = buffer_size;
    }
    if let Some(channels) = cli.channels {
        config.stream.channels = channels;
    }
    config.validate().context("invalid stream settings")?;
    Ok(config)
}

/// Apply one action per stdin line until `q` or end of input
fn control_loop(engine: &AudioEngine, json: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print_help(&mut stdout)?;
    print_status(&mut stdout, engine, json)?;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let command = line.trim();

        match command {
            "" => continue,
            "q" | "quit" => break,
            "status" => {}
            "help" => {
                print_help(&mut stdout)?;
                continue;
            }
            name => {
                if !engine.apply_named(name) {
                    warn!("Unknown action: {}", name);
                    continue;
                }
            }
        }

        print_status(&mut stdout, engine, json)?;
        drain_events(engine);
    }

    Ok(())
}

fn print_status(out: &mut impl Write, engine: &AudioEngine, json: bool) -> Result<()> {
    let status = engine.status_view();
    if json {
        writeln!(out, "{}", serde_json::to_string(&status)?)?;
    } else {
        writeln!(out, "{}", status)?;
    }
    out.flush()?;
    Ok(())
}

fn print_help(out: &mut impl Write) -> Result<()> {
    let names: Vec<&str> = Action::ALL.iter().map(|a| a.as_str()).collect();
    writeln!(out, "actions: {}", names.join(", "))?;
    writeln!(out, "other: status, help, q")?;
    Ok(())
}

fn drain_events(engine: &AudioEngine) {
    while let Some(event) = engine.poll_event() {
        match event {
            Event::Error { message } => warn!("Audio device error: {}", message),
            other => info!(?other, "engine event"),
        }
    }
}
