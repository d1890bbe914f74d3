//! Specan - microphone driven LED strip visualizer
//!
//! Wires the microphone, the pipeline and the LED strip together and acts as
//! the supervisor: the pipeline reports faults, this process decides to exit
//! so the service manager can restart it with a fresh audio driver.
//!
//! SIGINT and SIGTERM take the orderly path instead: the strip is cleared and
//! pending settings are written before the microphone is released.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, select, Receiver};
use specan_core::{
    build_displays, AudioLeds, Fault, MicCapture, PcmHandoff, PipelineConfig, PipelineIo,
    SettingsStore,
};
use specan_platform::{create_strip, NoControls, RemoteControl, RemoteListener, StripKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "specan=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StripArg {
    /// Draw the strip as colored blocks on stdout
    Terminal,
    /// Discard every frame
    Null,
}

impl From<StripArg> for StripKind {
    fn from(arg: StripArg) -> Self {
        match arg {
            StripArg::Terminal => StripKind::Terminal,
            StripArg::Null => StripKind::Null,
        }
    }
}

#[derive(Parser)]
#[command(name = "specan")]
#[command(about = "Turn microphone audio into LED strip animations")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of LEDs on the strip
    #[arg(long)]
    leds: Option<usize>,

    /// Capture sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// FFT window size (power of two)
    #[arg(long)]
    fft_size: Option<usize>,

    /// Listen for remote control commands on this TCP port
    #[arg(long)]
    remote_port: Option<u16>,

    /// Settings file; the platform config directory when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// LED strip backend
    #[arg(long, value_enum, default_value = "terminal")]
    strip: StripArg,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(leds) = self.leds {
            config.num_leds = leds;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(fft_size) = self.fft_size {
            config.fft_size = fft_size;
        }
        if self.remote_port.is_some() {
            config.remote_port = self.remote_port;
        }

        config.check().context("Invalid pipeline configuration")?;
        Ok(config)
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Why the supervisor stopped waiting
#[derive(Debug, PartialEq)]
enum Exit {
    Fault(Fault),
    Signal,
    /// Every fault sender is gone without reporting
    PipelineGone,
}

fn wait_for_exit(faults: &Receiver<Fault>, stop: &Receiver<()>) -> Exit {
    select! {
        recv(faults) -> fault => match fault {
            Ok(fault) => Exit::Fault(fault),
            Err(_) => Exit::PipelineGone,
        },
        recv(stop) -> _ => Exit::Signal,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);

    info!("Starting Specan");

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install signal handler")?;

    let config = cli.pipeline_config()?;
    let settings = SettingsStore::open(cli.settings.clone());
    if let Some(path) = settings.path() {
        info!("Settings file: {}", path.display());
    }

    let remote = config
        .remote_port
        .map(|_| Arc::new(RemoteControl::new(config.remote_levels)));
    let _listener = match (config.remote_port, &remote) {
        (Some(port), Some(remote)) => Some(
            RemoteListener::bind(port, Arc::clone(remote))
                .with_context(|| format!("Failed to start remote control on port {port}"))?,
        ),
        _ => None,
    };

    let displays = build_displays(&config).context("Failed to build displays")?;
    let handoff = Arc::new(PcmHandoff::new());

    let capture = MicCapture::start(config.sample_rate, config.channels, Arc::clone(&handoff))
        .context("Failed to start microphone capture")?;
    info!("Microphone: {}", capture.device_name());

    let io = PipelineIo {
        strip: create_strip(cli.strip.into(), config.num_leds),
        knobs: Box::new(NoControls),
        controls: Box::new(NoControls),
        remote,
        settings,
    };
    let (mut pipeline, faults) = AudioLeds::start(&config, displays, handoff, io)
        .context("Failed to start pipeline")?;

    // Supervisor: a fault means the audio driver is wedged and only a fresh
    // process recovers it
    let exit = wait_for_exit(&faults, &stop_rx);
    match &exit {
        Exit::Fault(fault) => error!("Fatal pipeline fault: {}", fault),
        Exit::Signal => info!("Shutdown requested"),
        Exit::PipelineGone => info!("Pipeline finished"),
    }

    pipeline.shutdown();
    drop(capture);

    if matches!(exit, Exit::Fault(_)) {
        std::process::exit(1);
    }
    Ok(())
}
