//! Specan Core - Audio Pipeline
//!
//! This crate turns microphone audio into LED strip frames:
//! - Amplitude and spectrum displays with fade and peak-hold dynamics
//! - Gradient to color-mapping conversion, swappable while running
//! - Bounded-wait PCM hand-off between the capture callback and processing
//! - The `AudioLeds` orchestrator with its processing and monitor threads
//! - Microphone capture (via CPAL), configuration and persisted settings
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  push   ┌────────────┐  take_frame  ┌──────────────────┐
//! │ MicCapture   │ ──────▶ │ PcmHandoff │ ───────────▶ │ specan-processing│──▶ LedStrip
//! │ (CPAL thread)│         └────────────┘  (watchdog)  │  active display  │
//! └──────────────┘                                     └──────────────────┘
//!                                                               ▲ active index
//!                 ControlSurface / RemoteControl ──▶ specan-monitor ──▶ SettingsStore
//!                                                               │ Fault
//!                                                               ▼
//!                                                          supervisor
//! ```

mod config;
mod display;
mod error;
mod gradient;
mod handoff;
mod message;
mod pipeline;
mod settings;
mod stream;

pub use config::{
    default_displays, AmplitudeConfig, AmplitudeMode, DisplayConfig, FftDisplayConfig, FftMode,
    PeakMode, PipelineConfig,
};
pub use display::{
    build_displays, AmplitudeDisplay, AudioDisplay, ColorMapping, DisplayBase, FftDisplay,
};
pub use error::{EngineError, EngineResult};
pub use gradient::{hsv_to_rgb, Gradient, GradientPoint};
pub use handoff::{PcmHandoff, Take};
pub use message::Fault;
pub use pipeline::{AudioLeds, PipelineIo};
pub use settings::{PendingWrite, SavedGradient, Settings, SettingsStore, FLUSH_INTERVAL};
pub use stream::MicCapture;

// Re-export DSP types for convenience
pub use specan_dsp::{ColorScale, Rgb};
