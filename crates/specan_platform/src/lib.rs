//! Specan Platform - Hardware Contracts
//!
//! This crate provides the hardware-facing side of Specan:
//! - The `LedStrip` trait plus terminal, null and in-memory strips
//! - Level knobs and control surfaces polled by the pipeline
//! - The remote control command queue and its TCP listener
//!
//! # Architecture
//!
//! The pipeline only ever talks to the traits in this crate. A board with a
//! real strip, encoders and potentiometers plugs in its own implementations;
//! headless builds use `NoControls` and a terminal or null strip.

mod error;
mod led;
mod remote;
mod traits;

pub use error::PlatformError;
pub use led::{MemoryStrip, MemoryStripView, NullStrip, TerminalStrip};
pub use remote::{
    RemoteCommand, RemoteControl, RemoteListener, MAX_LINE_LEN, MAX_QUEUED_COMMANDS,
};
pub use traits::{ControlEvent, ControlSurface, FixedLevels, LedStrip, LevelKnobs, NoControls};

/// Strip backend selectable at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripKind {
    Terminal,
    Null,
}

/// Build the selected strip with `num_leds` LEDs
pub fn create_strip(kind: StripKind, num_leds: usize) -> Box<dyn LedStrip> {
    match kind {
        StripKind::Terminal => Box::new(TerminalStrip::stdout(num_leds)),
        StripKind::Null => Box::new(NullStrip::new(num_leds)),
    }
}
