//! Hardware Traits
//!
//! Defines the interface the pipeline uses to reach hardware: the LED strip
//! it renders into, the knobs it reads levels from, and the buttons/encoders
//! that drive gradient and display changes.

use serde::{Deserialize, Serialize};
use specan_dsp::Rgb;

use crate::error::PlatformError;

/// Addressable LED strip
///
/// `set` always receives exactly `num_leds()` colors and performs the whole
/// hardware transfer before returning.
pub trait LedStrip: Send {
    /// Short name for logging (e.g., "terminal", "null")
    fn name(&self) -> &'static str;

    fn num_leds(&self) -> usize;

    /// Write one full frame
    fn set(&mut self, colors: &[Rgb]) -> Result<(), PlatformError>;

    /// Turn every LED off
    fn clear(&mut self) -> Result<(), PlatformError> {
        let black = vec![Rgb::BLACK; self.num_leds()];
        self.set(&black)
    }
}

/// Gain and brightness inputs read by the processing loop
///
/// `None` means no such input is fitted (or it is currently not in
/// control), and the caller falls back to the next source.
pub trait LevelKnobs: Send + Sync {
    fn gain(&self) -> Option<i32>;

    /// Brightness multiplier, 0.0 to 1.0
    fn brightness(&self) -> Option<f32>;
}

/// Debounced user action from buttons, rotary encoders or a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlEvent {
    GradientNext,
    GradientPrev,
    DisplayNext,
    DisplayPrev,
    ToggleReverse,
    DeleteGradient,
}

/// Button/encoder panel polled by the monitor loop
pub trait ControlSurface: Send {
    /// Next pending event, if any; must not block
    fn poll(&mut self) -> Option<ControlEvent>;
}

/// Stand-in for a device with no knobs and no buttons
#[derive(Debug, Default, Clone, Copy)]
pub struct NoControls;

impl LevelKnobs for NoControls {
    fn gain(&self) -> Option<i32> {
        None
    }

    fn brightness(&self) -> Option<f32> {
        None
    }
}

impl ControlSurface for NoControls {
    fn poll(&mut self) -> Option<ControlEvent> {
        None
    }
}

/// Fixed knob positions, handy for headless runs and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLevels {
    pub gain: i32,
    pub brightness: f32,
}

impl LevelKnobs for FixedLevels {
    fn gain(&self) -> Option<i32> {
        Some(self.gain)
    }

    fn brightness(&self) -> Option<f32> {
        Some(self.brightness)
    }
}
