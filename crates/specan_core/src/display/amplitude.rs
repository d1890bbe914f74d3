//! Amplitude Display
//!
//! Lights a bar whose length follows the loudest sample of each frame. The
//! bar snaps up instantly and falls back by `fade` LEDs per frame. An
//! optional peak marker rides above the bar and falls on its own, slowly at
//! first and faster the longer it has been since it was last pushed up.

use super::{AudioDisplay, DisplayBase};
use crate::config::{AmplitudeConfig, AmplitudeMode, PeakMode};
use crate::error::EngineResult;

/// Position value meaning nothing is lit
const NO_COLOR: f32 = -1.0;

/// LED 0 is always lit while there is sound, so it is kept dimmer
const FIRST_LED_BRIGHTNESS: f32 = 0.5;

/// Per-frame growth of the peak fade, relative to its starting value
const PEAK_FADE_ACCELERATION: f32 = 0.03;

pub struct AmplitudeDisplay {
    base: DisplayBase,
    mode: AmplitudeMode,
    peak_mode: Option<PeakMode>,
    fade: f32,

    /// Largest absolute sample of the last frame
    measured_peak: i32,
    /// Lit edge, in LEDs, or `NO_COLOR`
    position: f32,

    peak_fade_start: f32,
    peak_fade_current: f32,
    peak_position: f32,
    /// Marker color latched at the last reset (`FrozenAtPeak`)
    saved_peak_color: u16,
}

impl AmplitudeDisplay {
    pub fn new(frame_size: usize, num_leds: usize, config: &AmplitudeConfig) -> EngineResult<Self> {
        let mut base = DisplayBase::new(frame_size, num_leds, FIRST_LED_BRIGHTNESS, config.mirror)?;
        if config.peak.is_some() {
            base.override_points = vec![0];
        }

        Ok(Self {
            base,
            mode: config.mode,
            peak_mode: config.peak,
            fade: config.fade,
            measured_peak: 0,
            position: NO_COLOR,
            peak_fade_start: config.peak_fade,
            peak_fade_current: config.peak_fade,
            peak_position: NO_COLOR,
            saved_peak_color: 0,
        })
    }

    /// Lit edge after the last frame; negative when dark
    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn peak_position(&self) -> f32 {
        self.peak_position
    }

    fn max_index(&self) -> usize {
        self.base.num_forward_points().saturating_sub(1)
    }

    /// Where the lit edge would jump to for the last frame at `gain`
    pub fn candidate_position(&self, gain: i32) -> f32 {
        if self.measured_peak == 0 {
            return NO_COLOR;
        }
        let num_points = self.base.num_forward_points() as i64;
        let led = (self.measured_peak as i64 * gain.max(0) as i64 * num_points) >> 17;
        led.clamp(0, self.max_index() as i64) as f32
    }

    /// Color mapping position of LED `index` on the full-length gradient
    fn position_color(&self, index: usize) -> u16 {
        ((index * 0xFFFF) / self.max_index().max(1)).min(0xFFFF) as u16
    }

    fn fill_in_bar(&mut self) -> Option<usize> {
        if self.position < 0.0 {
            self.base.num_non_black = 0;
            return None;
        }

        let max_index = self.max_index();
        let lit = ((self.position + 0.5) as usize).min(max_index);
        let (delta, divisor) = match self.mode {
            AmplitudeMode::Scale => (0, lit.max(1)),
            AmplitudeMode::MinSame => (0, max_index.max(1)),
            AmplitudeMode::MaxSame => (max_index - lit, max_index.max(1)),
        };

        for (i, point) in self.base.display_points[..=lit].iter_mut().enumerate() {
            *point = (((i + delta) * 0xFFFF) / divisor).min(0xFFFF) as u16;
        }
        self.base.num_non_black = lit + 1;
        Some(lit)
    }

    fn fill_in_peak(&mut self, peak_mode: PeakMode, lit: Option<usize>) {
        let max_index = self.max_index();

        self.peak_position -= self.peak_fade_current;
        if self.position > self.peak_position {
            self.peak_fade_current = self.peak_fade_start;
            self.peak_position = self.position;
            if self.position >= 0.0 {
                self.saved_peak_color = self.position_color((self.position + 0.5) as usize);
            }
        }
        self.peak_position = self.peak_position.max(NO_COLOR);

        if self.peak_position < 0.0 {
            self.base.override_start = None;
        } else {
            let mut desired = ((self.peak_position + 0.5) as usize).min(max_index);
            // Keep the marker visible just above the bar
            if lit == Some(desired) && desired < max_index {
                desired += 1;
            }

            let color = match peak_mode {
                PeakMode::GradientMax => 0xFFFF,
                PeakMode::GradientMin => 0,
                PeakMode::FrozenAtPeak => self.saved_peak_color,
                PeakMode::TrackPeak => self.position_color(desired),
            };
            self.base.override_points[0] = color;
            self.base.override_start = Some(desired);
        }

        self.peak_fade_current += self.peak_fade_start * PEAK_FADE_ACCELERATION;
    }
}

impl AudioDisplay for AmplitudeDisplay {
    fn name(&self) -> &'static str {
        match self.mode {
            AmplitudeMode::Scale => "amplitude (scale)",
            AmplitudeMode::MinSame => "amplitude (min same)",
            AmplitudeMode::MaxSame => "amplitude (max same)",
        }
    }

    fn base(&self) -> &DisplayBase {
        &self.base
    }

    fn process_pcm(&mut self, samples: &[i16]) {
        self.measured_peak = samples
            .iter()
            .map(|&s| (s as i32).abs())
            .max()
            .unwrap_or(0);
    }

    fn fill_in_display_points(&mut self, gain: i32) {
        if self.base.num_forward_points() == 0 {
            return;
        }

        let candidate = self.candidate_position(gain);
        self.position = (self.position - self.fade).max(NO_COLOR);
        if candidate > self.position {
            self.position = candidate;
        }

        let lit = self.fill_in_bar();
        if let Some(peak_mode) = self.peak_mode {
            self.fill_in_peak(peak_mode, lit);
        }
    }
}
