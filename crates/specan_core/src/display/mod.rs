//! Audio Displays
//!
//! A display turns one frame of PCM into a strip-sized array of colors. Each
//! display keeps its own fade/peak state; the only thing shared with other
//! threads is its [`ColorMapping`].
//!
//! # Architecture
//!
//! ```text
//! parse_pcm(frame) ──▶ process_pcm            (display specific)
//! fill_in_leds ──────▶ fill_in_display_points (display specific)
//!                      │  display points + override (peak) points
//!                      ▼
//!                      DisplayBase::render ──▶ color mapping ──▶ mirror
//! ```
//!
//! Display points are 16-bit positions on the color mapping. Only the first
//! `num_forward_points` LEDs are computed; with mirroring on, the rest of the
//! strip is a reflection of them.

mod amplitude;
mod fft;

use std::sync::Arc;

use parking_lot::RwLock;
use specan_dsp::{ColorScale, DspError, Rgb};

use crate::config::{DisplayConfig, PipelineConfig};
use crate::error::EngineResult;
use crate::gradient::Gradient;

pub use amplitude::AmplitudeDisplay;
pub use fft::FftDisplay;

/// Shared, swappable color mapping
///
/// Readers take a snapshot for a whole frame; `set_gradient` builds the new
/// scale outside the lock and swaps it in, so a frame never mixes two scales.
#[derive(Clone)]
pub struct ColorMapping {
    scale: Arc<RwLock<Arc<ColorScale>>>,
}

impl ColorMapping {
    pub fn new(scale: ColorScale) -> Self {
        Self {
            scale: Arc::new(RwLock::new(Arc::new(scale))),
        }
    }

    pub fn from_gradient(gradient: &Gradient, reverse: bool) -> EngineResult<Self> {
        Ok(Self::new(gradient.to_color_scale(reverse)?))
    }

    /// Current scale
    pub fn snapshot(&self) -> Arc<ColorScale> {
        Arc::clone(&self.scale.read())
    }

    pub fn replace(&self, scale: ColorScale) {
        *self.scale.write() = Arc::new(scale);
    }

    /// Rebuild the mapping from `gradient`
    pub fn set_gradient(&self, gradient: &Gradient, reverse: bool) -> EngineResult<()> {
        let scale = gradient.to_color_scale(reverse)?;
        self.replace(scale);
        Ok(())
    }
}

/// Geometry and render buffers shared by every display type
pub struct DisplayBase {
    frame_size: usize,
    num_leds: usize,
    num_forward_points: usize,
    mirror: bool,

    /// Color mapping position per forward LED
    pub(crate) display_points: Vec<u16>,
    /// Brightness multiplier per forward LED
    pub(crate) points_brightness: Vec<f32>,
    /// Points at and beyond this index render black
    pub(crate) num_non_black: usize,

    /// Drawn on top of the display points starting at `override_start`
    pub(crate) override_points: Vec<u16>,
    pub(crate) override_start: Option<usize>,

    color_mapping: ColorMapping,
}

impl DisplayBase {
    /// `first_led_brightness` dims (or brightens) LED 0; 0.0 leaves it alone
    pub fn new(
        frame_size: usize,
        num_leds: usize,
        first_led_brightness: f32,
        mirror: bool,
    ) -> EngineResult<Self> {
        let num_forward_points = if mirror {
            (num_leds + 1) / 2
        } else {
            num_leds
        };

        let mut points_brightness = vec![1.0; num_forward_points];
        if first_led_brightness > 0.0 {
            if let Some(first) = points_brightness.first_mut() {
                *first = first_led_brightness;
            }
        }

        Ok(Self {
            frame_size,
            num_leds,
            num_forward_points,
            mirror,
            display_points: vec![0; num_forward_points],
            points_brightness,
            num_non_black: 0,
            override_points: Vec::new(),
            override_start: None,
            color_mapping: ColorMapping::from_gradient(&Gradient::default(), false)?,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    pub fn num_forward_points(&self) -> usize {
        self.num_forward_points
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn display_points(&self) -> &[u16] {
        &self.display_points
    }

    pub fn points_brightness(&self) -> &[f32] {
        &self.points_brightness
    }

    pub fn num_non_black(&self) -> usize {
        self.num_non_black
    }

    pub fn override_start(&self) -> Option<usize> {
        self.override_start
    }

    pub fn color_mapping(&self) -> &ColorMapping {
        &self.color_mapping
    }

    /// Turn the current display points into colors
    pub fn render(&self, leds: &mut [Rgb], brightness: f32) {
        let scale = self.color_mapping.snapshot();
        let forward = self.num_forward_points.min(leds.len());
        let lit = self.num_non_black.min(forward);

        for (i, led) in leds[..lit].iter_mut().enumerate() {
            *led = scale.get_color(
                self.display_points[i],
                brightness * self.points_brightness[i],
            );
        }
        leds[lit..forward].fill(Rgb::BLACK);

        // Overrides past the computed half are dropped, never wrapped
        if let Some(start) = self.override_start {
            for (offset, &position) in self.override_points.iter().enumerate() {
                let index = start + offset;
                if index >= forward {
                    break;
                }
                leds[index] = scale.get_color(position, brightness * self.points_brightness[index]);
            }
        }

        if self.mirror {
            let total = self.num_leds.min(leds.len());
            for i in forward..total {
                leds[i] = leds[total - 1 - i];
            }
        }
    }
}

/// Shared contract of the amplitude and spectrum displays
pub trait AudioDisplay: Send {
    /// Short name for logging
    fn name(&self) -> &'static str;

    fn base(&self) -> &DisplayBase;

    /// Reduce one frame of PCM into the display's state
    fn process_pcm(&mut self, samples: &[i16]);

    /// Refresh display points, brightness and overrides for this frame
    fn fill_in_display_points(&mut self, gain: i32);

    /// Samples this display consumes per frame
    fn frame_size(&self) -> usize {
        self.base().frame_size()
    }

    /// Accept exactly one frame of PCM
    fn parse_pcm(&mut self, samples: &[i16]) -> Result<(), DspError> {
        let expected = self.frame_size();
        if samples.len() != expected {
            return Err(DspError::BufferSizeMismatch {
                expected,
                got: samples.len(),
            });
        }
        self.process_pcm(samples);
        Ok(())
    }

    /// Update this frame and render it into `leds`
    fn fill_in_leds(&mut self, leds: &mut [Rgb], brightness: f32, gain: i32) {
        self.fill_in_display_points(gain);
        self.base().render(leds, brightness);
    }

    fn color_mapping(&self) -> ColorMapping {
        self.base().color_mapping().clone()
    }

    fn set_gradient(&self, gradient: &Gradient, reverse: bool) -> EngineResult<()> {
        self.base().color_mapping().set_gradient(gradient, reverse)
    }
}

/// Build every display in the configured order
pub fn build_displays(config: &PipelineConfig) -> EngineResult<Vec<Box<dyn AudioDisplay>>> {
    config
        .displays
        .iter()
        .map(|display| -> EngineResult<Box<dyn AudioDisplay>> {
            Ok(match display {
                DisplayConfig::Amplitude(c) => Box::new(AmplitudeDisplay::new(
                    config.amplitude_frame_size(),
                    config.num_leds,
                    c,
                )?),
                DisplayConfig::Fft(c) => Box::new(FftDisplay::new(
                    config.sample_rate as f32,
                    config.fft_size,
                    config.fft_rate_hz,
                    config.num_leds,
                    c,
                )?),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use specan_dsp::ColorPoint;

    const BLUE: Rgb = Rgb::new(0, 0, 255);

    /// Display whose points are set directly by the test
    struct FixedDisplay {
        base: DisplayBase,
        points: Vec<u16>,
        lit: usize,
        peak: Option<(usize, u16)>,
    }

    impl FixedDisplay {
        fn new(num_leds: usize, mirror: bool) -> Self {
            let base = DisplayBase::new(4, num_leds, 0.0, mirror).unwrap();
            base.color_mapping().replace(red_to_blue());
            let points = (0..base.num_forward_points())
                .map(|i| (i * 0x1000) as u16)
                .collect();
            let lit = base.num_forward_points();
            Self {
                base,
                points,
                lit,
                peak: None,
            }
        }
    }

    impl AudioDisplay for FixedDisplay {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn base(&self) -> &DisplayBase {
            &self.base
        }

        fn process_pcm(&mut self, _samples: &[i16]) {}

        fn fill_in_display_points(&mut self, _gain: i32) {
            self.base.display_points.copy_from_slice(&self.points);
            self.base.num_non_black = self.lit;
            match self.peak {
                Some((start, position)) => {
                    self.base.override_points = vec![position];
                    self.base.override_start = Some(start);
                }
                None => self.base.override_start = None,
            }
        }
    }

    fn red_to_blue() -> ColorScale {
        ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::new(255, 0, 0),
                start: 0.0,
            },
            ColorPoint {
                color: BLUE,
                start: 1.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_mirror_reflects_first_half() {
        let mut display = FixedDisplay::new(10, true);
        assert_eq!(display.base().num_forward_points(), 5);

        let mut leds = vec![Rgb::BLACK; 10];
        display.fill_in_leds(&mut leds, 1.0, 1);
        for i in 0..10 {
            assert_eq!(leds[9 - i], leds[i], "LED {} vs {}", i, 9 - i);
        }
        assert!(!leds[0].is_black());
    }

    #[test]
    fn test_odd_mirror_keeps_centre() {
        let mut display = FixedDisplay::new(11, true);
        let mut leds = vec![Rgb::BLACK; 11];
        display.fill_in_leds(&mut leds, 1.0, 1);
        for i in 0..11 {
            assert_eq!(leds[10 - i], leds[i]);
        }
    }

    #[test]
    fn test_unlit_points_are_black() {
        let mut display = FixedDisplay::new(8, false);
        display.lit = 3;
        let mut leds = vec![Rgb::WHITE; 8];
        display.fill_in_leds(&mut leds, 1.0, 1);
        assert!(leds[..3].iter().all(|c| !c.is_black()));
        assert!(leds[3..].iter().all(|c| c.is_black()));
    }

    #[test]
    fn test_override_drawn_on_top() {
        let mut display = FixedDisplay::new(8, false);
        display.lit = 2;
        display.peak = Some((5, 0xFFFF));
        let mut leds = vec![Rgb::BLACK; 8];
        display.fill_in_leds(&mut leds, 1.0, 1);
        assert_eq!(leds[5], BLUE);
        assert!(leds[4].is_black());
        assert!(leds[6].is_black());
    }

    #[test]
    fn test_out_of_range_override_skipped() {
        let mut display = FixedDisplay::new(10, true);
        // Index 7 is in the reflected half, so nothing is drawn there
        display.peak = Some((7, 0xFFFF));
        let mut leds = vec![Rgb::BLACK; 10];
        display.fill_in_leds(&mut leds, 1.0, 1);
        for i in 0..10 {
            assert_eq!(leds[9 - i], leds[i]);
        }
        assert!(leds.iter().all(|&c| c != BLUE));
    }

    #[test]
    fn test_parse_pcm_checks_frame_size() {
        let mut display = FixedDisplay::new(4, false);
        assert!(display.parse_pcm(&[0; 4]).is_ok());
        assert!(matches!(
            display.parse_pcm(&[0; 5]),
            Err(DspError::BufferSizeMismatch {
                expected: 4,
                got: 5
            })
        ));
    }

    #[test]
    fn test_first_led_brightness() {
        let base = DisplayBase::new(4, 6, 0.5, false).unwrap();
        assert_eq!(base.points_brightness()[0], 0.5);
        assert!(base.points_brightness()[1..].iter().all(|&b| b == 1.0));

        let base = DisplayBase::new(4, 6, 0.0, false).unwrap();
        assert!(base.points_brightness().iter().all(|&b| b == 1.0));
    }

    #[test]
    fn test_gradient_swap_is_visible_to_clones() {
        let display = FixedDisplay::new(4, false);
        let handle = display.color_mapping();
        let before = display.base().color_mapping().snapshot();

        handle.set_gradient(&Gradient::rainbow(3), true).unwrap();
        let after = display.base().color_mapping().snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_build_default_displays() {
        let config = PipelineConfig::default();
        let displays = build_displays(&config).unwrap();
        assert_eq!(displays.len(), 5);
        assert_eq!(displays[0].frame_size(), 128);
        assert_eq!(displays[3].frame_size(), 256);
    }
}
