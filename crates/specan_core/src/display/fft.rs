//! Spectrum Display
//!
//! Runs a rate-limited FFT on the incoming PCM, bins it onto the LEDs and
//! shows it either as color (loudness moves along the gradient) or as
//! brightness (fixed colors, loudness dims and brightens them).
//!
//! Frames that do not complete an FFT leave the previous display points in
//! place, so the strip holds still between firings.

use specan_dsp::{FftModifiers, FftRunRate, FrequencyModifier};

use super::{AudioDisplay, DisplayBase};
use crate::config::{FftDisplayConfig, FftMode};
use crate::error::EngineResult;

/// Extra gain on top of the user gain; binned magnitudes sit low in the range
const FFT_GAIN_MULTIPLIER: i64 = 6;

/// Perceptual curve for brightness mode
const BRIGHTNESS_EXPONENT: f32 = 1.8;

/// Frequency window and clipping used by both spectrum modes
pub fn spectrum_modifiers() -> FftModifiers {
    FftModifiers {
        start_freq: 300.0,
        stop_freq: 12000.0,
        clip_min: 0,
        clip_max: 5000,
        log_scale: false,
        atten_low_freqs: true,
        atten_low_start_level: 0.2,
        atten_low_stop_freq: 6000.0,
    }
}

pub struct FftDisplay {
    base: DisplayBase,
    mode: FftMode,
    runner: FftRunRate,
    modifier: FrequencyModifier,
    /// Copy of the latest FFT result, consumed by the next fill
    fft_result: Vec<u16>,
    has_new_result: bool,
}

impl FftDisplay {
    pub fn new(
        sample_rate: f32,
        fft_size: usize,
        fft_rate: f32,
        num_leds: usize,
        config: &FftDisplayConfig,
    ) -> EngineResult<Self> {
        let first_led_brightness = match config.mode {
            FftMode::BrightnessMagnitude => 1.0,
            FftMode::GradientMagnitude => 0.0,
        };
        let mut base = DisplayBase::new(fft_size, num_leds, first_led_brightness, config.mirror)?;

        let runner = FftRunRate::new(sample_rate, fft_size, fft_rate)?;
        let modifier = FrequencyModifier::new(
            sample_rate,
            fft_size,
            base.num_forward_points(),
            &spectrum_modifiers(),
        )?;

        // Every point is shown; only the values change
        base.num_non_black = base.num_forward_points();

        Ok(Self {
            fft_result: vec![0; runner.num_bins()],
            base,
            mode: config.mode,
            runner,
            modifier,
            has_new_result: false,
        })
    }

    /// FFTs run since construction
    pub fn fft_count(&self) -> u64 {
        self.runner.fft_count()
    }

    fn fill_gradient_magnitude(&mut self, gain: i64) {
        for (point, &bin) in self.base.display_points.iter_mut().zip(&self.fft_result) {
            *point = (bin as i64 * gain).clamp(0, 0xFFFF) as u16;
        }
    }

    fn fill_brightness_magnitude(&mut self, gain: i64) {
        let num_points = self.base.display_points.len();
        let divisor = num_points.saturating_sub(1).max(1);

        for (i, (point, brightness)) in self
            .base
            .display_points
            .iter_mut()
            .zip(self.base.points_brightness.iter_mut())
            .enumerate()
        {
            let level = (self.fft_result[i] as i64 * gain).clamp(0, 0x10000);
            *brightness = (level as f32 / 0x10000 as f32).powf(BRIGHTNESS_EXPONENT);
            *point = (i * 0xFFFF / divisor) as u16;
        }
    }
}

impl AudioDisplay for FftDisplay {
    fn name(&self) -> &'static str {
        match self.mode {
            FftMode::GradientMagnitude => "spectrum (gradient)",
            FftMode::BrightnessMagnitude => "spectrum (brightness)",
        }
    }

    fn base(&self) -> &DisplayBase {
        &self.base
    }

    fn process_pcm(&mut self, samples: &[i16]) {
        if let Some(result) = self.runner.run(samples) {
            self.fft_result.copy_from_slice(result);
            self.has_new_result = true;
        }
    }

    fn fill_in_display_points(&mut self, gain: i32) {
        if !self.has_new_result {
            return;
        }
        self.has_new_result = false;

        self.modifier.modify(&mut self.fft_result);

        let gain = gain.max(0) as i64 * FFT_GAIN_MULTIPLIER;
        match self.mode {
            FftMode::GradientMagnitude => self.fill_gradient_magnitude(gain),
            FftMode::BrightnessMagnitude => self.fill_brightness_magnitude(gain),
        }
    }
}
