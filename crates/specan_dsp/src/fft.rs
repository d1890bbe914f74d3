//! Real FFT on 16-bit PCM
//!
//! Turns one window of signed 16-bit samples into `fft_size / 2` unsigned
//! 16-bit magnitudes. The magnitudes are scaled by `1 / fft_size`, so a
//! full-scale sine lands well inside the `u16` range after the Hann window.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::DspError;

/// Hann window coefficient for sample `n` of a `size` sample window
fn hann_window(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Forward FFT producing magnitude bins
pub struct SpecAnFft {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed Hann window
    window: Vec<f32>,
    /// Working buffer, transformed in place
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpecAnFft {
    /// Plan an FFT of `fft_size` points (power of two)
    pub fn new(fft_size: usize) -> Result<Self, DspError> {
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft_size,
            fft,
            window: (0..fft_size).map(|i| hann_window(i, fft_size)).collect(),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per run
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Transform the first `fft_size` samples of `input` into `output`
    ///
    /// `input` must hold at least `fft_size` samples and `output` at least
    /// `num_bins()` slots; extra slots are left untouched.
    pub fn run(&mut self, input: &[i16], output: &mut [u16]) {
        debug_assert!(input.len() >= self.fft_size);
        debug_assert!(output.len() >= self.num_bins());

        for (slot, (&sample, &coeff)) in self
            .buffer
            .iter_mut()
            .zip(input.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(sample as f32 * coeff, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let num_bins = self.num_bins();
        for (out, bin) in output.iter_mut().zip(self.buffer.iter()).take(num_bins) {
            *out = (bin.norm() * scale + 0.5).min(u16::MAX as f32) as u16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, fft_size: usize, amplitude: f32) -> Vec<i16> {
        (0..fft_size)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * n as f32 / fft_size as f32;
                (phase.sin() * amplitude) as i16
            })
            .collect()
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(SpecAnFft::new(300).is_err());
        assert!(SpecAnFft::new(0).is_err());
        assert!(SpecAnFft::new(256).is_ok());
    }

    #[test]
    fn test_silence_gives_zero_bins() {
        let mut fft = SpecAnFft::new(256).unwrap();
        let mut out = vec![0xFFFF_u16; fft.num_bins()];
        fft.run(&[0; 256], &mut out);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let mut fft = SpecAnFft::new(256).unwrap();
        let mut out = vec![0_u16; fft.num_bins()];
        fft.run(&sine(20, 256, 16000.0), &mut out);

        let (peak_bin, _) = out
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .unwrap();
        assert_eq!(peak_bin, 20);
        // Hann window halves the amplitude, the real FFT splits it again
        assert!(out[20] > 3000 && out[20] < 5000, "got {}", out[20]);
    }

    #[test]
    fn test_full_scale_does_not_overflow() {
        let mut fft = SpecAnFft::new(64).unwrap();
        let mut out = vec![0_u16; fft.num_bins()];
        fft.run(&[i16::MAX; 64], &mut out);
        assert!(out[0] > 0);
    }
}
