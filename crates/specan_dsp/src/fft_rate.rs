//! Rate-Limited FFT Runner
//!
//! The microphone delivers frames at whatever cadence the hardware picks,
//! while the LEDs only need a new spectrum ~150 times a second. This runner
//! accumulates PCM and fires an FFT once per `samples_per_fft` new samples.
//!
//! Successive FFT windows never share a sample: the advance per firing is at
//! least the FFT window, which is checked when the runner is built.

use crate::error::DspError;
use crate::fft::SpecAnFft;

pub struct FftRunRate {
    fft: SpecAnFft,
    /// Pending PCM, oldest sample first
    pcm_buffer: Vec<i16>,
    /// Result of the most recent firing
    fft_result: Vec<u16>,
    /// Samples removed from the front after each firing
    samples_per_fft: usize,
    /// Total number of firings since construction
    fft_count: u64,
}

impl FftRunRate {
    /// Build a runner targeting `fft_rate` FFTs per second
    ///
    /// Fails with [`DspError::SampleReuse`] when `sample_rate / fft_rate`
    /// rounds to fewer samples than the FFT window.
    pub fn new(sample_rate: f32, fft_size: usize, fft_rate: f32) -> Result<Self, DspError> {
        if !(sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if !(fft_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(fft_rate));
        }

        let fft = SpecAnFft::new(fft_size)?;
        let samples_per_fft = (sample_rate / fft_rate).round() as usize;
        if samples_per_fft < fft_size {
            return Err(DspError::SampleReuse {
                fft_rate,
                fft_size,
                samples_per_fft,
            });
        }

        Ok(Self {
            fft_result: vec![0; fft.num_bins()],
            fft,
            pcm_buffer: Vec::with_capacity(sample_rate as usize),
            samples_per_fft,
            fft_count: 0,
        })
    }

    /// Append samples and run every FFT that is now due
    ///
    /// Returns the newest result, or `None` when nothing fired this call.
    /// The slice is overwritten by the next firing.
    pub fn run(&mut self, samples: &[i16]) -> Option<&mut [u16]> {
        self.pcm_buffer.extend_from_slice(samples);

        let mut fired = false;
        while self.pcm_buffer.len() >= self.samples_per_fft {
            self.fft.run(&self.pcm_buffer, &mut self.fft_result);
            self.pcm_buffer.drain(..self.samples_per_fft);
            self.fft_count += 1;
            fired = true;
        }

        if fired {
            Some(self.fft_result.as_mut_slice())
        } else {
            None
        }
    }

    pub fn samples_per_fft(&self) -> usize {
        self.samples_per_fft
    }

    pub fn fft_size(&self) -> usize {
        self.fft.fft_size()
    }

    pub fn num_bins(&self) -> usize {
        self.fft_result.len()
    }

    pub fn fft_count(&self) -> u64 {
        self.fft_count
    }

    /// Samples waiting for the next firing
    pub fn pending(&self) -> &[i16] {
        &self.pcm_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| ((i * 37) % 2000) as i16 - 1000).collect()
    }

    #[test]
    fn test_advance_is_rounded() {
        let runner = FftRunRate::new(44100.0, 256, 150.0).unwrap();
        assert_eq!(runner.samples_per_fft(), 294);
        assert_eq!(runner.num_bins(), 128);
    }

    #[test]
    fn test_rejects_sample_reuse() {
        // 44100 / 500 = 88 samples per FFT, less than the 256 window
        let result = FftRunRate::new(44100.0, 256, 500.0);
        assert!(matches!(result, Err(DspError::SampleReuse { .. })));
    }

    #[test]
    fn test_no_result_until_enough_samples() {
        let mut runner = FftRunRate::new(44100.0, 256, 150.0).unwrap();
        assert!(runner.run(&ramp(200)).is_none());
        assert!(runner.run(&ramp(93)).is_none());
        assert!(runner.run(&ramp(1)).is_some());
        assert_eq!(runner.fft_count(), 1);
        assert!(runner.pending().is_empty());
    }

    #[test]
    fn test_chunking_does_not_change_firings() {
        let mut one_at_a_time = FftRunRate::new(44100.0, 256, 150.0).unwrap();
        let mut all_at_once = FftRunRate::new(44100.0, 256, 150.0).unwrap();

        let k = 7;
        // A few extra samples so the leftover buffer is not empty
        let input = ramp(k * one_at_a_time.samples_per_fft() + 50);

        for sample in &input {
            one_at_a_time.run(std::slice::from_ref(sample));
        }
        all_at_once.run(&input);

        assert_eq!(one_at_a_time.fft_count(), k as u64);
        assert_eq!(all_at_once.fft_count(), k as u64);
        assert_eq!(one_at_a_time.pending(), all_at_once.pending());
        assert_eq!(one_at_a_time.pending(), &input[input.len() - 50..]);
    }

    #[test]
    fn test_odd_chunk_sizes() {
        let mut runner = FftRunRate::new(48000.0, 256, 150.0).unwrap();
        let input = ramp(runner.samples_per_fft() * 5);
        for chunk in input.chunks(97) {
            runner.run(chunk);
        }
        assert_eq!(runner.fft_count(), 5);
    }
}
