//! Frequency Modifier
//!
//! Maps a raw FFT magnitude array onto a fixed number of output bins over a
//! configured frequency window. Each output bin averages its input bins, then
//! the configured clip window is stretched onto the full `0..=0xFFFF` range
//! with a Q15 fixed-point scalar. Optional log compression runs last.
//!
//! # Frequency bounds
//!
//! Start and stop frequencies wrap into `0..=nyquist`. A stop frequency is
//! taken relative to the Nyquist edge first, so `stop_freq = -2000.0` means
//! "2 kHz below Nyquist" while `stop_freq = 12000.0` stays at 12 kHz and
//! `stop_freq = 0.0` selects the whole spectrum.

use crate::error::DspError;

const MAX_OUTPUT: i64 = 0xFFFF;

/// `ln(0xFFFF)`, used to scale log output back onto the u16 range
const LN_MAX_OUTPUT: f32 = 11.090_339;

/// Frequency Modifier configuration
///
/// The default does not modify anything: whole spectrum, full clip window,
/// no log scaling and no low frequency attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FftModifiers {
    pub start_freq: f32,
    pub stop_freq: f32,

    pub clip_min: u16,
    pub clip_max: u16,

    pub log_scale: bool,

    /// Linearly attenuate output bins below `atten_low_stop_freq`
    pub atten_low_freqs: bool,
    /// Gain applied to the lowest output bin (0 to 1)
    pub atten_low_start_level: f32,
    pub atten_low_stop_freq: f32,
}

impl Default for FftModifiers {
    fn default() -> Self {
        Self {
            start_freq: 0.0,
            stop_freq: 0.0,
            clip_min: 0,
            clip_max: 0xFFFF,
            log_scale: false,
            atten_low_freqs: false,
            atten_low_start_level: 1.0,
            atten_low_stop_freq: 0.0,
        }
    }
}

pub struct FrequencyModifier {
    /// `[start, end)` input bins per output bin; never empty, never decreasing
    ranges: Vec<(usize, usize)>,
    /// Q15 scale per output bin
    scalar: Vec<i64>,
    offset: i64,
    log_scale: bool,
}

impl FrequencyModifier {
    pub fn new(
        sample_rate: f32,
        fft_size: usize,
        num_outputs: usize,
        modifiers: &FftModifiers,
    ) -> Result<Self, DspError> {
        if !(sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if fft_size < 2 {
            return Err(DspError::InvalidFftSize(fft_size));
        }
        let num_bins = fft_size / 2;
        if num_outputs == 0 || num_outputs > num_bins {
            return Err(DspError::InvalidFrequencyWindow(format!(
                "{num_outputs} outputs requested from {num_bins} FFT bins"
            )));
        }

        let freq_range = sample_rate / 2.0;
        let hz_per_bin = sample_rate / fft_size as f32;

        let index_map = index_map(freq_range, hz_per_bin, num_bins, num_outputs, modifiers);
        let ranges = index_map
            .windows(2)
            .map(|pair| {
                let end = pair[1].min(num_bins);
                (pair[0].min(end - 1), end)
            })
            .collect();

        let scalar = output_scalars(&index_map, hz_per_bin, num_outputs, modifiers);

        Ok(Self {
            ranges,
            scalar,
            offset: modifiers.clip_min as i64,
            log_scale: modifiers.log_scale,
        })
    }

    pub fn num_outputs(&self) -> usize {
        self.ranges.len()
    }

    /// Input bin range `[start, end)` feeding output bin `index`
    pub fn input_range(&self, index: usize) -> (usize, usize) {
        self.ranges[index]
    }

    /// Rewrite the front of `bins` with the modified output values
    ///
    /// Returns the number of valid output bins.
    pub fn modify(&self, bins: &mut [u16]) -> usize {
        let len = bins.len();
        let num_outputs = self.ranges.len().min(len);

        // Output `i` only reads bins at index `i` or later, so the rewrite
        // can happen in place.
        for out_index in 0..num_outputs {
            let (start, end) = self.ranges[out_index];
            let (start, end) = (start.min(len), end.min(len));
            let count = (end - start).max(1) as i64;
            let sum: i64 = bins[start..end].iter().map(|&v| v as i64).sum();
            let avg = sum / count;

            let scaled = ((avg - self.offset) * self.scalar[out_index]) >> 15;
            bins[out_index] = scaled.clamp(0, MAX_OUTPUT) as u16;
        }

        if self.log_scale {
            log_scale(&mut bins[..num_outputs]);
        }

        num_outputs
    }
}

/// Reinterpret a configured bound into `0..=range`
fn splice_to_freq(splice: f32, range: f32, is_stop: bool) -> f32 {
    let value = if is_stop { range + splice } else { splice };
    if value < 0.0 {
        value.rem_euclid(range)
    } else if value > range {
        let wrapped = value.rem_euclid(range);
        if wrapped == 0.0 {
            range
        } else {
            wrapped
        }
    } else {
        value
    }
}

fn index_map(
    freq_range: f32,
    hz_per_bin: f32,
    num_bins: usize,
    num_outputs: usize,
    modifiers: &FftModifiers,
) -> Vec<usize> {
    let start_freq = splice_to_freq(modifiers.start_freq, freq_range, false);
    let stop_freq = splice_to_freq(modifiers.stop_freq, freq_range, true);

    let bins_per_output = (stop_freq - start_freq) / num_outputs as f32 / hz_per_bin;
    let start_bin = start_freq / hz_per_bin;

    let mut map: Vec<usize> = (0..=num_outputs)
        .map(|i| (start_bin + bins_per_output * i as f32).max(0.0) as usize)
        .collect();

    // Every output bin must cover at least one input bin
    for i in 1..map.len() {
        map[i] = map[i].max(map[i - 1] + 1);
    }
    // Keep the final end inside the spectrum
    let last = map.len() - 1;
    map[last] = map[last].min(num_bins).max(map[last - 1].min(num_bins - 1) + 1);
    map
}

fn output_scalars(
    index_map: &[usize],
    hz_per_bin: f32,
    num_outputs: usize,
    modifiers: &FftModifiers,
) -> Vec<i64> {
    let range_in = (modifiers.clip_max as f32 - modifiers.clip_min as f32).max(1.0);
    let scalar = MAX_OUTPUT as f32 / range_in;
    let q15 = |gain: f32| (gain * scalar * 32768.0) as i64;

    let mut stop_atten_index = 0;
    if modifiers.atten_low_freqs {
        let stop_bin = (modifiers.atten_low_stop_freq / hz_per_bin) as usize;
        while stop_atten_index < num_outputs && index_map[stop_atten_index] < stop_bin {
            stop_atten_index += 1;
        }
    }

    let min_level = modifiers.atten_low_start_level.clamp(0.0, 1.0);
    let delta = 1.0 - min_level;
    (0..num_outputs)
        .map(|i| {
            if i < stop_atten_index {
                q15(min_level + i as f32 * delta / stop_atten_index as f32)
            } else {
                q15(1.0)
            }
        })
        .collect()
}

/// Log compression; zero is treated as one and nothing drops below one
fn log_scale(values: &mut [u16]) {
    let scale = MAX_OUTPUT as f32 / LN_MAX_OUTPUT;
    for value in values {
        let x = (*value).max(1) as f32;
        *value = (x.ln() * scale).round().clamp(1.0, MAX_OUTPUT as f32) as u16;
    }
}
