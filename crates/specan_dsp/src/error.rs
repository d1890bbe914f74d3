//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while building or feeding DSP blocks
#[derive(Error, Debug)]
pub enum DspError {
    #[error("FFT size must be a power of two of at least 2, got {0}")]
    InvalidFftSize(usize),

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error(
        "FFT rate {fft_rate}Hz needs {samples_per_fft} new samples per FFT, \
         fewer than the {fft_size} sample window (samples would be reused)"
    )]
    SampleReuse {
        fft_rate: f32,
        fft_size: usize,
        samples_per_fft: usize,
    },

    #[error("Frequency window produces no output bins: {0}")]
    InvalidFrequencyWindow(String),

    #[error("Color scale needs at least two breakpoints, got {0}")]
    TooFewBreakpoints(usize),

    #[error("Buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },
}
