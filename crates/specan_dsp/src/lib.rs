//! Specan DSP - Signal Processing Module
//!
//! This crate turns raw microphone PCM into values an LED strip can show:
//! - Hann-windowed real FFT on 16-bit PCM with 16-bit magnitude output
//! - Rate-limited FFT runner that never reuses a sample between windows
//! - Frequency modifier that bins, clips and log-scales the spectrum
//! - Piecewise-linear color mapping from a 16-bit position to RGB
//!
//! # Architecture
//!
//! Everything here is single-threaded and allocation-free after
//! construction. Constructors validate their parameters and return
//! [`DspError`] instead of panicking, so a bad configuration is reported
//! before any audio flows.

mod color;
mod error;
mod fft;
mod fft_rate;
mod freq_modifier;

pub use color::{flat_brightness, BrightnessPoint, ColorPoint, ColorScale, Rgb};
pub use error::DspError;
pub use fft::SpecAnFft;
pub use fft_rate::FftRunRate;
pub use freq_modifier::{FftModifiers, FrequencyModifier};
