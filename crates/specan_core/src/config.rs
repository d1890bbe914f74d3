//! Pipeline and Display Configuration

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How the amplitude display spreads the gradient over the lit LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeMode {
    /// Whole gradient stretched over the lit LEDs
    Scale,
    /// Low end of the gradient anchored at the first LED
    MinSame,
    /// High end of the gradient anchored at the lit edge
    MaxSame,
}

/// Color of the falling peak marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakMode {
    /// Always the top of the gradient
    GradientMax,
    /// Always the bottom of the gradient
    GradientMin,
    /// Color of the position where the marker was last reset
    FrozenAtPeak,
    /// Color of the position the marker currently sits at
    TrackPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FftMode {
    /// Loudness moves each LED along the gradient
    GradientMagnitude,
    /// Each LED keeps a fixed color; loudness drives its brightness
    BrightnessMagnitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeConfig {
    pub mode: AmplitudeMode,

    /// Peak marker, or `None` for no marker
    #[serde(default)]
    pub peak: Option<PeakMode>,

    /// LEDs the lit edge falls per frame
    pub fade: f32,

    /// Initial per-frame fall of the peak marker (it accelerates)
    #[serde(default)]
    pub peak_fade: f32,

    #[serde(default)]
    pub mirror: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FftDisplayConfig {
    pub mode: FftMode,

    #[serde(default)]
    pub mirror: bool,
}

/// One entry of the display list, cycled through by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayConfig {
    Amplitude(AmplitudeConfig),
    Fft(FftDisplayConfig),
}

impl DisplayConfig {
    pub fn mirror(&self) -> bool {
        match self {
            Self::Amplitude(c) => c.mirror,
            Self::Fft(c) => c.mirror,
        }
    }

    /// Display points the display logic computes for `num_leds` LEDs
    pub fn num_forward_points(&self, num_leds: usize) -> usize {
        if self.mirror() {
            (num_leds + 1) / 2
        } else {
            num_leds
        }
    }
}

/// Overall pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Microphone sample rate in Hz
    pub sample_rate: u32,

    /// Interleaved channels captured; only the first one is used
    pub channels: u16,

    /// FFT window in samples (power of two); amplitude frames are half of it
    pub fft_size: usize,

    pub num_leds: usize,

    /// Target FFT firings per second for the spectrum displays
    pub fft_rate_hz: f32,

    /// Longest wait for a frame before the microphone is declared stalled
    pub watchdog_timeout_ms: u64,

    /// Button/remote polling period
    pub monitor_poll_interval_us: u64,

    /// TCP port for the remote control listener, `None` to disable it
    pub remote_port: Option<u16>,

    /// Start with gain/brightness taken from the remote
    pub remote_levels: bool,

    pub displays: Vec<DisplayConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            fft_size: 256,
            num_leds: 60,
            fft_rate_hz: 150.0,
            watchdog_timeout_ms: 100,
            monitor_poll_interval_us: 1000,
            remote_port: None,
            remote_levels: false,
            displays: default_displays(),
        }
    }
}

/// Three amplitude modes followed by both spectrum modes
pub fn default_displays() -> Vec<DisplayConfig> {
    vec![
        DisplayConfig::Amplitude(AmplitudeConfig {
            mode: AmplitudeMode::Scale,
            peak: Some(PeakMode::GradientMax),
            fade: 0.25,
            peak_fade: 0.02,
            mirror: false,
        }),
        DisplayConfig::Amplitude(AmplitudeConfig {
            mode: AmplitudeMode::MinSame,
            peak: Some(PeakMode::FrozenAtPeak),
            fade: 0.25,
            peak_fade: 0.02,
            mirror: false,
        }),
        DisplayConfig::Amplitude(AmplitudeConfig {
            mode: AmplitudeMode::MaxSame,
            peak: Some(PeakMode::GradientMin),
            fade: 0.25,
            peak_fade: 0.02,
            mirror: true,
        }),
        DisplayConfig::Fft(FftDisplayConfig {
            mode: FftMode::GradientMagnitude,
            mirror: true,
        }),
        DisplayConfig::Fft(FftDisplayConfig {
            mode: FftMode::BrightnessMagnitude,
            mirror: true,
        }),
    ]
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            EngineError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Samples per amplitude display frame
    pub fn amplitude_frame_size(&self) -> usize {
        self.fft_size / 2
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_micros(self.monitor_poll_interval_us)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < 16 || self.fft_size > 8192 {
            return Err(format!("Invalid FFT size: {}", self.fft_size));
        }
        if self.num_leds == 0 {
            return Err("At least one LED is required".to_string());
        }
        if self.displays.is_empty() {
            return Err("At least one display is required".to_string());
        }
        if !(self.fft_rate_hz > 0.0) || !self.fft_rate_hz.is_finite() {
            return Err(format!("Invalid FFT rate: {}", self.fft_rate_hz));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err("Watchdog timeout must be non-zero".to_string());
        }
        if self.monitor_poll_interval_us == 0 {
            return Err("Monitor poll interval must be non-zero".to_string());
        }

        for (index, display) in self.displays.iter().enumerate() {
            match display {
                DisplayConfig::Amplitude(c) => {
                    if !(c.fade >= 0.0) || !(c.peak_fade >= 0.0) {
                        return Err(format!(
                            "Display {}: fade values must be non-negative (fade {}, peak fade {})",
                            index, c.fade, c.peak_fade
                        ));
                    }
                }
                DisplayConfig::Fft(_) => {
                    let samples_per_fft =
                        (self.sample_rate as f32 / self.fft_rate_hz).round() as usize;
                    if samples_per_fft < self.fft_size {
                        return Err(format!(
                            "Display {}: FFT rate {}Hz would reuse samples ({} new samples per {} point FFT)",
                            index, self.fft_rate_hz, samples_per_fft, self.fft_size
                        ));
                    }
                    let points = display.num_forward_points(self.num_leds);
                    if points > self.fft_size / 2 {
                        return Err(format!(
                            "Display {}: {} LEDs need more than the {} FFT bins; enable mirroring or raise the FFT size",
                            index,
                            points,
                            self.fft_size / 2
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate, mapping the failure to an engine error
    pub fn check(&self) -> EngineResult<()> {
        self.validate().map_err(EngineError::ConfigError)
    }
}
