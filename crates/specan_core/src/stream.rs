//! Microphone Capture
//!
//! Opens the default input device through CPAL and feeds channel 0 of
//! whatever it delivers into the [`PcmHandoff`] as 16-bit PCM.
//!
//! The callback only converts and appends; all processing happens on the
//! pipeline's own thread.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig as CpalStreamConfig};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::handoff::PcmHandoff;

/// Sample types the capture path accepts
trait ToPcm16: SizedSample + Send + 'static {
    fn to_pcm16(self) -> i16;
}

impl ToPcm16 for i16 {
    fn to_pcm16(self) -> i16 {
        self
    }
}

impl ToPcm16 for f32 {
    fn to_pcm16(self) -> i16 {
        (self.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

/// Live microphone stream; dropping it releases the device
pub struct MicCapture {
    /// Held only to keep the callback running
    #[allow(dead_code)]
    stream: Stream,
    device_name: String,
}

impl MicCapture {
    /// Start capturing from the default input device
    pub fn start(sample_rate: u32, channels: u16, handoff: Arc<PcmHandoff>) -> EngineResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(EngineError::NoInputDevice)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input".to_string());

        let sample_format = device
            .default_input_config()
            .map_err(|e| EngineError::DeviceError(e.to_string()))?
            .sample_format();

        let config = CpalStreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, handoff)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, handoff)?,
            other => {
                return Err(EngineError::UnsupportedSampleFormat(format!("{other:?}")));
            }
        };

        stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        info!(
            "Capturing from '{}' at {} Hz, {} channel(s), {:?}",
            device_name, sample_rate, channels, sample_format
        );

        Ok(Self {
            stream,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T: ToPcm16>(
    device: &Device,
    config: &CpalStreamConfig,
    handoff: Arc<PcmHandoff>,
) -> EngineResult<Stream> {
    let channels = config.channels.max(1) as usize;
    // Reused across callbacks; grows once to the driver's buffer size
    let mut mono: Vec<i16> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(data.iter().step_by(channels).map(|&s| s.to_pcm16()));
                handoff.push(&mono);
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| EngineError::StreamBuildError(e.to_string()))
}
