//! CPAL output backend
//!
//! Opens a single stereo (or wider) output stream whose callback owns the
//! render graph. The stream runs at the graph's sample rate; a device that
//! cannot is reported as [`AudioError::UnsupportedSampleRate`] rather than
//! resampled.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::error::{AudioError, AudioResult};
use super::renderer::OutputRenderer;
use crate::engine::{AudioEngine, MAX_BUFFER_SIZE};

/// Buffer size used when the caller expresses no preference
const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Device selection for [`start_output`]
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Device name as reported by [`output_device_names`]; `None` = default
    pub device: Option<String>,
    /// Requested buffer size in frames; `None` = backend default
    pub buffer_size: Option<u32>,
}

/// Keeps the output stream alive. Drop this to stop audio.
pub struct OutputHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
}

impl OutputHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Names of the default host's output devices
pub fn output_device_names() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn find_device(name: Option<&str>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
    }
}

/// Start streaming the render graph to an output device
///
/// `sample_rate` must match the rate the graph was built for.
pub fn start_output(
    engine: AudioEngine,
    sample_rate: u32,
    options: &OutputOptions,
) -> AudioResult<OutputHandle> {
    let device = find_device(options.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, sample_rate)?;
    let buffer_size = options
        .buffer_size
        .unwrap_or(DEFAULT_BUFFER_SIZE)
        .clamp(64, MAX_BUFFER_SIZE as u32);

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0
    );

    let stream = build_output_stream(&device, &stream_config, OutputRenderer::new(engine))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(OutputHandle {
        _stream: stream,
        device_name,
        sample_rate,
        buffer_size,
    })
}

/// Pick an f32 config with at least two channels that runs at `sample_rate`
fn get_output_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(in_range)
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .find(|c| c.channels() >= 2)
        .or_else(|| {
            supported_configs
                .iter()
                .filter(in_range)
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or(AudioError::UnsupportedSampleRate(sample_rate))?;

    Ok(best.clone().with_sample_rate(cpal::SampleRate(sample_rate)))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut renderer: OutputRenderer,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                renderer.render_interleaved(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
