//! cpal output stream driving the renderer
//!
//! ```text
//! ┌──────────────────┐   synchronize()    ┌─────────────────────┐
//! │     UI thread    │──────────────────► │      MixEngine      │
//! │   (AppState)     │                    │  push(EngineCommand)│
//! └──────────────────┘                    └──────────┬──────────┘
//!                                                    │ rtrb (lock-free)
//!                                          ┌─────────▼──────────┐
//!                                          │  cpal audio thread │
//!                                          │  owns MixRenderer  │
//!                                          └────────────────────┘
//! ```
//!
//! The device's sample rate is negotiated first; the engine is then built
//! at that rate so tracks are decoded straight to it.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::{MixEngine, MixRenderer};

use super::device::find_output_device;
use super::error::{AudioError, AudioResult};

/// Keeps the output stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames as requested from the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        latency_ms(self.buffer_size, self.sample_rate)
    }
}

/// A running audio system: the engine for the UI plus the stream handle
pub struct AudioSystem {
    pub engine: MixEngine,
    pub handle: AudioHandle,
}

fn latency_ms(buffer_size: u32, sample_rate: u32) -> f32 {
    buffer_size as f32 / sample_rate.max(1) as f32 * 1000.0
}

/// Pick a sample rate inside `[min, max]`, preferring `target`
fn pick_sample_rate(min: u32, max: u32, target: u32) -> u32 {
    if (min..=max).contains(&target) {
        target
    } else {
        max
    }
}

/// Open the configured output device and start rendering
///
/// The returned engine's sample rate matches the device.
pub fn start_audio_system(config: &EngineConfig, clock: Arc<dyn Clock>) -> AudioResult<AudioSystem> {
    let device = find_output_device(config.output_device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = select_output_config(&device, config.sample_rate)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.clamped_buffer_size() as u32;

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
        latency_ms(buffer_size, sample_rate)
    );

    let (engine, renderer) = MixEngine::new(&config.with_sample_rate(sample_rate), clock);
    let renderer = Arc::new(Mutex::new(renderer));

    let stream = build_output_stream(&device, &stream_config, renderer)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioSystem {
        engine,
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
            channels: stream_config.channels,
        },
    })
}

/// Choose an f32 output config with at least two channels, if possible
fn select_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let best = supported
        .iter()
        .filter(|c| c.channels() >= 2)
        .find(|c| (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let rate = pick_sample_rate(best.min_sample_rate().0, best.max_sample_rate().0, target_rate);
    if rate != target_rate {
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            rate
        );
    }
    Ok(best.clone().with_sample_rate(cpal::SampleRate(rate)))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    renderer: Arc<Mutex<MixRenderer>>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                // Only this callback locks, so the lock is never contended
                match renderer.lock() {
                    Ok(mut renderer) => renderer.render_interleaved(data, channels),
                    Err(_) => data.fill(0.0),
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
