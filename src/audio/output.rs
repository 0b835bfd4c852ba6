//! Audio device output using cpal
//!
//! Each player thread owns its own [`CpalOutput`]: a cpal stream fed from a
//! lock-free ring buffer. Player code writes mono samples; the device
//! callback duplicates them to stereo and plays silence on underrun.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Ring buffer capacity, seconds of mono audio.
const RING_SECONDS: usize = 2;

/// Writer backoff while the ring is full.
const WRITE_POLL: Duration = Duration::from_millis(5);

/// A blocking mono sample sink.
///
/// [`CpalOutput`] is the production implementation; tests substitute an
/// in-memory collector.
pub trait AudioSink {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Write mono samples, blocking until the sink has accepted them all.
    fn write(&mut self, samples: &[f32]) -> Result<()>;
}

/// Device output stream fed through a ring buffer.
pub struct CpalOutput {
    // Held to keep the stream alive; dropped on teardown.
    _stream: Stream,
    producer: ringbuf::HeapProd<f32>,
    sample_rate: u32,
}

impl CpalOutput {
    /// Open the default output device.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", name);

        let (config, sample_format) = best_config(&device)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let sample_rate = config.sample_rate.0;
        let ring = HeapRb::<f32>::new(sample_rate as usize * RING_SECONDS);
        let (producer, consumer) = ring.split();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream_f32(&device, &config, consumer)?,
            SampleFormat::I16 => build_stream_i16(&device, &config, consumer)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            producer,
            sample_rate,
        })
    }
}

impl AudioSink for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let mut written = 0;
        while written < samples.len() {
            written += self.producer.push_slice(&samples[written..]);
            if written < samples.len() {
                thread::sleep(WRITE_POLL);
            }
        }
        Ok(())
    }
}

/// Prefer 44.1kHz stereo f32; fall back to the device default.
fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("failed to get device configs: {}", e)))?;

    let preferred = supported.find(|config| {
        config.channels() == 2
            && config.min_sample_rate().0 <= 44100
            && config.max_sample_rate().0 >= 44100
            && config.sample_format() == SampleFormat::F32
    });

    if let Some(config) = preferred {
        let sample_format = config.sample_format();
        let config = config.with_sample_rate(cpal::SampleRate(44100)).config();
        return Ok((config, sample_format));
    }

    let default = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("failed to get default config: {}", e)))?;
    let sample_format = default.sample_format();
    Ok((default.config(), sample_format))
}

fn build_stream_f32(
    device: &Device,
    config: &StreamConfig,
    mut consumer: ringbuf::HeapCons<f32>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    // Underrun plays silence rather than crashing
                    let sample = consumer.try_pop().unwrap_or(0.0).clamp(-1.0, 1.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))
}

fn build_stream_i16(
    device: &Device,
    config: &StreamConfig,
    mut consumer: ringbuf::HeapCons<f32>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = consumer.try_pop().unwrap_or(0.0).clamp(-1.0, 1.0);
                    let value = (sample * i16::MAX as f32) as i16;
                    for out in frame.iter_mut() {
                        *out = value;
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))
}
