//! Pitch-shift and echo effects chain
//!
//! One base voice transform (pitch shift in semitones) plus `max_echoes`
//! echo layers. Echo layer `i` is pitch-shifted half a semitone lower per
//! layer, attenuated 12 dB per layer, and delayed `i * echo_delay` seconds.
//! Each echo layer is mixed 50/50 between its undelayed and delayed signal,
//! and all layers are summed.
//!
//! The chain is a pure function of `(initial_pitch_shift, max_echoes,
//! echo_delay)` and the sample rate; it is built once per playback channel
//! and never changes for the process lifetime.

use crate::config::EffectParams;
use signalsmith_stretch::Stretch;

/// Convert decibels to a linear gain factor.
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

struct EchoLayer {
    semitones: f32,
    gain: f32,
    delay_samples: usize,
}

/// Fixed per-channel effects chain.
pub struct EchoChain {
    layers: Vec<EchoLayer>,
    sample_rate: u32,
}

impl EchoChain {
    pub fn new(params: &EffectParams, sample_rate: u32) -> Self {
        let mut layers = Vec::with_capacity(params.max_echoes + 1);

        // Main voice: pitch shift only
        layers.push(EchoLayer {
            semitones: params.initial_pitch_shift,
            gain: 1.0,
            delay_samples: 0,
        });

        // Echoes: decreasing pitch and volume, increasing delay
        for i in 1..=params.max_echoes {
            layers.push(EchoLayer {
                semitones: params.initial_pitch_shift - (i as f32 * 0.5),
                gain: db_to_gain(-12.0 * i as f32),
                delay_samples: (i as f64 * params.echo_delay * f64::from(sample_rate)) as usize,
            });
        }

        Self {
            layers,
            sample_rate,
        }
    }

    /// Process a dry buffer through the full chain.
    ///
    /// Output length equals input length; callers pad the input with enough
    /// trailing silence for the longest echo's tail.
    pub fn process(&self, dry: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; dry.len()];

        for layer in &self.layers {
            let shifted = pitch_shift(dry, layer.semitones, self.sample_rate);

            if layer.delay_samples == 0 {
                for (o, s) in out.iter_mut().zip(&shifted) {
                    *o += s * layer.gain;
                }
            } else {
                mix_delayed(&mut out, &shifted, layer.gain, layer.delay_samples);
            }
        }

        out
    }
}

/// Mix an echo layer into the output: half undelayed, half delayed.
fn mix_delayed(out: &mut [f32], src: &[f32], gain: f32, delay_samples: usize) {
    let half = gain * 0.5;
    for (i, s) in src.iter().enumerate() {
        out[i] += s * half;
        if let Some(slot) = out.get_mut(i + delay_samples) {
            *slot += s * half;
        }
    }
}

/// Pitch-shift a mono buffer by `semitones`, preserving length.
///
/// The stretcher introduces latency; the output is shifted back by the total
/// latency after flushing so speech onsets stay aligned with the dry signal.
fn pitch_shift(input: &[f32], semitones: f32, sample_rate: u32) -> Vec<f32> {
    if semitones == 0.0 || input.is_empty() {
        return input.to_vec();
    }

    let mut stretch = Stretch::preset_default(1, sample_rate);
    stretch.set_transpose_factor_semitones(semitones, None);

    let latency = stretch.input_latency() + stretch.output_latency();

    let mut shifted = vec![0.0f32; input.len()];
    stretch.process(input, &mut shifted);

    let mut tail = vec![0.0f32; latency];
    stretch.flush(&mut tail);
    shifted.extend_from_slice(&tail);

    shifted[latency..latency + input.len()].to_vec()
}
