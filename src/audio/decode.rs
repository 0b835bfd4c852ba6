//! Audio decoding using symphonia
//!
//! Line audio is synthesized speech, so everything downstream of the decoder
//! works in mono f32. Multi-channel sources are downmixed by averaging.

use crate::audio::resampler;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Streaming decoder producing mono f32 chunks.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

impl AudioDecoder {
    /// Open a decoder for the given file.
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Decode(format!("cannot open {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("unsupported format {}: {}", path.display(), e)))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| Error::Decode(format!("no audio track in {}", path.display())))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.unwrap_or(44100);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("unsupported codec {}: {}", path.display(), e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
        })
    }

    /// Native sample rate of the file.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode the next packet to mono samples.
    ///
    /// Returns `None` at end of file.
    pub fn decode_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(Error::Decode(format!("packet read failed: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| Error::Decode(format!("decode failed: {}", e)))?;

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(downmix_mono(sample_buf.samples(), channels)));
        }
    }
}

/// Average interleaved channels down to mono.
fn downmix_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(channels) {
        mono.push(frame.iter().sum::<f32>() / channels as f32);
    }
    mono
}

/// Read a file's duration in seconds from its header, without decoding.
///
/// Falls back to a full decode pass for containers that do not carry a frame
/// count.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let file = File::open(path)
        .map_err(|e| Error::Decode(format!("cannot open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("unsupported format {}: {}", path.display(), e)))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| Error::Decode(format!("no audio track in {}", path.display())))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode(format!("unknown sample rate in {}", path.display())))?;

    if let Some(n_frames) = track.codec_params.n_frames {
        return Ok(n_frames as f64 / f64::from(sample_rate));
    }

    // Header carries no frame count; count by decoding.
    let mut decoder = AudioDecoder::new(path)?;
    let mut frames = 0usize;
    while let Some(chunk) = decoder.decode_chunk()? {
        frames += chunk.len();
    }
    Ok(frames as f64 / f64::from(sample_rate))
}

/// Decode an entire file to mono f32 at its native sample rate.
pub fn load_native(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut decoder = AudioDecoder::new(path)?;
    let native_rate = decoder.sample_rate();

    let mut samples = Vec::new();
    while let Some(chunk) = decoder.decode_chunk()? {
        samples.extend_from_slice(&chunk);
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!("no audio in {}", path.display())));
    }

    Ok((samples, native_rate))
}

/// Decode an entire file to mono f32 at the target sample rate.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let (samples, native_rate) = load_native(path)?;
    resampler::resample(&samples, native_rate, target_rate)
}
