//! Playback channel
//!
//! A channel owns one end of a capacity-1 queue and a fixed effects chain.
//! The single-slot queue is what caps in-flight work to one pending line per
//! channel: the scheduler polls the sending side until the slot frees up,
//! which is the backpressure the pacing design relies on.

use crate::audio::{self, AudioSink, EchoChain};
use crate::config::EffectParams;
use crate::error::Result;
use crate::lines::Line;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{info, warn};

/// Sending side of a channel's single-slot queue, held by the scheduler.
pub struct ChannelHandle {
    sender: Sender<Line>,
}

/// Why a hand-off did not happen; the line comes back for retry.
pub enum AssignError {
    /// Slot occupied, poll again
    Full(Line),
    /// Playback thread is gone
    Disconnected(Line),
}

impl ChannelHandle {
    /// Try to hand a line to the channel.
    pub fn try_assign(&self, line: Line) -> std::result::Result<(), AssignError> {
        match self.sender.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(line)) => Err(AssignError::Full(line)),
            Err(TrySendError::Disconnected(line)) => Err(AssignError::Disconnected(line)),
        }
    }
}

/// Receiving side: the playback loop.
pub struct PlaybackChannel {
    pub(crate) receiver: Receiver<Line>,
    params: EffectParams,
}

/// Build a connected scheduler handle / playback channel pair.
pub fn channel_pair(params: EffectParams) -> (ChannelHandle, PlaybackChannel) {
    let (sender, receiver) = bounded(1);
    (
        ChannelHandle { sender },
        PlaybackChannel { receiver, params },
    )
}

impl PlaybackChannel {
    /// Run the blocking playback loop until the scheduler side is dropped.
    ///
    /// One undecodable file must not kill the loop: per-line failures are
    /// logged and the channel moves to the next queued line.
    pub fn run(&self, sink: &mut dyn AudioSink, chunk_frames: usize) {
        let chain = EchoChain::new(&self.params, sink.sample_rate());

        while let Ok(line) = self.receiver.recv() {
            if let Err(e) = self.play_line(&line, sink, &chain, chunk_frames) {
                warn!("Skipping line '{}': {}", line.text, e);
            }
        }
    }

    fn play_line(
        &self,
        line: &Line,
        sink: &mut dyn AudioSink,
        chain: &EchoChain,
        chunk_frames: usize,
    ) -> Result<()> {
        info!("{}", line.text);

        let dry = audio::load_mono(&line.filepath, sink.sample_rate())?;

        // Trailing silence so the longest echo's tail is not truncated
        let tail = (self.params.tail_seconds() * f64::from(sink.sample_rate())) as usize;
        let mut padded = dry;
        padded.resize(padded.len() + tail, 0.0);

        let wet = chain.process(&padded);

        // Chunking bounds memory between here and the device ring; it does
        // not change the audio content or timing.
        for chunk in wet.chunks(chunk_frames) {
            sink.write(chunk)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::path::Path;

    struct CollectingSink {
        sample_rate: u32,
        samples: Vec<f32>,
        writes: usize,
    }

    impl AudioSink for CollectingSink {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn write(&mut self, samples: &[f32]) -> Result<()> {
            self.samples.extend_from_slice(samples);
            self.writes += 1;
            Ok(())
        }
    }

    fn write_wav(path: &Path, frames: usize, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 110.0 * t).sin() * 0.3;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn test_params() -> EffectParams {
        EffectParams {
            initial_pitch_shift: 0.0,
            max_echoes: 1,
            echo_delay: 0.25,
        }
    }

    #[test]
    fn test_slot_holds_exactly_one_line() {
        let (handle, _channel) = channel_pair(test_params());
        let line = Line::from_text("first", Path::new("/lines"));

        assert!(handle.try_assign(line.clone()).is_ok());
        // Slot occupied: the line comes back
        match handle.try_assign(line) {
            Err(AssignError::Full(returned)) => assert_eq!(returned.text, "first"),
            _ => panic!("expected full slot"),
        }
    }

    #[test]
    fn test_play_line_pads_echo_tail_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.wav");
        let sample_rate = 8000;
        write_wav(&path, 8000, sample_rate); // 1 second dry

        let (_handle, channel) = channel_pair(test_params());
        let mut line = Line::from_text("line", dir.path());
        line.filepath = path;

        let mut sink = CollectingSink {
            sample_rate,
            samples: Vec::new(),
            writes: 0,
        };
        let chain = EchoChain::new(&test_params(), sample_rate);
        channel.play_line(&line, &mut sink, &chain, 1024).unwrap();

        // 1s dry + 0.25s tail (1 echo * 0.25s delay)
        let expected = 8000 + 2000;
        assert_eq!(sink.samples.len(), expected);
        assert_eq!(sink.writes, expected.div_ceil(1024));
    }

    #[test]
    fn test_missing_file_is_a_recoverable_error() {
        let (_handle, channel) = channel_pair(test_params());
        let line = Line::from_text("ghost", Path::new("/nonexistent"));

        let mut sink = CollectingSink {
            sample_rate: 8000,
            samples: Vec::new(),
            writes: 0,
        };
        let chain = EchoChain::new(&test_params(), 8000);
        assert!(channel.play_line(&line, &mut sink, &chain, 1024).is_err());
        assert!(sink.samples.is_empty());
    }

    #[test]
    fn test_run_exits_when_scheduler_side_drops() {
        let (handle, channel) = channel_pair(test_params());
        drop(handle);

        let mut sink = CollectingSink {
            sample_rate: 8000,
            samples: Vec::new(),
            writes: 0,
        };
        // Must return instead of blocking forever
        channel.run(&mut sink, 1024);
    }
}
