//! Repeating player
//!
//! Loops one fixed audio file (background tone/noise, or mantra) to an
//! output sink forever. No effects; re-reads the file on each pass and
//! writes fixed-size chunks. Runs on its own thread, independent of the
//! scheduler and playback channels, and stops only at process teardown or
//! on device failure.

use crate::audio::{self, AudioSink};
use std::path::PathBuf;
use tracing::error;

pub struct RepeatingPlayer {
    filepath: PathBuf,
}

impl RepeatingPlayer {
    pub fn new(filepath: PathBuf) -> Self {
        Self { filepath }
    }

    /// Loop the file until the sink fails.
    pub fn run(&self, sink: &mut dyn AudioSink, chunk_frames: usize) {
        loop {
            let samples = match audio::load_mono(&self.filepath, sink.sample_rate()) {
                Ok(samples) => samples,
                Err(e) => {
                    error!("Cannot loop {}: {}", self.filepath.display(), e);
                    return;
                }
            };

            for chunk in samples.chunks(chunk_frames) {
                if let Err(e) = sink.write(chunk) {
                    error!("Output failed for {}: {}", self.filepath.display(), e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::path::Path;

    /// Sink that accepts a fixed budget of samples, then fails.
    struct BudgetSink {
        sample_rate: u32,
        budget: usize,
        samples: Vec<f32>,
    }

    impl AudioSink for BudgetSink {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn write(&mut self, samples: &[f32]) -> Result<()> {
            if self.samples.len() + samples.len() > self.budget {
                return Err(Error::AudioOutput("budget exhausted".to_string()));
            }
            self.samples.extend_from_slice(samples);
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
            let sample = (2.0 * std::f32::consts::PI * 60.0 * t).sin() * 0.2;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_loops_file_until_sink_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1000, 8000);

        let mut sink = BudgetSink {
            sample_rate: 8000,
            budget: 3500,
            samples: Vec::new(),
        };
        RepeatingPlayer::new(path).run(&mut sink, 256);

        // Played the 1000-frame file three full times before the budget
        // stopped a fourth pass.
        assert!(sink.samples.len() >= 3000, "got {}", sink.samples.len());
    }

    #[test]
    fn test_missing_file_returns() {
        let mut sink = BudgetSink {
            sample_rate: 8000,
            budget: 0,
            samples: Vec::new(),
        };
        RepeatingPlayer::new(PathBuf::from("/nonexistent/tone.wav")).run(&mut sink, 256);
        assert!(sink.samples.is_empty());
    }
}
