//! Generation worker
//!
//! Keeps the line registry in sync with the source text file. On every
//! change to the file it re-reads and canonicalizes the lines, synthesizes
//! audio for lines whose hashed file does not exist yet, measures durations,
//! and atomically replaces the registry contents. Playback threads never see
//! a half-updated line set.
//!
//! Lines with pause directives are assembled from per-phrase temporary
//! files plus explicit silence, written as one final WAV.

use crate::audio::{decode, resampler};
use crate::error::{Error, Result};
use crate::gen::engine::SpeechEngine;
use crate::gen::segment::{parse_segments, Segment};
use crate::lines::{clean_line, Line, LineRegistry};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// Wait between source-file mtime checks when nothing changed.
const RESCAN_PERIOD: Duration = Duration::from_secs(5);

/// Sample rate for a line that contains no speech at all (pause-only).
const SILENCE_ONLY_RATE: u32 = 22050;

/// Read, canonicalize, and deduplicate source lines, preserving first-seen
/// order.
pub fn read_source_lines(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;

    let mut lines: Vec<String> = Vec::new();
    for raw in contents.lines() {
        let line = clean_line(raw);
        if !line.is_empty() && !lines.contains(&line) {
            lines.push(line);
        }
    }
    Ok(lines)
}

pub struct GenerationWorker {
    source: PathBuf,
    output_dir: PathBuf,
    registry: Arc<LineRegistry>,
    engine: Box<dyn SpeechEngine>,
}

impl GenerationWorker {
    pub fn new(
        source: PathBuf,
        output_dir: PathBuf,
        registry: Arc<LineRegistry>,
        engine: Box<dyn SpeechEngine>,
    ) -> Self {
        Self {
            source,
            output_dir,
            registry,
            engine,
        }
    }

    /// Watch the source file forever, regenerating on every change.
    pub fn run(&self) {
        let mut last_generation: Option<SystemTime> = None;

        loop {
            debug!("Checking {} for changes", self.source.display());

            let mtime = match fs::metadata(&self.source).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(e) => {
                    warn!("Cannot stat {}: {}", self.source.display(), e);
                    thread::sleep(RESCAN_PERIOD);
                    continue;
                }
            };

            if last_generation.map_or(true, |t| mtime > t) {
                last_generation = Some(mtime);
                match self.generate_pass() {
                    Ok(count) => info!("Line registry updated, {} lines available", count),
                    Err(e) => error!("Generation pass failed: {}", e),
                }
            } else {
                thread::sleep(RESCAN_PERIOD);
            }
        }
    }

    /// One full read-synthesize-replace pass.
    pub fn generate_pass(&self) -> Result<usize> {
        let lines = read_source_lines(&self.source)?;
        fs::create_dir_all(&self.output_dir)?;

        let mapping = generate_once(&lines, &self.output_dir, self.engine.as_ref());
        let count = mapping.len();
        self.registry.replace(mapping);
        Ok(count)
    }
}

/// Synthesize any missing line audio and return the full line mapping with
/// measured durations. One batch; also used directly by the mix renderer.
///
/// Per-line synthesis failures are logged, and the line is kept without a
/// duration so playback skips it until a later pass succeeds.
pub fn generate_once(
    lines: &[String],
    output_dir: &Path,
    engine: &dyn SpeechEngine,
) -> IndexMap<String, Line> {
    let mut mapping = IndexMap::with_capacity(lines.len());

    for text in lines {
        let mut line = Line::from_text(text, output_dir);

        if !line.filepath.exists() {
            if let Err(e) = render_line(&line, engine) {
                warn!("Cannot synthesize line '{}': {}", text, e);
            }
        }

        if line.filepath.exists() {
            if let Err(e) = line.measure_duration() {
                warn!("Cannot measure line '{}': {}", text, e);
            }
        }

        mapping.insert(text.clone(), line);
    }

    mapping
}

/// Synthesize one line's audio file, combining pause directives if present.
fn render_line(line: &Line, engine: &dyn SpeechEngine) -> Result<()> {
    let segments = parse_segments(&line.text);

    if segments.is_empty() {
        return Err(Error::Synthesis("nothing to speak".to_string()));
    }

    if !segments.iter().any(Segment::is_pause) {
        // Plain line: one speech segment straight to the final path
        if let Some(Segment::Speech(text)) = segments.first() {
            return engine.synthesize(text, &line.filepath);
        }
        return Err(Error::Synthesis("nothing to speak".to_string()));
    }

    let mut temp_paths = Vec::new();
    let result = combine_segments(line, &segments, engine, &mut temp_paths);

    for path in &temp_paths {
        if let Err(e) = fs::remove_file(path) {
            debug!("Cannot remove temp segment {}: {}", path.display(), e);
        }
    }

    result
}

/// Synthesize each speech segment to a temp file, then concatenate speech
/// and silence into the final file at the first segment's native rate.
fn combine_segments(
    line: &Line,
    segments: &[Segment],
    engine: &dyn SpeechEngine,
    temp_paths: &mut Vec<PathBuf>,
) -> Result<()> {
    let parent = line.filepath.parent().unwrap_or_else(|| Path::new("."));
    let stem = line
        .filepath
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Synthesis(format!("bad line path {}", line.filepath.display())))?;

    for (idx, segment) in segments.iter().enumerate() {
        if let Segment::Speech(text) = segment {
            let temp = parent.join(format!("{}_seg{}.tmp.wav", stem, idx));
            temp_paths.push(temp.clone());
            engine.synthesize(text, &temp)?;
        }
    }

    let mut combined: Vec<f32> = Vec::new();
    let mut sample_rate = 0u32;
    // Pause seconds seen before the first speech segment fixes the rate
    let mut pending_silence = 0.0f64;
    let mut temps = temp_paths.iter();

    for segment in segments {
        match segment {
            Segment::Speech(_) => {
                let path = temps
                    .next()
                    .ok_or_else(|| Error::Synthesis("segment bookkeeping mismatch".to_string()))?;
                let (samples, rate) = decode::load_native(path)?;

                if sample_rate == 0 {
                    sample_rate = rate;
                    let lead = (pending_silence * f64::from(rate)) as usize;
                    combined.resize(lead, 0.0);
                    combined.extend_from_slice(&samples);
                } else {
                    combined.extend(resampler::resample(&samples, rate, sample_rate)?);
                }
            }
            Segment::Pause(seconds) => {
                if sample_rate == 0 {
                    pending_silence += seconds;
                } else {
                    let frames = (seconds * f64::from(sample_rate)) as usize;
                    combined.resize(combined.len() + frames, 0.0);
                }
            }
        }
    }

    if sample_rate == 0 {
        sample_rate = SILENCE_ONLY_RATE;
        combined.resize((pending_silence * f64::from(sample_rate)) as usize, 0.0);
    }

    write_wav_mono(&line.filepath, &combined, sample_rate)
}

/// Write mono f32 samples as a 16-bit PCM WAV file.
pub(crate) fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Synthesis(format!("cannot create {}: {}", path.display(), e)))?;

    for sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| Error::Synthesis(format!("cannot write {}: {}", path.display(), e)))?;
    }

    writer
        .finalize()
        .map_err(|e| Error::Synthesis(format!("cannot finalize {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that writes a short sine burst instead of real speech.
    struct FakeEngine {
        sample_rate: u32,
        frames: usize,
        calls: AtomicUsize,
    }

    impl FakeEngine {
        fn new(sample_rate: u32, frames: usize) -> Self {
            Self {
                sample_rate,
                frames,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SpeechEngine for FakeEngine {
        fn synthesize(&self, _text: &str, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let samples: Vec<f32> = (0..self.frames)
                .map(|i| (i as f32 * 0.1).sin() * 0.4)
                .collect();
            write_wav_mono(output, &samples, self.sample_rate)
        }
    }

    fn write_source(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("lines.txt");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_source_lines_cleans_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            dir.path(),
            "You are calm.\n\n  you sink deeper  \nyou are calm\nYou Sink Deeper.\n",
        );

        assert_eq!(
            read_source_lines(&path).unwrap(),
            vec!["you are calm".to_string(), "you sink deeper".to_string()]
        );
    }

    #[test]
    fn test_generate_once_creates_files_and_measures() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(8000, 4000); // 0.5s per phrase
        let lines = vec!["first line".to_string(), "second line".to_string()];

        let mapping = generate_once(&lines, dir.path(), &engine);

        assert_eq!(mapping.len(), 2);
        for line in mapping.values() {
            assert!(line.filepath.exists());
            assert!((line.duration.unwrap() - 0.5).abs() < 0.01);
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_existing_audio_is_not_resynthesized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(8000, 800);
        let lines = vec!["stay with me".to_string()];

        generate_once(&lines, dir.path(), &engine);
        generate_once(&lines, dir.path(), &engine);

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pause_line_combines_speech_and_silence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(8000, 4000); // 0.5s per phrase
        let lines = vec!["breathe in [pause 2 seconds] breathe out".to_string()];

        let mapping = generate_once(&lines, dir.path(), &engine);

        let line = &mapping[0];
        assert!(line.filepath.exists());
        // 0.5s speech + 2s silence + 0.5s speech
        assert!((line.duration.unwrap() - 3.0).abs() < 0.01);

        // Temp segment files are gone
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_synthesis_keeps_line_without_duration() {
        struct BrokenEngine;
        impl SpeechEngine for BrokenEngine {
            fn synthesize(&self, _text: &str, _output: &Path) -> Result<()> {
                Err(Error::Synthesis("no voice today".to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let lines = vec!["unspeakable".to_string()];
        let mapping = generate_once(&lines, dir.path(), &BrokenEngine);

        assert_eq!(mapping.len(), 1);
        assert!(mapping[0].duration.is_none());
    }

    #[test]
    fn test_generate_pass_replaces_registry() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "one\ntwo\n");
        let registry = Arc::new(LineRegistry::new());

        let worker = GenerationWorker::new(
            source.clone(),
            dir.path().join("lines"),
            Arc::clone(&registry),
            Box::new(FakeEngine::new(8000, 800)),
        );

        assert_eq!(worker.generate_pass().unwrap(), 2);
        assert_eq!(registry.keys(), vec!["one".to_string(), "two".to_string()]);

        // Shrinking the source shrinks the registry on the next pass
        write_source(dir.path(), "two\n");
        assert_eq!(worker.generate_pass().unwrap(), 1);
        assert_eq!(registry.keys(), vec!["two".to_string()]);
    }
}
