//! Offline mix renderer
//!
//! Produces one WAV holding the same session the live player would play:
//! every line once, in the configured chooser's order, each line's wet
//! signal starting where the previous line's dry signal ends, with the
//! background bed and mantra overlaid at reduced level. Runs without any
//! audio device.

use crate::audio::{db_to_gain, load_mono, EchoChain};
use crate::config::{ChooserPolicy, EffectParams};
use crate::error::{Error, Result};
use crate::gen::worker::write_wav_mono;
use crate::gen::{generate_once, read_source_lines, SpeechEngine};
use crate::lines::{Line, LineRegistry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// All offline mixing happens at this rate.
const RENDER_SAMPLE_RATE: u32 = 44100;

const BACKGROUND_GAIN_DB: f32 = -10.0;
/// The mantra sits under the background bed, so it is attenuated more.
const MANTRA_GAIN_DB: f32 = -14.0;

/// Bound on chooser draws while deriving the line ordering: random policies
/// are not guaranteed to surface every line in any finite number of draws.
const ORDER_DRAW_FACTOR: usize = 16;

pub struct MixRenderer {
    source: PathBuf,
    line_dir: PathBuf,
    policy: ChooserPolicy,
    params: EffectParams,
    initial_line_delay: f64,
    mantra_start_delay: f64,
    background: Option<PathBuf>,
    mantra: Option<PathBuf>,
}

impl MixRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: PathBuf,
        line_dir: PathBuf,
        policy: ChooserPolicy,
        params: EffectParams,
        initial_line_delay: f64,
        mantra_start_delay: f64,
        background: Option<PathBuf>,
        mantra: Option<PathBuf>,
    ) -> Self {
        Self {
            source,
            line_dir,
            policy,
            params,
            initial_line_delay,
            mantra_start_delay,
            background,
            mantra,
        }
    }

    /// Render the full mix and write it to `output`.
    pub fn render(&self, engine: &dyn SpeechEngine, output: &Path) -> Result<()> {
        if output.extension().and_then(|e| e.to_str()) != Some("wav") {
            return Err(Error::Render(format!(
                "mix output must be a .wav file, got {}",
                output.display()
            )));
        }

        let lines = read_source_lines(&self.source)?;
        if lines.is_empty() {
            return Err(Error::Render(format!(
                "no lines found in {}",
                self.source.display()
            )));
        }

        std::fs::create_dir_all(&self.line_dir)?;
        let mapping = generate_once(&lines, &self.line_dir, engine);

        let registry = Arc::new(LineRegistry::new());
        registry.replace(mapping);

        let ordered = self.line_ordering(&registry);
        let mix = self.place_lines(&ordered)?;
        let mix = self.overlay_beds(mix);

        write_wav_mono(output, &mix, RENDER_SAMPLE_RATE)?;
        info!(
            "Exported {:.1}s mix to {}",
            mix.len() as f64 / f64::from(RENDER_SAMPLE_RATE),
            output.display()
        );
        Ok(())
    }

    /// Derive the playback order by driving the configured chooser until it
    /// has surfaced every line, with a bounded number of draws. Lines the
    /// chooser never surfaced are appended in insertion order.
    fn line_ordering(&self, registry: &Arc<LineRegistry>) -> Vec<Line> {
        let total = registry.len();
        let mut chooser = self.policy.build(Arc::clone(registry));

        let mut seen = HashSet::with_capacity(total);
        let mut ordered = Vec::with_capacity(total);

        for _ in 0..total.saturating_mul(ORDER_DRAW_FACTOR) {
            if ordered.len() == total {
                break;
            }
            let line = chooser.next_line();
            if seen.insert(line.text.clone()) {
                ordered.push(line);
            }
        }

        for line in registry.snapshot() {
            if !seen.contains(&line.text) {
                ordered.push(line);
            }
        }

        ordered
    }

    /// Process each line through the effects chain and overlap-add it into
    /// the mix. Line `n+1` starts where line `n`'s dry signal ends, so echo
    /// tails overlap the next line just as in live playback.
    fn place_lines(&self, ordered: &[Line]) -> Result<Vec<f32>> {
        let rate = f64::from(RENDER_SAMPLE_RATE);
        let chain = EchoChain::new(&self.params, RENDER_SAMPLE_RATE);
        let tail = (self.params.tail_seconds() * rate) as usize;

        let mut mix: Vec<f32> = Vec::new();
        let mut cursor = (self.initial_line_delay * rate) as usize;
        let mut placed = 0usize;

        for line in ordered {
            let dry = match load_mono(&line.filepath, RENDER_SAMPLE_RATE) {
                Ok(dry) => dry,
                Err(e) => {
                    warn!("Skipping line '{}' in mix: {}", line.text, e);
                    continue;
                }
            };
            let dry_len = dry.len();

            let mut padded = dry;
            padded.resize(dry_len + tail, 0.0);
            let wet = chain.process(&padded);

            overlap_add(&mut mix, &wet, cursor);
            cursor += dry_len;
            placed += 1;
        }

        if placed == 0 {
            return Err(Error::Render("no usable line audio to mix".to_string()));
        }
        Ok(mix)
    }

    /// Overlay the background bed over the whole mix and the mantra from its
    /// start delay, both looped to the end.
    fn overlay_beds(&self, mut mix: Vec<f32>) -> Vec<f32> {
        if let Some(path) = &self.background {
            match load_mono(path, RENDER_SAMPLE_RATE) {
                Ok(bed) => loop_overlay(&mut mix, &bed, db_to_gain(BACKGROUND_GAIN_DB), 0),
                Err(e) => warn!("Skipping background overlay {}: {}", path.display(), e),
            }
        }

        if let Some(path) = &self.mantra {
            let start = (self.mantra_start_delay * f64::from(RENDER_SAMPLE_RATE)) as usize;
            if start >= mix.len() {
                warn!(
                    "Mantra start delay {:?} is past the end of the mix, skipping overlay",
                    Duration::from_secs_f64(self.mantra_start_delay)
                );
            } else {
                match load_mono(path, RENDER_SAMPLE_RATE) {
                    Ok(mantra) => {
                        loop_overlay(&mut mix, &mantra, db_to_gain(MANTRA_GAIN_DB), start)
                    }
                    Err(e) => warn!("Skipping mantra overlay {}: {}", path.display(), e),
                }
            }
        }

        mix
    }
}

/// Add `src` into `buffer` starting at `offset`, growing the buffer as
/// needed.
fn overlap_add(buffer: &mut Vec<f32>, src: &[f32], offset: usize) {
    let end = offset + src.len();
    if buffer.len() < end {
        buffer.resize(end, 0.0);
    }
    for (slot, sample) in buffer[offset..end].iter_mut().zip(src) {
        *slot += sample;
    }
}

/// Mix `src` into `buffer[start..]` at `gain`, repeating `src` until the end
/// of the buffer. Never extends the buffer.
fn loop_overlay(buffer: &mut [f32], src: &[f32], gain: f32, start: usize) {
    if src.is_empty() || start >= buffer.len() {
        return;
    }
    for (i, slot) in buffer[start..].iter_mut().enumerate() {
        *slot += src[i % src.len()] * gain;
    }
}
