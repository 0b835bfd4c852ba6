//! Line descriptors
//!
//! A [`Line`] is one canonical unit of spoken text plus its rendered audio
//! descriptor. Identity is the canonicalized text: equality and hashing
//! ignore the filepath and duration, which are derived values.

use crate::audio::decode;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of spoken text and its generated audio file.
#[derive(Debug, Clone)]
pub struct Line {
    /// Canonicalized line text
    pub text: String,
    /// Audio file location (content hash of the text)
    pub filepath: PathBuf,
    /// Spoken duration in seconds, `None` until the file has been measured
    pub duration: Option<f64>,
}

impl Line {
    /// Build a line from canonicalized text, deriving its audio path.
    pub fn from_text(text: &str, output_dir: &Path) -> Self {
        Self {
            text: text.to_string(),
            filepath: audio_path(text, output_dir),
            duration: None,
        }
    }

    /// Measure the audio file's duration from its header.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the file is missing or unreadable. Callers
    /// treat this as "not rendered yet" and retry later.
    pub fn measure_duration(&mut self) -> Result<()> {
        let duration = decode::probe_duration(&self.filepath)?;
        debug!("Measured {:.2}s for line: {}", duration, self.text);
        self.duration = Some(duration);
        Ok(())
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Line {}

impl Hash for Line {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

/// Canonicalize a raw source line.
///
/// Lowercases, trims whitespace, and strips trailing periods so that
/// cosmetic variants of the same sentence map to the same identity.
/// Idempotent.
pub fn clean_line(text: &str) -> String {
    text.trim().trim_end_matches('.').trim().to_lowercase()
}

/// Derive the deterministic audio path for canonicalized text.
///
/// SHA-256 of the text, hex-encoded, with a fixed `.wav` extension. The same
/// text always maps to the same file, so regeneration never re-synthesizes
/// audio that already exists.
pub fn audio_path(text: &str, output_dir: &Path) -> PathBuf {
    let digest = Sha256::digest(text.as_bytes());
    let mut name = String::with_capacity(68);
    for byte in digest {
        name.push_str(&format!("{:02x}", byte));
    }
    name.push_str(".wav");
    output_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line_strips_whitespace_and_period() {
        assert_eq!(clean_line("  relax now.  "), "relax now");
        assert_eq!(clean_line("relax now"), "relax now");
    }

    #[test]
    fn test_clean_line_is_idempotent() {
        for raw in ["  deeper. ", "deeper", "deeper.", "\tdeeper .\n"] {
            let once = clean_line(raw);
            assert_eq!(clean_line(&once), once);
        }
    }

    #[test]
    fn test_audio_path_is_deterministic() {
        let dir = Path::new("/lines");
        let a = audio_path("sink down", dir);
        let b = audio_path("sink down", dir);
        assert_eq!(a, b);
        assert_eq!(a.extension().unwrap(), "wav");
    }

    #[test]
    fn test_cosmetic_variants_share_a_path() {
        let dir = Path::new("/lines");
        let canonical = audio_path(&clean_line("let go"), dir);
        assert_eq!(audio_path(&clean_line("  let go. "), dir), canonical);
        assert_eq!(audio_path(&clean_line("let go."), dir), canonical);
        assert_eq!(audio_path(&clean_line("Let Go"), dir), canonical);
    }

    #[test]
    fn test_distinct_text_distinct_path() {
        let dir = Path::new("/lines");
        assert_ne!(audio_path("let go", dir), audio_path("hold on", dir));
    }

    #[test]
    fn test_equality_ignores_derived_fields() {
        let mut a = Line::from_text("drift", Path::new("/a"));
        let b = Line::from_text("drift", Path::new("/b"));
        a.duration = Some(2.5);
        assert_eq!(a, b);

        let c = Line::from_text("float", Path::new("/a"));
        assert_ne!(a, c);
    }
}
