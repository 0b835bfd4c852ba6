//! Speech synthesis engine
//!
//! The synthesis backend is an external TTS command invoked per phrase.
//! The trait seam lets tests substitute a fake engine that writes WAV
//! fixtures instead of shelling out.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub trait SpeechEngine: Send {
    /// Synthesize `text` into a WAV file at `output`.
    fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
}

/// Shells out to an espeak-ng style command: `<program> -w <wav> <text>`.
pub struct CommandEngine {
    program: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SpeechEngine for CommandEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        debug!("Synthesizing to {}: {}", output.display(), text);

        let status = Command::new(&self.program)
            .arg("-w")
            .arg(output)
            .arg(text)
            .status()
            .map_err(|e| Error::Synthesis(format!("cannot run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(Error::Synthesis(format!(
                "{} exited with {} for '{}'",
                self.program, status, text
            )));
        }
        Ok(())
    }
}
