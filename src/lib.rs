//! # entrain
//!
//! Looped spoken-word playback with pitch-shifted echo layering.
//!
//! **Purpose:** Generate audio for each line of a source text file, then play
//! the lines back in a configurable order across two alternating playback
//! channels so one line's echo tail overlaps the next line's onset, over a
//! repeating background tone/noise and an optional mantra track.
//!
//! **Architecture:** Blocking worker threads around a shared line registry,
//! using symphonia + rubato + cpal for the audio path.

pub mod audio;
pub mod config;
pub mod error;
pub mod gen;
pub mod lines;
pub mod playback;
pub mod render;

pub use error::{Error, Result};
