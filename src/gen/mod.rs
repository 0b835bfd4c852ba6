//! Text-to-speech generation: source file watching, segment parsing, and
//! synthesis through an external speech engine

pub mod engine;
pub mod segment;
pub mod worker;

pub use engine::{CommandEngine, SpeechEngine};
pub use segment::{parse_segments, Segment};
pub use worker::{generate_once, read_source_lines, GenerationWorker};
