//! Audio decode, resample, effects, and device output

pub mod decode;
pub mod effects;
pub mod output;
pub mod resampler;

pub use decode::{load_mono, load_native, probe_duration, AudioDecoder};
pub use effects::{db_to_gain, EchoChain};
pub use output::{AudioSink, CpalOutput};
