//! Line identity, shared registry, and selection policies

pub mod chooser;
pub mod line;
pub mod registry;

pub use chooser::{LineChooser, POLL_INTERVAL};
pub use line::{audio_path, clean_line, Line};
pub use registry::LineRegistry;
