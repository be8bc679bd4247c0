//! Audio extraction and splitting.

mod extract;

pub use extract::{extract_audio, probe_duration, split_audio};
