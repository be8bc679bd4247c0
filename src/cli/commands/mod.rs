//! CLI command implementations.

mod config;
mod doctor;
mod search;
mod serve;
mod transcribe;

pub use config::run_config;
pub use doctor::run_doctor;
pub use search::run_search;
pub use serve::run_serve;
pub use transcribe::run_transcribe;
