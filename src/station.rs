//! Station composition: configuration, built-in presets and the runtime.

mod config;
pub mod presets;
mod runtime;

pub use config::{ServerConfig, StationConfig, StationParams};
pub use presets::{Preset, PRESETS};
pub use runtime::{Station, StationStats};
