//! Core abstractions shared by every part of a station.
//!
//! This module provides the tag value model, the error type and the traits
//! at the seams between simulation, control, telemetry and gateway code.

pub mod data;
pub mod error;
pub mod logging;
pub mod traits;

pub use data::*;
pub use error::{Result, SimError};
pub use traits::*;
