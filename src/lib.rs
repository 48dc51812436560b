//! # procsim
//!
//! A simulated process-variable server for industrial demos and integration
//! testing.
//!
//! ## Features
//!
//! - **Tag registry**: typed float/bool tags behind one lock, so a tick is
//!   atomic to every reader
//! - **Simulation**: uniform generators with anomaly injection
//! - **Control policies**: level thresholds and a start/stop tank controller
//! - **Telemetry**: per-tick JSON POST with reconnect-on-failure
//! - **OPC UA**: server exposure of the registry and gateway polling (feature
//!   `opcua`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procsim::prelude::*;
//!
//! let config = procsim::station::presets::get("tank-system")?.config()?;
//! let station = Station::from_config(config)?;
//! station.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```
//!
//! ## Presets
//!
//! | Preset | Control | Extras |
//! |--------|---------|--------|
//! | `pumping-station` | level thresholds | anomaly injection, HTTP telemetry |
//! | `tank-system` | tank auto/manual | |
//! | `plc-bridge` | none | gateway polling |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bridge;
pub mod control;
pub mod core;
pub mod protocols;
pub mod sim;
pub mod station;
pub mod store;
pub mod telemetry;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        data::*,
        error::{Result, SimError},
        traits::*,
    };
    pub use crate::station::{Station, StationConfig};
    pub use crate::store::{Registry, TagTable, TelemetrySnapshot};
}

// Re-export core types at crate root for convenience
pub use crate::core::data::{Tag, TagSpec, Value, ValueKind};
pub use crate::core::error::{Result, SimError};
pub use crate::core::traits::{ConnectionState, ControlPolicy, RemoteSource, TelemetryTransport};

pub use crate::station::{Station, StationConfig};
pub use crate::store::Registry;
