//! Tag storage.
//!
//! - [`Registry`]: process-wide, lock-guarded table of tags shared by the tick
//!   loop, the OPC UA server and the gateway bridge.
//! - [`TagTable`]: the table itself, handed to simulation and control code
//!   inside a single registry transaction.
//! - [`TelemetrySnapshot`]: immutable copy of a subset of tags.
//!
//! # Example
//!
//! ```rust
//! use procsim::core::data::TagSpec;
//! use procsim::store::Registry;
//!
//! let registry = Registry::from_specs(&[TagSpec::new("flow_in", 0.0)]).unwrap();
//! let snapshot = registry.snapshot(&["flow_in"]).unwrap();
//! assert_eq!(snapshot.len(), 1);
//! ```

mod registry;
mod snapshot;

pub use registry::{Registry, TagTable};
pub use snapshot::TelemetrySnapshot;
