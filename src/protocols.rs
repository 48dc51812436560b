//! Protocol adapters.
//!
//! This module contains the adapters that expose the registry over an
//! industrial protocol and pull remote values into it.

#[cfg(feature = "opcua")]
#[cfg_attr(docsrs, doc(cfg(feature = "opcua")))]
pub mod opcua;
