//! pixroute Capability Registry
//!
//! Runtime catalog of the codecs a host has available.
//!
//! # Core Concepts
//!
//! - [`CapabilityRegistry`]: Thread-safe registration and lookup
//! - [`RegistryState`]: Immutable snapshot published on every registration
//! - [`ProviderRegistration`] / [`CapabilityProvider`]: Plugin discovery
//!
//! # Example
//!
//! ```rust
//! use pixroute_registry::CapabilityRegistry;
//! use pixroute_flavor::Penalty;
//!
//! let registry = CapabilityRegistry::new();
//! registry.set_additional_penalty("slow-codec", Some(Penalty::new(50)));
//!
//! assert_eq!(registry.additional_penalty("slow-codec"), Penalty::new(50));
//! assert_eq!(registry.converter_generation(), 0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod discovery;
mod registry;
mod state;

pub use discovery::{CapabilityProvider, ProviderRegistration};
pub use registry::CapabilityRegistry;
pub use state::{PreloaderEntry, RegistryState};

pub use inventory;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
