//! pixroute Core - Image Manager
//!
//! Loads images from sources and converts them between representations,
//! choosing the cheapest chain of codecs available at runtime.
//!
//! # Core Concepts
//!
//! - [`ImageManager`]: Facade over registry, resolver and cache
//! - [`PixrouteConfig`]: TOML configuration (penalties, expiry, capacities)
//! - [`ImageError`]: Not found, unsupported conversion, decode and config failures
//! - [`logging`]: Subscriber setup for hosts and tests
//!
//! # Example
//!
//! ```rust
//! use pixroute_core::prelude::*;
//!
//! # fn main() -> Result<(), ImageError> {
//! let config = PixrouteConfig::new()
//!     .with_plugin_discovery(false)
//!     .with_penalty_override("legacy-jp2", Penalty::INFINITE);
//!
//! let manager = ImageManager::builder().with_config(config).build()?;
//! assert_eq!(manager.registry().additional_penalty("legacy-jp2"), Penalty::INFINITE);
//!
//! let gray = Flavor::define("example.gray");
//! let artifact = Artifact::new(gray.clone(), vec![0u8; 4]);
//! let same = manager.convert(&artifact, &[gray], &LoadHints::new(), &SessionContext::new())?;
//! assert!(same.ptr_eq(&artifact));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;

// Re-exports for convenience
pub use config::{PenaltySetting, PixrouteConfig};
pub use error::{ConfigError, ImageError};
pub use manager::{ImageManager, ImageManagerBuilder};

pub use pixroute_cache as cache;
pub use pixroute_flavor as flavor;
pub use pixroute_pipeline as pipeline;
pub use pixroute_registry as registry;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with pixroute
    pub use crate::{ImageError, ImageManager, PixrouteConfig};
    pub use pixroute_flavor::{
        well_known, Artifact, Converter, Flavor, ImageDescriptor, LoadHints, Loader,
        LoaderFactory, Penalty, Preloader, SessionContext,
    };
    pub use pixroute_pipeline::{Pipeline, PipelineSource};
    pub use pixroute_registry::{CapabilityProvider, CapabilityRegistry, ProviderRegistration};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
