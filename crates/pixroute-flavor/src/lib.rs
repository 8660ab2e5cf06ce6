//! pixroute Flavor System
//!
//! Vocabulary shared by the registry, the resolver and the cache.
//!
//! # Core Concepts
//!
//! - [`Flavor`]: Named representation tag with a refinement chain
//! - [`Penalty`]: Saturating cost with an "ineligible" sentinel
//! - [`ImageDescriptor`] / [`DescriptorId`]: Per-source metadata and its content address
//! - [`Artifact`]: Type-erased in-memory image in one flavor
//! - [`LoaderFactory`], [`Loader`], [`Converter`], [`Preloader`]: Codec boundary traits
//!
//! # Example
//!
//! ```rust
//! use pixroute_flavor::{Flavor, Penalty};
//!
//! let image = Flavor::define("doc.image");
//! let raster = Flavor::builder("doc.raster").refines(&image).define().unwrap();
//! assert!(raster.is_compatible(&image));
//!
//! assert_eq!(Penalty::new(5) + Penalty::new(3), Penalty::new(8));
//! assert!((Penalty::INFINITE + Penalty::new(1)).is_infinite());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod artifact;
mod capability;
mod descriptor;
mod error;
mod flavor;
mod penalty;
mod session;

// Re-exports
pub use artifact::Artifact;
pub use capability::{Converter, Loader, LoaderFactory, Preloader};
pub use descriptor::{DescriptorId, ImageDescriptor};
pub use error::{ConvertError, FlavorError, LoadError};
pub use flavor::{well_known, Flavor, FlavorBuilder};
pub use penalty::Penalty;
pub use session::{LoadHints, SessionContext};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
