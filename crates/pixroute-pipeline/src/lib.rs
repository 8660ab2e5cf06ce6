//! pixroute Pipeline Resolution
//!
//! Turns the registry's converters into a weighted graph and finds the
//! cheapest way to obtain an image in a requested flavor.
//!
//! # Core Concepts
//!
//! - [`ConversionGraph`]: Flavors as nodes, converters as weighted edges
//! - [`GraphCache`]: Rebuilds the graph when the registry changes
//! - [`PipelineResolver`]: Least-penalty search with deterministic tie-breaks
//! - [`Pipeline`]: Optional loader step plus converter steps, executable
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pixroute_flavor::{Artifact, Flavor};
//! use pixroute_pipeline::{PipelineResolver, PipelineSource};
//! use pixroute_registry::CapabilityRegistry;
//!
//! let registry = Arc::new(CapabilityRegistry::new());
//! let resolver = PipelineResolver::new(Arc::clone(&registry));
//!
//! let gray = Flavor::define("doc.gray");
//! let artifact = Artifact::new(gray.clone(), vec![0u8; 16]);
//!
//! let pipeline = resolver
//!     .resolve(PipelineSource::Artifact(&artifact), &[gray])
//!     .unwrap();
//! assert!(pipeline.is_identity());
//!
//! let elsewhere = Flavor::define("doc.elsewhere");
//! assert!(resolver.resolve(PipelineSource::Artifact(&artifact), &[elsewhere]).is_none());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod graph;
mod pipeline;
mod resolver;

pub use error::PipelineError;
pub use graph::{ConversionEdge, ConversionGraph, GraphCache};
pub use pipeline::{ConversionStep, LoaderStep, Pipeline, PipelineSource};
pub use resolver::PipelineResolver;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
