//! Capability traits implemented by codec collaborators
//!
//! The resolver only ever talks to codecs through these four traits:
//!
//! - [`LoaderFactory`]: declares MIME types and flavors, creates [`Loader`]s
//! - [`Loader`]: decodes a described source into one flavor
//! - [`Converter`]: pure in-memory transform between flavors
//! - [`Preloader`]: resolves a source identifier into an [`ImageDescriptor`]
//!
//! Every implementation exposes an `implementation_id` so deployments can
//! attach additional penalties to it.

use crate::artifact::Artifact;
use crate::descriptor::ImageDescriptor;
use crate::error::{ConvertError, LoadError};
use crate::flavor::Flavor;
use crate::penalty::Penalty;
use crate::session::{LoadHints, SessionContext};

/// Creates loaders for the MIME types it understands
pub trait LoaderFactory: Send + Sync {
    /// Identifier used for penalty overrides
    fn implementation_id(&self) -> &str;

    /// MIME types this factory can decode
    fn supported_mime_types(&self) -> Vec<String>;

    /// Flavors producible for one MIME type
    fn supported_flavors(&self, mime_type: &str) -> Vec<Flavor>;

    /// Whether the underlying codec is present in this environment
    ///
    /// Unavailable factories stay registered but are never offered.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether this factory can decode the described source
    fn is_supported(&self, _descriptor: &ImageDescriptor) -> bool {
        true
    }

    /// Create a loader producing `flavor`
    ///
    /// Returns `None` if the flavor is not producible after all.
    fn new_loader(&self, flavor: &Flavor) -> Option<Box<dyn Loader>>;
}

/// Decodes a source into one flavor
pub trait Loader: Send + Sync {
    /// Flavor produced by [`Loader::load`]
    fn target_flavor(&self) -> Flavor;

    /// Base cost of using this loader
    fn usage_penalty(&self) -> Penalty;

    /// Decode the described source
    ///
    /// # Errors
    /// - `LoadError::NotFound` if the source cannot be opened
    /// - `LoadError::Decode` on malformed input
    fn load(
        &self,
        descriptor: &ImageDescriptor,
        hints: &LoadHints,
        session: &SessionContext,
    ) -> Result<Artifact, LoadError>;
}

/// Pure transform from one in-memory flavor to another
///
/// Source and target flavors are declared statically so the conversion
/// graph can be built without running anything.
pub trait Converter: Send + Sync {
    /// Identifier used for penalty overrides
    fn implementation_id(&self) -> &str;

    /// Flavors accepted as input
    fn source_flavors(&self) -> Vec<Flavor>;

    /// Flavor produced
    fn target_flavor(&self) -> Flavor;

    /// Base cost of one conversion
    fn conversion_penalty(&self) -> Penalty;

    /// Convert an artifact
    ///
    /// # Errors
    /// Returns `ConvertError` if the input is malformed or of the wrong payload type
    fn convert(&self, artifact: &Artifact, hints: &LoadHints) -> Result<Artifact, ConvertError>;
}

/// Resolves source identifiers into descriptors
pub trait Preloader: Send + Sync {
    /// Identifier for diagnostics
    fn implementation_id(&self) -> &str;

    /// Lower values are consulted first
    fn priority(&self) -> i32 {
        0
    }

    /// Describe a source
    ///
    /// Returns `Ok(None)` when this preloader does not apply to the source.
    ///
    /// # Errors
    /// - `LoadError::NotFound` if the source does not exist
    /// - `LoadError::Decode` if the header is malformed
    fn preload(
        &self,
        source_id: &str,
        session: &SessionContext,
    ) -> Result<Option<ImageDescriptor>, LoadError>;
}
