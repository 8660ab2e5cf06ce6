//! Pipeline execution errors

use pixroute_flavor::{ConvertError, Flavor, LoadError};

/// Failure while executing a resolved pipeline
///
/// The first failing step aborts the pipeline; intermediate artifacts are dropped.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The loader step failed
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// A converter step failed
    #[error("conversion failed in {implementation}: {source}")]
    Convert {
        /// Converter that failed
        implementation: String,
        /// Underlying error
        #[source]
        source: ConvertError,
    },

    /// Pipeline begins with a loader but was given an artifact
    #[error("pipeline starts with a loader and needs a descriptor")]
    MissingDescriptor,

    /// Pipeline has no loader but was given a descriptor
    #[error("pipeline starts from an artifact and needs one")]
    MissingArtifact,

    /// A step produced a flavor other than the one it declared
    #[error("{implementation} produced {actual}, expected {expected}")]
    FlavorMismatch {
        /// Offending implementation
        implementation: String,
        /// Declared flavor
        expected: Flavor,
        /// Produced flavor
        actual: Flavor,
    },
}

impl PipelineError {
    /// Create a conversion error
    #[must_use]
    pub fn convert(implementation: impl Into<String>, source: ConvertError) -> Self {
        Self::Convert {
            implementation: implementation.into(),
            source,
        }
    }

    /// Whether the source itself could not be found
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Load(err) if err.is_not_found())
    }
}
