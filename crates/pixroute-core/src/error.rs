//! Error types for pixroute Core
//!
//! Maps the lower layers onto the outcomes callers act on:
//! - Not found (negatively cached, retried after expiry)
//! - Unsupported conversion (never cached; the registry may change)
//! - Decode failures (always propagated)
//! - Configuration problems

use pixroute_cache::CacheError;
use pixroute_flavor::{Flavor, LoadError};
use pixroute_pipeline::PipelineError;
use std::path::PathBuf;

/// Main pixroute error type
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Source cannot be located
    #[error("source not found: {source_id}")]
    NotFound { source_id: String },

    /// No pipeline reaches any requested flavor
    #[error("no conversion from {from} to any of {targets:?}")]
    UnsupportedConversion { from: String, targets: Vec<String> },

    /// Describing the source failed
    #[error("describe failed: {0}")]
    Describe(#[source] LoadError),

    /// Loading or converting failed
    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background housekeeping could not start
    #[error("housekeeping thread failed to start: {0}")]
    Housekeeping(#[source] std::io::Error),
}

impl ImageError {
    pub fn not_found(source_id: impl Into<String>) -> Self {
        Self::NotFound {
            source_id: source_id.into(),
        }
    }

    pub fn unsupported<'a>(from: impl Into<String>, targets: impl IntoIterator<Item = &'a Flavor>) -> Self {
        Self::UnsupportedConversion {
            from: from.into(),
            targets: targets.into_iter().map(|f| f.name().to_string()).collect(),
        }
    }

    /// Check if the source could not be located
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if no route exists
    #[inline]
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedConversion { .. })
    }
}

impl From<CacheError> for ImageError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::KnownInvalid { source_id } | CacheError::Undescribed { source_id } => {
                Self::NotFound { source_id }
            }
            CacheError::Load(LoadError::NotFound { source_id }) => Self::NotFound { source_id },
            CacheError::Load(err) => Self::Describe(err),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
