//! Cache errors

use pixroute_flavor::LoadError;

/// Failure to obtain a descriptor
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Source was recorded as not found and the record has not expired
    #[error("source recently reported missing: {source_id}")]
    KnownInvalid { source_id: String },

    /// No preloader could describe the source
    #[error("no preloader describes source: {source_id}")]
    Undescribed { source_id: String },

    /// Resolution failed
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl CacheError {
    /// Whether this is a not-found outcome (and so negatively cached)
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::KnownInvalid { .. } | Self::Undescribed { .. } => true,
            Self::Load(err) => err.is_not_found(),
        }
    }
}
