//! Error types reported by collaborators at the capability boundary

/// Errors from loaders and preloaders
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Source cannot be located or opened
    #[error("source not found: {source_id}")]
    NotFound { source_id: String },

    /// Loader rejected malformed input
    #[error("decode failed in {implementation}: {message}")]
    Decode {
        implementation: String,
        message: String,
    },

    /// IO failure while reading the source
    #[error("io error reading {source_id}: {source}")]
    Io {
        source_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Loader cannot produce the requested flavor
    #[error("unsupported load request: {0}")]
    Unsupported(String),
}

impl LoadError {
    /// Create not-found error
    pub fn not_found(source_id: impl Into<String>) -> Self {
        Self::NotFound {
            source_id: source_id.into(),
        }
    }

    /// Create decode error
    pub fn decode(implementation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            implementation: implementation.into(),
            message: message.into(),
        }
    }

    /// Create IO error, mapping `NotFound` IO errors to [`LoadError::NotFound`]
    pub fn io(source_id: impl Into<String>, source: std::io::Error) -> Self {
        let source_id = source_id.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { source_id }
        } else {
            Self::Io { source_id, source }
        }
    }

    /// Whether the source itself is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from converters
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Converter rejected malformed input
    #[error("conversion failed in {implementation}: {message}")]
    Decode {
        implementation: String,
        message: String,
    },

    /// Artifact payload is not the type the converter expects
    #[error("unexpected payload for flavor {flavor}: expected {expected}")]
    UnexpectedPayload { expected: String, flavor: String },
}

impl ConvertError {
    /// Create decode error
    pub fn decode(implementation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            implementation: implementation.into(),
            message: message.into(),
        }
    }
}

/// Errors defining flavors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlavorError {
    /// Name already defined with another parent
    #[error("flavor '{name}' already defined with parent {existing_parent:?}")]
    Conflict {
        name: String,
        existing_parent: Option<String>,
    },

    /// Name already defined with another compatibility set
    #[error("flavor '{name}' already defined as compatible with {existing:?}")]
    CompatibilityConflict { name: String, existing: Vec<String> },

    /// Parent chain would loop back to this flavor
    #[error("flavor '{name}' would refine itself")]
    Cycle { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_display() {
        let err = LoadError::not_found("a.png");
        assert_eq!(err.to_string(), "source not found: a.png");
        assert!(err.is_not_found());
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(LoadError::io("a.png", io).is_not_found());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(!LoadError::io("a.png", io).is_not_found());
    }

    #[test]
    fn convert_error_display() {
        let err = ConvertError::decode("gray", "bad stride");
        assert_eq!(err.to_string(), "conversion failed in gray: bad stride");
    }
}
