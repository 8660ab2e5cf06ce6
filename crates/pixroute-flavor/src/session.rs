//! Caller context passed through to loaders and preloaders

use std::collections::BTreeMap;

/// Opaque per-caller context
///
/// The resolver never inspects it; loaders and preloaders use it to resolve
/// relative source identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    base: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl SessionContext {
    /// Empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base location for relative identifiers
    #[inline]
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// With attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Base location
    #[inline]
    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Attribute lookup
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Resolve a possibly relative source identifier against the base
    ///
    /// Absolute paths and identifiers with a URI scheme are returned as is.
    #[must_use]
    pub fn resolve(&self, source_id: &str) -> String {
        let absolute = source_id.starts_with('/') || source_id.contains("://");
        match &self.base {
            Some(base) if !absolute => {
                format!("{}/{}", base.trim_end_matches('/'), source_id)
            }
            _ => source_id.to_string(),
        }
    }
}

/// Free-form hints forwarded to loaders and converters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadHints(BTreeMap<String, String>);

impl LoadHints {
    /// No hints
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With hint
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Hint lookup
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether no hints are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_against_base() {
        let session = SessionContext::new().with_base("/srv/images/");
        assert_eq!(session.resolve("a.png"), "/srv/images/a.png");
    }

    #[test]
    fn resolve_keeps_absolute() {
        let session = SessionContext::new().with_base("/srv");
        assert_eq!(session.resolve("/tmp/a.png"), "/tmp/a.png");
        assert_eq!(session.resolve("http://host/a.png"), "http://host/a.png");
    }

    #[test]
    fn resolve_without_base() {
        assert_eq!(SessionContext::new().resolve("a.png"), "a.png");
    }

    #[test]
    fn hints() {
        let hints = LoadHints::new().with("dpi", "300");
        assert_eq!(hints.get("dpi"), Some("300"));
        assert!(!hints.is_empty());
        assert!(LoadHints::new().is_empty());
    }
}
