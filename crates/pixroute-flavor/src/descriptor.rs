//! Source descriptors
//!
//! An [`ImageDescriptor`] is the metadata resolved once per source
//! identifier (MIME type, size, ...) and cached. Its [`DescriptorId`] is a
//! content-addressed digest used as the artifact-cache key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// 32-byte Blake3 digest identifying a descriptor
///
/// Derived from the source identifier and MIME type, so the same source
/// resolved twice yields the same id. Cached descriptors use the
/// session-resolved identifier (see [`ImageDescriptor::rekeyed`]).
/// Immutable and `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DescriptorId([u8; 32]);

impl DescriptorId {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the id for a source and MIME type
    #[must_use]
    pub fn compute(source_id: &str, mime_type: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(mime_type.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for DescriptorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Metadata about one source, resolved by a preloader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    id: DescriptorId,
    source_id: String,
    mime_type: String,
    dimensions: Option<(u32, u32)>,
    byte_len: Option<u64>,
    properties: BTreeMap<String, String>,
}

impl ImageDescriptor {
    /// Create descriptor; MIME type is normalized to lowercase
    #[must_use]
    pub fn new(source_id: impl Into<String>, mime_type: &str) -> Self {
        let source_id = source_id.into();
        let mime_type = mime_type.trim().to_ascii_lowercase();
        Self {
            id: DescriptorId::compute(&source_id, &mime_type),
            source_id,
            mime_type,
            dimensions: None,
            byte_len: None,
            properties: BTreeMap::new(),
        }
    }

    /// With pixel dimensions
    #[inline]
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    /// With encoded size in bytes
    #[inline]
    #[must_use]
    pub fn with_byte_len(mut self, len: u64) -> Self {
        self.byte_len = Some(len);
        self
    }

    /// With an arbitrary property
    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Re-derive the id from the key this descriptor is cached under
    ///
    /// Preloaders may report a relative source id; the cache rekeys each
    /// descriptor with the session-resolved id so that equal relative ids
    /// under different bases get distinct ids. `source_id` is left as reported.
    #[must_use]
    pub fn rekeyed(mut self, key: &str) -> Self {
        self.id = DescriptorId::compute(key, &self.mime_type);
        self
    }

    /// Content-addressed id
    #[inline]
    #[must_use]
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Source identifier this descriptor was resolved from
    #[inline]
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Lowercase MIME type
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Width and height, when known
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Encoded size, when known
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }

    /// Property lookup
    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
