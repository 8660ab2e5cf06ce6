//! Type-erased in-memory artifacts
//!
//! An [`Artifact`] pairs a payload with the [`Flavor`] it represents.
//! Payloads are shared (`Arc`) so cloning an artifact never copies pixels.

use crate::flavor::Flavor;
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// In-memory representation of an image in one flavor
///
/// # Invariants
/// - `flavor` describes the payload; converters rely on it for dispatch
/// - Clones share the payload; [`Artifact::ptr_eq`] detects that
#[derive(Clone)]
pub struct Artifact {
    flavor: Flavor,
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Artifact {
    /// Wrap a payload
    #[inline]
    #[must_use]
    pub fn new<T: Any + Send + Sync>(flavor: Flavor, payload: T) -> Self {
        Self::from_arc(flavor, Arc::new(payload))
    }

    /// Wrap an already shared payload
    #[inline]
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(flavor: Flavor, payload: Arc<T>) -> Self {
        Self {
            flavor,
            payload,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Flavor of the payload
    #[inline]
    #[must_use]
    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// Borrow payload as `T`
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Share payload as `Arc<T>`
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.payload).downcast::<T>().ok()
    }

    /// Whether `T` is the payload type
    #[inline]
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Rust type name of the payload (diagnostics only)
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both artifacts share the same payload instance
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Artifact) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl Debug for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("flavor", &self.flavor)
            .field("payload", &self.type_name)
            .finish()
    }
}
