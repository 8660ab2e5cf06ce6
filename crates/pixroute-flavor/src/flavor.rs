//! Representation tags
//!
//! A [`Flavor`] names one representation of an image ("raster pixels",
//! "encoded bytes", ...). Flavors may refine a more general parent and may
//! declare extra flavors they are compatible with. Flavors live in a
//! process-wide catalog and are never removed.

use crate::error::FlavorError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

static CATALOG: Lazy<DashMap<String, Flavor>> = Lazy::new(DashMap::new);

/// Named representation tag
///
/// Cheap to clone (shared definition). Equality and hashing use the name,
/// which is unique across the process.
///
/// # Invariants
/// - `f.is_compatible(&f)` for every flavor
/// - If `a` refines `b` and `b` refines `c`, then `a.is_compatible(&c)`
#[derive(Clone)]
pub struct Flavor(Arc<FlavorDef>);

struct FlavorDef {
    name: String,
    parent: Option<Flavor>,
    compatible: Vec<Flavor>,
}

impl Flavor {
    /// Define (or fetch) a root flavor with the given name
    ///
    /// If a flavor of this name already exists it is returned unchanged.
    #[must_use]
    pub fn define(name: &str) -> Self {
        CATALOG
            .entry(name.to_string())
            .or_insert_with(|| {
                Self(Arc::new(FlavorDef {
                    name: name.to_string(),
                    parent: None,
                    compatible: Vec::new(),
                }))
            })
            .clone()
    }

    /// Start building a flavor with a parent and/or compatibility set
    #[inline]
    #[must_use]
    pub fn builder(name: &str) -> FlavorBuilder {
        FlavorBuilder {
            name: name.to_string(),
            parent: None,
            compatible: Vec::new(),
        }
    }

    /// Look up a previously defined flavor
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        CATALOG.get(name).map(|f| f.clone())
    }

    /// Unique name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The more general flavor this one refines
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Flavor> {
        self.0.parent.as_ref()
    }

    /// Flavors explicitly declared compatible by this definition
    #[inline]
    #[must_use]
    pub fn declared_compatible(&self) -> &[Flavor] {
        &self.0.compatible
    }

    /// This flavor followed by every ancestor, nearest first
    pub fn lineage(&self) -> impl Iterator<Item = &Flavor> {
        std::iter::successors(Some(self), |f| f.parent())
    }

    /// Whether an artifact of this flavor satisfies a request for `other`
    ///
    /// True when `other` is this flavor, one of its ancestors, or appears in
    /// the declared compatibility set of this flavor or any ancestor.
    #[must_use]
    pub fn is_compatible(&self, other: &Flavor) -> bool {
        self.lineage()
            .any(|f| f == other || f.declared_compatible().contains(other))
    }

    /// Whether this flavor refines `ancestor` (directly or transitively)
    #[must_use]
    pub fn refines(&self, ancestor: &Flavor) -> bool {
        self.lineage().skip(1).any(|f| f == ancestor)
    }
}

impl PartialEq for Flavor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for Flavor {}

impl Hash for Flavor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl PartialOrd for Flavor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Flavor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl Debug for Flavor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Flavor({})", self.0.name)
    }
}

impl Display for Flavor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Builder for flavors with a parent or compatibility declarations
#[derive(Debug)]
pub struct FlavorBuilder {
    name: String,
    parent: Option<Flavor>,
    compatible: Vec<Flavor>,
}

impl FlavorBuilder {
    /// Set the flavor this one refines
    #[inline]
    #[must_use]
    pub fn refines(mut self, parent: &Flavor) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declare an additional compatible flavor
    #[inline]
    #[must_use]
    pub fn compatible_with(mut self, other: &Flavor) -> Self {
        self.compatible.push(other.clone());
        self
    }

    /// Register the flavor in the process-wide catalog
    ///
    /// Defining the same name twice with the same parent and compatibility
    /// set returns the existing flavor.
    ///
    /// # Errors
    /// - `FlavorError::Conflict` if the name exists with a different parent
    /// - `FlavorError::CompatibilityConflict` if the name exists with a
    ///   different compatibility set
    /// - `FlavorError::Cycle` if the parent chain already contains this name
    pub fn define(self) -> Result<Flavor, FlavorError> {
        if let Some(parent) = &self.parent {
            if parent.lineage().any(|f| f.name() == self.name) {
                return Err(FlavorError::Cycle { name: self.name });
            }
        }

        let entry = CATALOG.entry(self.name.clone()).or_insert_with(|| {
            Flavor(Arc::new(FlavorDef {
                name: self.name.clone(),
                parent: self.parent.clone(),
                compatible: self.compatible.clone(),
            }))
        });

        let existing = entry.value().clone();
        drop(entry);

        if existing.parent() != self.parent.as_ref() {
            return Err(FlavorError::Conflict {
                name: self.name,
                existing_parent: existing.parent().map(|p| p.name().to_string()),
            });
        }

        let existing_names = sorted_names(existing.declared_compatible());
        if existing_names != sorted_names(&self.compatible) {
            return Err(FlavorError::CompatibilityConflict {
                name: self.name,
                existing: existing_names,
            });
        }
        Ok(existing)
    }
}

fn sorted_names(flavors: &[Flavor]) -> Vec<String> {
    let mut names: Vec<String> = flavors.iter().map(|f| f.name().to_string()).collect();
    names.sort();
    names.dedup();
    names
}

/// Flavors every deployment understands
pub mod well_known {
    use super::Flavor;
    use once_cell::sync::Lazy;

    static IMAGE: Lazy<Flavor> = Lazy::new(|| Flavor::define("image"));

    static RASTER: Lazy<Flavor> = Lazy::new(|| {
        Flavor::builder("raster")
            .refines(&IMAGE)
            .define()
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "raster predefined elsewhere; using it without the image parent");
                Flavor::define("raster")
            })
    });

    static ENCODED_BYTES: Lazy<Flavor> = Lazy::new(|| Flavor::define("encoded-bytes"));

    /// Generic "any image representation"
    #[must_use]
    pub fn image() -> Flavor {
        IMAGE.clone()
    }

    /// Decoded pixels; refines [`image`]
    #[must_use]
    pub fn raster() -> Flavor {
        RASTER.clone()
    }

    /// Raw encoded bytes of the original format
    #[must_use]
    pub fn encoded_bytes() -> Flavor {
        ENCODED_BYTES.clone()
    }
}
