//! Immutable registry state
//!
//! Every registration publishes a fresh [`RegistryState`]; readers holding an
//! older `Arc<RegistryState>` keep a consistent view.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use pixroute_flavor::{Converter, Flavor, LoaderFactory, Penalty, Preloader};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Registered preloader with its registration ordinal
#[derive(Clone)]
pub struct PreloaderEntry {
    registration_id: u64,
    preloader: Arc<dyn Preloader>,
}

impl PreloaderEntry {
    /// Monotonic registration ordinal (priority tie-break)
    #[inline]
    #[must_use]
    pub fn registration_id(&self) -> u64 {
        self.registration_id
    }

    /// Priority (lower first)
    #[inline]
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.preloader.priority()
    }

    /// The preloader
    #[inline]
    #[must_use]
    pub fn preloader(&self) -> &Arc<dyn Preloader> {
        &self.preloader
    }
}

impl Debug for PreloaderEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloaderEntry")
            .field("id", &self.preloader.implementation_id())
            .field("priority", &self.priority())
            .field("registration_id", &self.registration_id)
            .finish()
    }
}

type FactoriesByFlavor = IndexMap<Flavor, Vec<Arc<dyn LoaderFactory>>>;

/// Consistent snapshot of everything registered
pub struct RegistryState {
    preloaders: Vec<PreloaderEntry>,
    sorted_preloaders: OnceCell<Arc<[PreloaderEntry]>>,
    loader_factories: IndexMap<String, FactoriesByFlavor>,
    converters: Vec<Arc<dyn Converter>>,
    overrides: HashMap<String, Penalty>,
    converter_generation: u64,
    override_revision: u64,
    next_registration_id: u64,
}

impl RegistryState {
    pub(crate) fn empty() -> Self {
        Self {
            preloaders: Vec::new(),
            sorted_preloaders: OnceCell::new(),
            loader_factories: IndexMap::new(),
            converters: Vec::new(),
            overrides: HashMap::new(),
            converter_generation: 0,
            override_revision: 0,
            next_registration_id: 0,
        }
    }

    /// Copy for the next publication; the preloader sort cache starts empty
    pub(crate) fn successor(&self) -> Self {
        Self {
            preloaders: self.preloaders.clone(),
            sorted_preloaders: OnceCell::new(),
            loader_factories: self.loader_factories.clone(),
            converters: self.converters.clone(),
            overrides: self.overrides.clone(),
            converter_generation: self.converter_generation,
            override_revision: self.override_revision,
            next_registration_id: self.next_registration_id,
        }
    }

    pub(crate) fn push_preloader(&mut self, preloader: Arc<dyn Preloader>) -> u64 {
        let registration_id = self.next_registration_id;
        self.next_registration_id += 1;
        self.preloaders.push(PreloaderEntry {
            registration_id,
            preloader,
        });
        registration_id
    }

    pub(crate) fn push_loader_factory(&mut self, mime_type: &str, flavor: Flavor, factory: Arc<dyn LoaderFactory>) {
        self.loader_factories
            .entry(mime_type.to_string())
            .or_default()
            .entry(flavor)
            .or_default()
            .push(factory);
    }

    pub(crate) fn push_converter(&mut self, converter: Arc<dyn Converter>) {
        self.converters.push(converter);
        self.converter_generation += 1;
    }

    pub(crate) fn set_override(&mut self, implementation_id: &str, penalty: Option<Penalty>) {
        match penalty {
            Some(p) => {
                self.overrides.insert(implementation_id.to_string(), p);
            }
            None => {
                self.overrides.remove(implementation_id);
            }
        }
        self.override_revision += 1;
    }

    /// Available factories for one MIME type and flavor, in registration order
    #[must_use]
    pub fn loader_factories_for(&self, mime_type: &str, flavor: &Flavor) -> Vec<Arc<dyn LoaderFactory>> {
        self.loader_factories
            .get(&normalize_mime(mime_type))
            .and_then(|by_flavor| by_flavor.get(flavor))
            .map(|factories| {
                factories
                    .iter()
                    .filter(|f| f.is_available())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Available factories for one MIME type, paired with the flavor they produce
    #[must_use]
    pub fn loader_factories_for_mime(&self, mime_type: &str) -> Vec<(Flavor, Arc<dyn LoaderFactory>)> {
        self.loader_factories
            .get(&normalize_mime(mime_type))
            .map(|by_flavor| {
                by_flavor
                    .iter()
                    .flat_map(|(flavor, factories)| {
                        factories
                            .iter()
                            .filter(|f| f.is_available())
                            .map(move |f| (flavor.clone(), Arc::clone(f)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// MIME types with at least one available factory
    #[must_use]
    pub fn loader_mime_types(&self) -> Vec<String> {
        self.loader_factories
            .iter()
            .filter(|(_, by_flavor)| {
                by_flavor
                    .values()
                    .any(|factories| factories.iter().any(|f| f.is_available()))
            })
            .map(|(mime, _)| mime.clone())
            .collect()
    }

    /// Converters in registration order
    #[inline]
    #[must_use]
    pub fn converters(&self) -> &[Arc<dyn Converter>] {
        &self.converters
    }

    /// Preloaders in priority order, ties broken by registration order
    ///
    /// Sorted on first use and cached for the lifetime of this snapshot.
    #[must_use]
    pub fn preloaders(&self) -> Arc<[PreloaderEntry]> {
        Arc::clone(self.sorted_preloaders.get_or_init(|| {
            let mut sorted = self.preloaders.clone();
            sorted.sort_by_key(|e| (e.priority(), e.registration_id));
            sorted.into()
        }))
    }

    /// Additional penalty configured for an implementation (zero if none)
    #[inline]
    #[must_use]
    pub fn additional_penalty(&self, implementation_id: &str) -> Penalty {
        self.overrides
            .get(implementation_id)
            .copied()
            .unwrap_or(Penalty::ZERO)
    }

    /// `base` plus the implementation's additional penalty
    #[inline]
    #[must_use]
    pub fn effective_penalty(&self, implementation_id: &str, base: Penalty) -> Penalty {
        base + self.additional_penalty(implementation_id)
    }

    /// Incremented once per converter registration
    #[inline]
    #[must_use]
    pub fn converter_generation(&self) -> u64 {
        self.converter_generation
    }

    /// Incremented on every penalty override change
    #[inline]
    #[must_use]
    pub fn override_revision(&self) -> u64 {
        self.override_revision
    }
}

impl Debug for RegistryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryState")
            .field("preloaders", &self.preloaders.len())
            .field("mime_types", &self.loader_factories.len())
            .field("converters", &self.converters.len())
            .field("overrides", &self.overrides.len())
            .field("converter_generation", &self.converter_generation)
            .finish()
    }
}

pub(crate) fn normalize_mime(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}
