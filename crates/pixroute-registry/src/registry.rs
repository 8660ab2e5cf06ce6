//! Capability registry
//!
//! Provides [`CapabilityRegistry`], the runtime catalog of loader factories,
//! converters and preloaders.
//!
//! # Concurrency
//!
//! * Writers serialize on one mutex, copy the current [`RegistryState`],
//!   apply their change and publish the copy with a single atomic store.
//! * Readers load the published `Arc<RegistryState>` without locking and
//!   always see either the state before or after a registration.

use crate::state::{normalize_mime, PreloaderEntry, RegistryState};
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pixroute_flavor::{
    Converter, Flavor, ImageDescriptor, LoadError, LoaderFactory, Penalty, Preloader,
    SessionContext,
};
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

static SHARED: Lazy<Arc<CapabilityRegistry>> = Lazy::new(|| Arc::new(CapabilityRegistry::new()));

/// Runtime catalog of codec capabilities
///
/// Construct one per host and pass it to the resolver and cache;
/// [`CapabilityRegistry::shared`] offers a process-wide instance for
/// convenience only.
pub struct CapabilityRegistry {
    state: ArcSwap<RegistryState>,
    write_lock: Mutex<()>,
    pub(crate) discovered: AtomicBool,
}

impl CapabilityRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::empty()),
            write_lock: Mutex::new(()),
            discovered: AtomicBool::new(false),
        }
    }

    /// Process-wide default registry
    #[must_use]
    pub fn shared() -> Arc<CapabilityRegistry> {
        Arc::clone(&SHARED)
    }

    /// Current consistent snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistryState> {
        self.state.load_full()
    }

    fn publish<R>(&self, change: impl FnOnce(&mut RegistryState) -> R) -> R {
        let _guard = self.write_lock.lock();
        let mut next = self.state.load().successor();
        let result = change(&mut next);
        self.state.store(Arc::new(next));
        result
    }

    /// Register a loader factory under every MIME type and flavor it declares
    ///
    /// Unavailable factories are stored but never returned by accessors.
    /// Registering the same factory twice appends it twice.
    pub fn register_loader_factory(&self, factory: Arc<dyn LoaderFactory>) {
        let available = factory.is_available();
        let mut pairs = Vec::new();
        for mime in factory.supported_mime_types() {
            let mime = normalize_mime(&mime);
            for flavor in factory.supported_flavors(&mime) {
                pairs.push((mime.clone(), flavor));
            }
        }

        tracing::debug!(
            implementation = factory.implementation_id(),
            available,
            entries = pairs.len(),
            "registering loader factory"
        );

        self.publish(|state| {
            for (mime, flavor) in pairs {
                state.push_loader_factory(&mime, flavor, Arc::clone(&factory));
            }
        });
    }

    /// Register a converter; bumps the converter generation by exactly one
    pub fn register_converter(&self, converter: Arc<dyn Converter>) {
        let generation = self.publish(|state| {
            state.push_converter(Arc::clone(&converter));
            state.converter_generation()
        });

        tracing::debug!(
            implementation = converter.implementation_id(),
            target = %converter.target_flavor(),
            penalty = %converter.conversion_penalty(),
            generation,
            "registered converter"
        );
    }

    /// Register a preloader; returns its registration ordinal
    pub fn register_preloader(&self, preloader: Arc<dyn Preloader>) -> u64 {
        let registration_id = self.publish(|state| state.push_preloader(Arc::clone(&preloader)));

        tracing::debug!(
            implementation = preloader.implementation_id(),
            priority = preloader.priority(),
            registration_id,
            "registered preloader"
        );
        registration_id
    }

    /// Set (`Some`) or clear (`None`) the additional penalty for an implementation
    pub fn set_additional_penalty(&self, implementation_id: &str, penalty: Option<Penalty>) {
        tracing::debug!(implementation = implementation_id, ?penalty, "penalty override");
        self.publish(|state| state.set_override(implementation_id, penalty));
    }

    /// Additional penalty for an implementation (zero if none)
    #[must_use]
    pub fn additional_penalty(&self, implementation_id: &str) -> Penalty {
        self.state.load().additional_penalty(implementation_id)
    }

    /// Available factories producing `flavor` from `mime_type`
    #[must_use]
    pub fn loader_factories_for(&self, mime_type: &str, flavor: &Flavor) -> Vec<Arc<dyn LoaderFactory>> {
        self.state.load().loader_factories_for(mime_type, flavor)
    }

    /// Available factories for `mime_type`, paired with the flavor each produces
    #[must_use]
    pub fn loader_factories_for_mime(&self, mime_type: &str) -> Vec<(Flavor, Arc<dyn LoaderFactory>)> {
        self.state.load().loader_factories_for_mime(mime_type)
    }

    /// MIME types with at least one available factory
    #[must_use]
    pub fn loader_mime_types(&self) -> Vec<String> {
        self.state.load().loader_mime_types()
    }

    /// All converters in registration order
    #[must_use]
    pub fn all_converters(&self) -> Vec<Arc<dyn Converter>> {
        self.state.load().converters().to_vec()
    }

    /// Preloaders in priority order
    #[must_use]
    pub fn preloaders(&self) -> Arc<[PreloaderEntry]> {
        self.state.load().preloaders()
    }

    /// Number of converter registrations so far
    #[inline]
    #[must_use]
    pub fn converter_generation(&self) -> u64 {
        self.state.load().converter_generation()
    }

    /// Describe a source using the registered preloaders
    ///
    /// Preloaders are consulted in priority order; the first descriptor wins.
    /// A preloader reporting not-found does not stop the search.
    ///
    /// # Returns
    /// `Ok(None)` when no preloader applies to the source.
    ///
    /// # Errors
    /// - `LoadError::NotFound` if at least one preloader reported the source missing
    ///   and none described it
    /// - Any other preloader error, immediately
    pub fn preload(
        &self,
        source_id: &str,
        session: &SessionContext,
    ) -> Result<Option<ImageDescriptor>, LoadError> {
        let mut not_found = None;
        for entry in self.preloaders().iter() {
            match entry.preloader().preload(source_id, session) {
                Ok(Some(descriptor)) => {
                    tracing::trace!(
                        source_id,
                        preloader = entry.preloader().implementation_id(),
                        mime = descriptor.mime_type(),
                        "source described"
                    );
                    return Ok(Some(descriptor));
                }
                Ok(None) => {}
                Err(err) if err.is_not_found() => not_found = Some(err),
                Err(err) => return Err(err),
            }
        }
        not_found.map_or(Ok(None), Err)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("state", &*self.state.load())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixroute_test_utils::{
        flavor, DecliningPreloader, FakeConverter, FakeLoaderFactory, FakePreloader,
    };
    use pretty_assertions::assert_eq;

    fn ids(entries: &[PreloaderEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.preloader().implementation_id().to_string())
            .collect()
    }

    #[test]
    fn registry_new_empty() {
        let registry = CapabilityRegistry::new();
        assert!(registry.all_converters().is_empty());
        assert!(registry.preloaders().is_empty());
        assert_eq!(registry.converter_generation(), 0);
        assert!(registry
            .loader_factories_for("image/png", &flavor("registry-tests.any"))
            .is_empty());
        assert!(registry.loader_factories_for_mime("image/png").is_empty());
    }

    #[test]
    fn converter_bumps_generation_by_one() {
        let registry = CapabilityRegistry::new();
        let a = flavor("registry-tests.gen-a");
        let b = flavor("registry-tests.gen-b");

        registry.register_converter(FakeConverter::new("c1", &a, &b, 1).into_arc());
        assert_eq!(registry.converter_generation(), 1);
        registry.register_converter(FakeConverter::new("c2", &b, &a, 1).into_arc());
        assert_eq!(registry.converter_generation(), 2);
    }

    #[test]
    fn loaders_and_preloaders_leave_generation_alone() {
        let registry = CapabilityRegistry::new();
        let raster = flavor("registry-tests.gen-raster");

        registry.register_loader_factory(
            FakeLoaderFactory::new("png", "image/png").producing(&raster, 1).into_arc(),
        );
        registry.register_preloader(FakePreloader::new("probe", 0).into_arc());
        registry.set_additional_penalty("png", Some(Penalty::new(3)));

        assert_eq!(registry.converter_generation(), 0);
    }

    #[test]
    fn duplicates_are_appended() {
        let registry = CapabilityRegistry::new();
        let raster = flavor("registry-tests.dup-raster");
        let factory = FakeLoaderFactory::new("png", "image/png")
            .producing(&raster, 1)
            .into_arc();

        registry.register_loader_factory(Arc::clone(&factory));
        registry.register_loader_factory(factory);

        assert_eq!(registry.loader_factories_for("image/png", &raster).len(), 2);
    }

    #[test]
    fn unavailable_factory_is_hidden() {
        let registry = CapabilityRegistry::new();
        let raster = flavor("registry-tests.hidden-raster");

        registry.register_loader_factory(
            FakeLoaderFactory::new("jp2", "image/jp2")
                .producing(&raster, 1)
                .unavailable()
                .into_arc(),
        );

        assert!(registry.loader_factories_for("image/jp2", &raster).is_empty());
        assert!(registry.loader_factories_for_mime("image/jp2").is_empty());
        assert!(registry.loader_mime_types().is_empty());
    }

    #[test]
    fn mime_lookup_is_case_insensitive() {
        let registry = CapabilityRegistry::new();
        let raster = flavor("registry-tests.case-raster");
        registry.register_loader_factory(
            FakeLoaderFactory::new("png", "Image/PNG").producing(&raster, 1).into_arc(),
        );

        assert_eq!(registry.loader_factories_for("image/png", &raster).len(), 1);
        assert_eq!(registry.loader_mime_types(), vec!["image/png".to_string()]);
    }

    #[test]
    fn factories_for_mime_pairs_flavors() {
        let registry = CapabilityRegistry::new();
        let raster = flavor("registry-tests.pairs-raster");
        let bytes = flavor("registry-tests.pairs-bytes");
        registry.register_loader_factory(
            FakeLoaderFactory::new("tiff", "image/tiff")
                .producing(&raster, 4)
                .producing(&bytes, 1)
                .into_arc(),
        );

        let flavors: Vec<Flavor> = registry
            .loader_factories_for_mime("image/tiff")
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(flavors, vec![raster, bytes]);
    }

    #[test]
    fn preloaders_sorted_by_priority_then_registration() {
        let registry = CapabilityRegistry::new();
        registry.register_preloader(FakePreloader::new("late", 10).into_arc());
        registry.register_preloader(FakePreloader::new("first-zero", 0).into_arc());
        registry.register_preloader(FakePreloader::new("negative", -5).into_arc());
        registry.register_preloader(FakePreloader::new("second-zero", 0).into_arc());

        assert_eq!(
            ids(&registry.preloaders()),
            vec!["negative", "first-zero", "second-zero", "late"]
        );
    }

    #[test]
    fn preloader_order_cached_until_next_registration() {
        let registry = CapabilityRegistry::new();
        registry.register_preloader(FakePreloader::new("a", 1).into_arc());

        let first = registry.preloaders();
        let again = registry.preloaders();
        assert!(Arc::ptr_eq(&first, &again));

        registry.register_preloader(FakePreloader::new("b", 0).into_arc());
        let after = registry.preloaders();
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(ids(&after), vec!["b", "a"]);
        assert_eq!(ids(&first), vec!["a"]);
    }

    #[test]
    fn overrides_set_and_clear() {
        let registry = CapabilityRegistry::new();
        assert_eq!(registry.additional_penalty("png"), Penalty::ZERO);

        registry.set_additional_penalty("png", Some(Penalty::new(7)));
        assert_eq!(registry.additional_penalty("png"), Penalty::new(7));
        assert_eq!(
            registry.snapshot().effective_penalty("png", Penalty::new(3)),
            Penalty::new(10)
        );

        registry.set_additional_penalty("png", None);
        assert_eq!(registry.additional_penalty("png"), Penalty::ZERO);
    }

    #[test]
    fn snapshot_is_stable_across_registration() {
        let registry = CapabilityRegistry::new();
        let a = flavor("registry-tests.snap-a");
        let b = flavor("registry-tests.snap-b");

        let before = registry.snapshot();
        registry.register_converter(FakeConverter::new("c", &a, &b, 1).into_arc());

        assert!(before.converters().is_empty());
        assert_eq!(before.converter_generation(), 0);
        assert_eq!(registry.snapshot().converters().len(), 1);
    }

    #[test]
    fn preload_uses_first_applicable() {
        let registry = CapabilityRegistry::new();
        registry.register_preloader(Arc::new(DecliningPreloader {
            id: "decline".to_string(),
            priority: -1,
        }));
        registry.register_preloader(
            FakePreloader::new("probe", 0)
                .knowing("a.png", "image/png")
                .into_arc(),
        );

        let descriptor = registry
            .preload("a.png", &SessionContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.mime_type(), "image/png");
    }

    #[test]
    fn preload_reports_not_found() {
        let registry = CapabilityRegistry::new();
        registry.register_preloader(FakePreloader::new("probe", 0).into_arc());

        let err = registry.preload("missing.png", &SessionContext::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn preload_without_preloaders_is_not_applicable() {
        let registry = CapabilityRegistry::new();
        assert!(registry.preload("a.png", &SessionContext::new()).unwrap().is_none());
    }

    #[test]
    fn shared_is_a_single_instance() {
        assert!(Arc::ptr_eq(
            &CapabilityRegistry::shared(),
            &CapabilityRegistry::shared()
        ));
    }
}
