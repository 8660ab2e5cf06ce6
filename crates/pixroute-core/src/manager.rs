//! Image manager facade
//!
//! [`ImageManager`] owns a registry, a resolver and a cache and answers
//! "give me this source as one of these flavors".
//!
//! # Load path
//!
//! 1. Negative cache: a source recently found missing fails fast
//! 2. Descriptor: cached, or described by the registry's preloaders
//! 3. Artifact cache: any requested flavor already produced for the descriptor
//! 4. Resolve the cheapest pipeline, execute it, cache the result

use crate::config::PixrouteConfig;
use crate::error::ImageError;
use pixroute_cache::{CacheStats, Clock, Housekeeper, ImageCache, SystemClock};
use pixroute_flavor::{Artifact, Flavor, ImageDescriptor, LoadHints, SessionContext};
use pixroute_pipeline::{Pipeline, PipelineResolver, PipelineSource};
use pixroute_registry::{CapabilityProvider, CapabilityRegistry};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Entry point for loading and converting images
pub struct ImageManager {
    registry: Arc<CapabilityRegistry>,
    resolver: PipelineResolver,
    cache: Arc<ImageCache>,
    housekeeper: Option<Housekeeper>,
}

impl ImageManager {
    #[must_use]
    pub fn builder() -> ImageManagerBuilder {
        ImageManagerBuilder::default()
    }

    /// Manager over an existing registry with default cache settings
    ///
    /// Does not run plugin discovery.
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            resolver: PipelineResolver::new(Arc::clone(&registry)),
            registry,
            cache: Arc::new(ImageCache::new()),
            housekeeper: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &PipelineResolver {
        &self.resolver
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Describe a source, using the cache
    ///
    /// # Errors
    /// - `ImageError::NotFound` if the source is missing or recently found missing
    /// - `ImageError::Describe` if a preloader failed otherwise
    pub fn descriptor(&self, source_id: &str, session: &SessionContext) -> Result<Arc<ImageDescriptor>, ImageError> {
        let key = session.resolve(source_id);
        let descriptor = self
            .cache
            .get_descriptor(&key, |_| self.registry.preload(source_id, session))?;
        Ok(descriptor)
    }

    /// Cheapest pipeline for a source without executing it
    ///
    /// # Errors
    /// - As [`ImageManager::descriptor`]
    /// - `ImageError::UnsupportedConversion` if no route exists
    pub fn pipeline_for(
        &self,
        source_id: &str,
        targets: &[Flavor],
        session: &SessionContext,
    ) -> Result<Pipeline, ImageError> {
        let descriptor = self.descriptor(source_id, session)?;
        self.resolver
            .resolve(PipelineSource::Descriptor(&descriptor), targets)
            .ok_or_else(|| ImageError::unsupported(descriptor.mime_type(), targets))
    }

    /// Load a source as one of `targets`
    ///
    /// # Errors
    /// - `ImageError::NotFound` if the source is missing; the source is then
    ///   negatively cached
    /// - `ImageError::UnsupportedConversion` if no route exists
    /// - `ImageError::Pipeline` if a loader or converter fails
    pub fn load(
        &self,
        source_id: &str,
        targets: &[Flavor],
        hints: &LoadHints,
        session: &SessionContext,
    ) -> Result<Artifact, ImageError> {
        let descriptor = self.descriptor(source_id, session)?;
        let id = descriptor.id();

        if let Some(cached) = targets.iter().find_map(|t| self.cache.get_artifact(&id, t)) {
            tracing::trace!(source_id, flavor = %cached.flavor(), "artifact cache hit");
            return Ok(cached);
        }

        let pipeline = self
            .resolver
            .resolve(PipelineSource::Descriptor(&descriptor), targets)
            .ok_or_else(|| ImageError::unsupported(descriptor.mime_type(), targets))?;

        let artifact = match pipeline.execute(PipelineSource::Descriptor(&descriptor), hints, session) {
            Ok(artifact) => artifact,
            Err(err) if err.is_not_found() => {
                let key = session.resolve(source_id);
                self.cache.invalidate_descriptor(&key);
                self.cache.invalidate_artifacts(&id);
                self.cache.mark_invalid(&key);
                return Err(ImageError::not_found(key));
            }
            Err(err) => return Err(err.into()),
        };

        self.cache
            .put_artifact(id, artifact.flavor().clone(), artifact.clone());
        for target in targets.iter().filter(|t| artifact.flavor().is_compatible(t)) {
            self.cache.put_artifact(id, target.clone(), artifact.clone());
        }

        tracing::debug!(
            source_id,
            route = %pipeline.describe(),
            penalty = %pipeline.penalty(),
            "loaded"
        );
        Ok(artifact)
    }

    /// Convert an in-memory artifact to one of `targets`
    ///
    /// # Errors
    /// - `ImageError::UnsupportedConversion` if no route exists
    /// - `ImageError::Pipeline` if a converter fails
    pub fn convert(
        &self,
        artifact: &Artifact,
        targets: &[Flavor],
        hints: &LoadHints,
        session: &SessionContext,
    ) -> Result<Artifact, ImageError> {
        let pipeline = self
            .resolver
            .resolve(PipelineSource::Artifact(artifact), targets)
            .ok_or_else(|| ImageError::unsupported(artifact.flavor().name(), targets))?;
        Ok(pipeline.execute(PipelineSource::Artifact(artifact), hints, session)?)
    }

    /// Sweep expired negative records; returns how many were removed
    pub fn housekeeping(&self) -> usize {
        self.cache.housekeeping()
    }

    pub fn clear_caches(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether a background sweeper is running
    #[inline]
    #[must_use]
    pub fn has_housekeeper(&self) -> bool {
        self.housekeeper.is_some()
    }
}

impl Debug for ImageManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageManager")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("housekeeper", &self.housekeeper.is_some())
            .finish()
    }
}

/// Builder for [`ImageManager`]
#[derive(Default)]
pub struct ImageManagerBuilder {
    registry: Option<Arc<CapabilityRegistry>>,
    config: PixrouteConfig,
    providers: Vec<Arc<dyn CapabilityProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ImageManagerBuilder {
    /// Use an existing registry instead of a fresh one
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PixrouteConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a provider explicitly at build time
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Time source for the negative cache
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and wire everything together
    ///
    /// # Errors
    /// - `ImageError::Config` if the configuration is invalid
    /// - `ImageError::Housekeeping` if the sweeper thread cannot start
    pub fn build(self) -> Result<ImageManager, ImageError> {
        let config = self.config;
        config.validate()?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(CapabilityRegistry::new()));

        for (implementation_id, penalty) in config.penalty_overrides()? {
            registry.set_additional_penalty(&implementation_id, Some(penalty));
        }

        let providers: Vec<&dyn CapabilityProvider> = self.providers.iter().map(|p| &**p).collect();
        registry.register_providers(&providers);

        if !config.disable_plugin_discovery {
            registry.discover();
        }

        let cache = Arc::new(
            ImageCache::builder()
                .with_max_descriptors(config.max_descriptors)
                .with_max_artifacts(config.max_artifacts)
                .with_expiration(config.expiration_policy())
                .with_clock(self.clock.unwrap_or_else(|| Arc::new(SystemClock)))
                .build(),
        );

        let housekeeper = config
            .housekeeping_interval()
            .map(|interval| Housekeeper::spawn(&cache, interval))
            .transpose()
            .map_err(ImageError::Housekeeping)?;

        tracing::info!(
            converters = registry.all_converters().len(),
            mime_types = registry.loader_mime_types().len(),
            discovery = !config.disable_plugin_discovery,
            housekeeping = housekeeper.is_some(),
            "image manager ready"
        );

        Ok(ImageManager {
            resolver: PipelineResolver::new(Arc::clone(&registry)),
            registry,
            cache,
            housekeeper,
        })
    }
}
