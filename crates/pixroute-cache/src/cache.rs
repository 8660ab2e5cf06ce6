//! Descriptor and artifact cache using moka
//!
//! Descriptors are cached by source id, artifacts by (descriptor id, flavor).
//! Sources whose resolution reports not-found go to the negative cache
//! instead, so they are not re-attempted until their record expires.

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::expiration::{ExpirationPolicy, NeverExpire};
use crate::invalid::InvalidSources;
use crate::stats::{CacheStats, StatsRecorder};
use moka::notification::RemovalCause;
use moka::sync::Cache;
use pixroute_flavor::{Artifact, DescriptorId, Flavor, ImageDescriptor, LoadError};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Default descriptor capacity
pub const DEFAULT_MAX_DESCRIPTORS: u64 = 1_000;

/// Default artifact capacity
pub const DEFAULT_MAX_ARTIFACTS: u64 = 256;

/// Artifact cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    descriptor: DescriptorId,
    flavor: Flavor,
}

impl ArtifactKey {
    #[inline]
    #[must_use]
    pub fn new(descriptor: DescriptorId, flavor: Flavor) -> Self {
        Self { descriptor, flavor }
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &DescriptorId {
        &self.descriptor
    }

    #[inline]
    #[must_use]
    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }
}

/// Descriptor, artifact and negative cache
///
/// # State transitions
/// - Descriptors: `absent -> cached` on successful resolution,
///   `cached -> absent` on clear, invalidation or eviction
/// - Invalid sources: `absent -> invalid(t) -> absent` once expired
pub struct ImageCache {
    descriptors: Cache<String, Arc<ImageDescriptor>>,
    artifacts: Cache<ArtifactKey, Artifact>,
    invalid: InvalidSources,
    stats: Arc<StatsRecorder>,
}

impl ImageCache {
    /// Cache with default capacities, system clock and no expiration
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> ImageCacheBuilder {
        ImageCacheBuilder::default()
    }

    /// Cached descriptor for `source_id`, resolving and storing it on a miss
    ///
    /// `resolve` returns `Ok(None)` when nothing can describe the source.
    /// Both that and a not-found error record the source as invalid. A
    /// resolved descriptor is rekeyed with `source_id`, so its artifacts are
    /// cached per resolved source.
    ///
    /// # Errors
    /// - `CacheError::KnownInvalid` if the source is in the negative cache
    /// - `CacheError::Undescribed` if `resolve` returned `Ok(None)`
    /// - `CacheError::Load` if `resolve` failed
    pub fn get_descriptor<F>(&self, source_id: &str, resolve: F) -> Result<Arc<ImageDescriptor>, CacheError>
    where
        F: FnOnce(&str) -> Result<Option<ImageDescriptor>, LoadError>,
    {
        if let Some(descriptor) = self.descriptors.get(source_id) {
            self.stats.descriptor(true);
            return Ok(descriptor);
        }
        self.stats.descriptor(false);

        if self.invalid.is_invalid(source_id) {
            return Err(CacheError::KnownInvalid {
                source_id: source_id.to_string(),
            });
        }

        match resolve(source_id) {
            Ok(Some(descriptor)) => {
                let descriptor = Arc::new(descriptor.rekeyed(source_id));
                self.descriptors
                    .insert(source_id.to_string(), Arc::clone(&descriptor));
                Ok(descriptor)
            }
            Ok(None) => {
                self.mark_invalid(source_id);
                Err(CacheError::Undescribed {
                    source_id: source_id.to_string(),
                })
            }
            Err(err) => {
                if err.is_not_found() {
                    self.mark_invalid(source_id);
                }
                Err(err.into())
            }
        }
    }

    /// Cached descriptor without resolving
    #[must_use]
    pub fn peek_descriptor(&self, source_id: &str) -> Option<Arc<ImageDescriptor>> {
        self.descriptors.get(source_id)
    }

    /// Whether `source_id` is recorded as not found and not yet expired
    pub fn is_invalid(&self, source_id: &str) -> bool {
        self.invalid.is_invalid(source_id)
    }

    /// Record `source_id` as not found now
    pub fn mark_invalid(&self, source_id: &str) {
        self.stats.invalid_mark();
        self.invalid.mark(source_id);
    }

    /// Cached artifact for a descriptor in one flavor
    ///
    /// Repeated lookups return the same artifact instance.
    #[must_use]
    pub fn get_artifact(&self, descriptor: &DescriptorId, flavor: &Flavor) -> Option<Artifact> {
        let found = self
            .artifacts
            .get(&ArtifactKey::new(*descriptor, flavor.clone()));
        self.stats.artifact(found.is_some());
        found
    }

    /// Store an artifact under a descriptor and flavor
    pub fn put_artifact(&self, descriptor: DescriptorId, flavor: Flavor, artifact: Artifact) {
        self.artifacts.insert(ArtifactKey::new(descriptor, flavor), artifact);
    }

    /// Drop one source's descriptor and negative record
    pub fn invalidate_descriptor(&self, source_id: &str) {
        self.descriptors.invalidate(source_id);
        self.invalid.remove(source_id);
    }

    /// Drop every cached artifact for one descriptor
    pub fn invalidate_artifacts(&self, descriptor: &DescriptorId) {
        for (key, _) in &self.artifacts {
            if key.descriptor == *descriptor {
                self.artifacts.invalidate(&*key);
            }
        }
    }

    /// Drop everything, including negative records
    pub fn clear(&self) {
        self.descriptors.invalidate_all();
        self.artifacts.invalidate_all();
        self.invalid.clear();
        tracing::debug!("cache cleared");
    }

    /// Purge expired negative records and flush pending cache maintenance
    ///
    /// Returns the number of negative records removed.
    pub fn housekeeping(&self) -> usize {
        self.descriptors.run_pending_tasks();
        self.artifacts.run_pending_tasks();
        self.invalid.sweep_expired()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Approximate number of cached descriptors
    #[inline]
    #[must_use]
    pub fn descriptor_count(&self) -> u64 {
        self.descriptors.entry_count()
    }

    /// Approximate number of cached artifacts
    #[inline]
    #[must_use]
    pub fn artifact_count(&self) -> u64 {
        self.artifacts.entry_count()
    }

    /// Negative records currently held, expired or not
    #[inline]
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ImageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("descriptors", &self.descriptors.entry_count())
            .field("artifacts", &self.artifacts.entry_count())
            .field("invalid", &self.invalid.len())
            .finish()
    }
}

/// Builder for [`ImageCache`]
#[derive(Debug)]
pub struct ImageCacheBuilder {
    max_descriptors: u64,
    max_artifacts: u64,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn ExpirationPolicy>,
}

impl Default for ImageCacheBuilder {
    fn default() -> Self {
        Self {
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            clock: Arc::new(SystemClock),
            policy: Arc::new(NeverExpire),
        }
    }
}

impl ImageCacheBuilder {
    #[must_use]
    pub fn with_max_descriptors(mut self, max: u64) -> Self {
        self.max_descriptors = max;
        self
    }

    #[must_use]
    pub fn with_max_artifacts(mut self, max: u64) -> Self {
        self.max_artifacts = max;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_expiration(mut self, policy: Arc<dyn ExpirationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> ImageCache {
        let stats = Arc::new(StatsRecorder::default());

        let descriptors: Cache<String, Arc<ImageDescriptor>> = Cache::builder()
            .max_capacity(self.max_descriptors)
            .eviction_listener(eviction_counter::<String, Arc<ImageDescriptor>>(&stats))
            .build();
        let artifacts: Cache<ArtifactKey, Artifact> = Cache::builder()
            .max_capacity(self.max_artifacts)
            .eviction_listener(eviction_counter::<ArtifactKey, Artifact>(&stats))
            .build();

        ImageCache {
            descriptors,
            artifacts,
            invalid: InvalidSources::new(self.clock, self.policy),
            stats,
        }
    }
}

fn eviction_counter<K, V>(stats: &Arc<StatsRecorder>) -> impl Fn(Arc<K>, V, RemovalCause) + Send + Sync + 'static
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let stats = Arc::clone(stats);
    move |_key, _value, cause| {
        if cause.was_evicted() {
            stats.eviction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::expiration::ExpireAfter;
    use pixroute_test_utils::flavor;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn describe(source_id: &str) -> Result<Option<ImageDescriptor>, LoadError> {
        Ok(Some(ImageDescriptor::new(source_id, "image/png")))
    }

    fn missing(source_id: &str) -> Result<Option<ImageDescriptor>, LoadError> {
        Err(LoadError::not_found(source_id))
    }

    #[test]
    fn descriptor_resolved_once() {
        let cache = ImageCache::new();
        let mut calls = 0;

        let first = cache
            .get_descriptor("a.png", |id| {
                calls += 1;
                describe(id)
            })
            .unwrap();
        let second = cache
            .get_descriptor("a.png", |_| panic!("should be cached"))
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.descriptor_hits, stats.descriptor_misses), (1, 1));
    }

    #[test]
    fn descriptor_ids_follow_the_cache_key() {
        let cache = ImageCache::new();
        let relative = |_: &str| describe("x.png");

        let a = cache.get_descriptor("/a/x.png", relative).unwrap();
        let b = cache.get_descriptor("/b/x.png", relative).unwrap();

        assert_eq!(a.source_id(), b.source_id());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), DescriptorId::compute("/a/x.png", "image/png"));
    }

    #[test]
    fn not_found_goes_to_negative_cache() {
        let cache = ImageCache::new();

        let err = cache.get_descriptor("gone.png", missing).unwrap_err();
        assert!(matches!(err, CacheError::Load(_)));
        assert!(cache.is_invalid("gone.png"));
        assert!(cache.peek_descriptor("gone.png").is_none());

        let err = cache
            .get_descriptor("gone.png", |_| panic!("known invalid"))
            .unwrap_err();
        assert!(matches!(err, CacheError::KnownInvalid { .. }));
        assert!(err.is_not_found());
        assert_eq!(cache.stats().invalid_marks, 1);
    }

    #[test]
    fn undescribed_source_is_marked_invalid() {
        let cache = ImageCache::new();
        let err = cache.get_descriptor("odd.bin", |_| Ok(None)).unwrap_err();
        assert!(matches!(err, CacheError::Undescribed { .. }));
        assert!(cache.is_invalid("odd.bin"));
    }

    #[test]
    fn decode_failure_is_not_negatively_cached() {
        let cache = ImageCache::new();
        let err = cache
            .get_descriptor("bad.png", |_| Err(LoadError::decode("probe", "bad header")))
            .unwrap_err();

        assert!(!err.is_not_found());
        assert!(!cache.is_invalid("bad.png"));
        assert!(cache.get_descriptor("bad.png", describe).is_ok());
    }

    #[test]
    fn invalid_source_retryable_after_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = ImageCache::builder()
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_expiration(Arc::new(ExpireAfter(Duration::from_secs(2))))
            .build();

        assert!(cache.get_descriptor("late.png", missing).is_err());

        clock.advance(Duration::from_secs(1));
        assert!(cache.is_invalid("late.png"));

        clock.advance(Duration::from_secs(2));
        assert!(!cache.is_invalid("late.png"));
        assert!(cache.get_descriptor("late.png", describe).is_ok());
    }

    #[test]
    fn artifact_lookup_returns_same_instance() {
        let cache = ImageCache::new();
        let raster = flavor("cache-tests.same-raster");
        let id = DescriptorId::compute("a.png", "image/png");
        cache.put_artifact(id, raster.clone(), Artifact::new(raster.clone(), vec![1u8, 2, 3]));

        let first = cache.get_artifact(&id, &raster).unwrap();
        let second = cache.get_artifact(&id, &raster).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn artifact_keyed_by_flavor() {
        let cache = ImageCache::new();
        let raster = flavor("cache-tests.key-raster");
        let gray = flavor("cache-tests.key-gray");
        let id = DescriptorId::compute("a.png", "image/png");
        cache.put_artifact(id, raster.clone(), Artifact::new(raster.clone(), ()));

        assert!(cache.get_artifact(&id, &gray).is_none());
        assert!(cache.get_artifact(&id, &raster).is_some());
        let stats = cache.stats();
        assert_eq!((stats.artifact_hits, stats.artifact_misses), (1, 1));
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ImageCache::new();
        let raster = flavor("cache-tests.clear-raster");
        let id = DescriptorId::compute("a.png", "image/png");
        cache.get_descriptor("a.png", describe).unwrap();
        cache.get_descriptor("gone.png", missing).unwrap_err();
        cache.put_artifact(id, raster.clone(), Artifact::new(raster.clone(), ()));

        cache.clear();

        assert!(cache.peek_descriptor("a.png").is_none());
        assert!(cache.get_artifact(&id, &raster).is_none());
        assert!(!cache.is_invalid("gone.png"));
    }

    #[test]
    fn invalidate_descriptor_forgets_negative_record() {
        let cache = ImageCache::new();
        cache.get_descriptor("gone.png", missing).unwrap_err();
        cache.invalidate_descriptor("gone.png");
        assert!(!cache.is_invalid("gone.png"));
    }

    #[test]
    fn invalidate_artifacts_for_one_descriptor() {
        let cache = ImageCache::new();
        let raster = flavor("cache-tests.inv-raster");
        let a = DescriptorId::compute("a.png", "image/png");
        let b = DescriptorId::compute("b.png", "image/png");
        cache.put_artifact(a, raster.clone(), Artifact::new(raster.clone(), ()));
        cache.put_artifact(b, raster.clone(), Artifact::new(raster.clone(), ()));

        cache.invalidate_artifacts(&a);

        assert!(cache.get_artifact(&a, &raster).is_none());
        assert!(cache.get_artifact(&b, &raster).is_some());
    }

    #[test]
    fn capacity_evictions_are_counted() {
        let cache = ImageCache::builder().with_max_artifacts(4).build();
        let raster = flavor("cache-tests.evict-raster");
        for i in 0..64 {
            let id = DescriptorId::compute(&format!("{i}.png"), "image/png");
            cache.put_artifact(id, raster.clone(), Artifact::new(raster.clone(), i));
        }
        cache.housekeeping();

        assert!(cache.artifact_count() <= 4);
        assert!(cache.stats().evictions > 0);
    }
}
