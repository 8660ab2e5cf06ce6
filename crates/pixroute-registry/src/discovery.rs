//! Provider discovery
//!
//! Codec crates announce themselves with [`inventory::submit!`]:
//!
//! ```rust,ignore
//! fn register(registry: &CapabilityRegistry) {
//!     registry.register_converter(Arc::new(RgbaToGray));
//! }
//!
//! inventory::submit! {
//!     pixroute_registry::ProviderRegistration::new("gray", register)
//! }
//! ```
//!
//! Hosts that prefer explicit wiring pass [`CapabilityProvider`] lists to
//! [`CapabilityRegistry::register_providers`] instead.

use crate::registry::CapabilityRegistry;
use std::sync::atomic::Ordering;

/// Link-time registration of a capability provider
pub struct ProviderRegistration {
    /// Provider name, used for ordering and diagnostics
    pub name: &'static str,
    /// Registers the provider's capabilities
    pub register: fn(&CapabilityRegistry),
}

impl ProviderRegistration {
    #[must_use]
    pub const fn new(name: &'static str, register: fn(&CapabilityRegistry)) -> Self {
        Self { name, register }
    }
}

inventory::collect!(ProviderRegistration);

/// Host-supplied bundle of capabilities
pub trait CapabilityProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &str;

    /// Register this provider's loaders, converters and preloaders
    fn register(&self, registry: &CapabilityRegistry);
}

impl CapabilityRegistry {
    /// Run every provider submitted through `inventory`
    ///
    /// Providers run in name order. Only the first call on a registry does
    /// anything; returns the number of providers run.
    pub fn discover(&self) -> usize {
        if self.discovered.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let mut providers: Vec<&ProviderRegistration> =
            inventory::iter::<ProviderRegistration>.into_iter().collect();
        providers.sort_by_key(|p| p.name);

        for provider in &providers {
            tracing::debug!(provider = provider.name, "discovered provider");
            (provider.register)(self);
        }

        tracing::info!(count = providers.len(), "provider discovery complete");
        providers.len()
    }

    /// Whether [`CapabilityRegistry::discover`] already ran
    #[must_use]
    pub fn is_discovered(&self) -> bool {
        self.discovered.load(Ordering::Acquire)
    }

    /// Register an explicit list of providers, in order
    pub fn register_providers(&self, providers: &[&dyn CapabilityProvider]) {
        for provider in providers {
            tracing::debug!(provider = provider.name(), "registering provider");
            provider.register(self);
        }
    }
}
