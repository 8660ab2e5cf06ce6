//! pixroute Cache
//!
//! Remembers what has already been described, loaded or found missing.
//!
//! # Core Concepts
//!
//! - [`ImageCache`]: Descriptors by source id, artifacts by (descriptor, flavor)
//! - [`InvalidSources`]: Negative cache of not-found sources
//! - [`ExpirationPolicy`]: When a not-found record may be retried
//! - [`Clock`]: Injectable time source ([`ManualClock`] for tests)
//! - [`Housekeeper`]: Background sweep of expired records
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pixroute_cache::{Clock, ExpireAfter, ImageCache, ManualClock};
//! use pixroute_flavor::LoadError;
//!
//! let clock = Arc::new(ManualClock::new());
//! let cache = ImageCache::builder()
//!     .with_clock(clock.clone() as Arc<dyn Clock>)
//!     .with_expiration(Arc::new(ExpireAfter(Duration::from_secs(60))))
//!     .build();
//!
//! let missing = cache.get_descriptor("nowhere.png", |id| Err(LoadError::not_found(id)));
//! assert!(missing.is_err());
//! assert!(cache.is_invalid("nowhere.png"));
//!
//! clock.advance(Duration::from_secs(61));
//! assert!(!cache.is_invalid("nowhere.png"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod clock;
mod error;
mod expiration;
mod housekeeping;
mod invalid;
mod stats;

pub use cache::{ArtifactKey, ImageCache, ImageCacheBuilder, DEFAULT_MAX_ARTIFACTS, DEFAULT_MAX_DESCRIPTORS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use expiration::{ExpirationPolicy, ExpireAfter, NeverExpire};
pub use housekeeping::Housekeeper;
pub use invalid::InvalidSources;
pub use stats::CacheStats;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
