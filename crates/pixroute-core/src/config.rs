//! Configuration for [`ImageManager`](crate::ImageManager)
//!
//! Loaded from TOML:
//!
//! ```toml
//! disable_plugin_discovery = true
//! invalid_source_expiration_ms = 30000
//! max_descriptors = 1000
//! max_artifacts = 256
//! housekeeping_interval_ms = 60000
//!
//! [penalty_overrides]
//! "png-decoder" = 5
//! "legacy-jp2" = "infinite"
//! ```

use crate::error::ConfigError;
use pixroute_cache::{
    ExpirationPolicy, ExpireAfter, NeverExpire, DEFAULT_MAX_ARTIFACTS, DEFAULT_MAX_DESCRIPTORS,
};
use pixroute_flavor::Penalty;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const INFINITE_KEYWORD: &str = "infinite";

/// Additional penalty for one implementation, as written in config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PenaltySetting {
    /// Finite additional penalty
    Points(i32),
    /// Keyword form; only `"infinite"` is accepted
    Keyword(String),
}

impl PenaltySetting {
    /// Convert to a [`Penalty`]
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for negative values or unknown keywords
    pub fn to_penalty(&self) -> Result<Penalty, ConfigError> {
        match self {
            Self::Points(value) if *value >= 0 => Ok(Penalty::new(*value)),
            Self::Points(value) => Err(ConfigError::invalid(format!(
                "penalty must not be negative, got {value}"
            ))),
            Self::Keyword(word) if word.eq_ignore_ascii_case(INFINITE_KEYWORD) => {
                Ok(Penalty::INFINITE)
            }
            Self::Keyword(word) => Err(ConfigError::invalid(format!(
                "unknown penalty keyword {word:?}, expected \"{INFINITE_KEYWORD}\""
            ))),
        }
    }
}

impl From<Penalty> for PenaltySetting {
    fn from(penalty: Penalty) -> Self {
        if penalty.is_infinite() {
            Self::Keyword(INFINITE_KEYWORD.to_string())
        } else {
            Self::Points(penalty.value())
        }
    }
}

/// pixroute configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PixrouteConfig {
    /// Skip `inventory` provider discovery
    pub disable_plugin_discovery: bool,
    /// Negative cache window; `None` never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_source_expiration_ms: Option<u64>,
    pub max_descriptors: u64,
    pub max_artifacts: u64,
    /// Background sweep interval; `None` disables the sweeper
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housekeeping_interval_ms: Option<u64>,
    /// Additional penalty per implementation id
    pub penalty_overrides: BTreeMap<String, PenaltySetting>,
}

impl PixrouteConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`PixrouteConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serialize to TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Serialize` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for zero capacities, a zero sweep
    /// interval, or a malformed penalty override
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_descriptors == 0 {
            return Err(ConfigError::invalid("max_descriptors must be positive"));
        }
        if self.max_artifacts == 0 {
            return Err(ConfigError::invalid("max_artifacts must be positive"));
        }
        if self.housekeeping_interval_ms == Some(0) {
            return Err(ConfigError::invalid("housekeeping_interval_ms must be positive"));
        }
        for (id, setting) in &self.penalty_overrides {
            setting
                .to_penalty()
                .map_err(|err| ConfigError::invalid(format!("penalty_overrides.{id}: {err}")))?;
        }
        Ok(())
    }

    /// Penalty overrides as typed values
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a malformed entry
    pub fn penalty_overrides(&self) -> Result<Vec<(String, Penalty)>, ConfigError> {
        self.penalty_overrides
            .iter()
            .map(|(id, setting)| Ok((id.clone(), setting.to_penalty()?)))
            .collect()
    }

    /// Expiration policy for the negative cache
    #[must_use]
    pub fn expiration_policy(&self) -> Arc<dyn ExpirationPolicy> {
        match self.invalid_source_expiration_ms {
            Some(ms) => Arc::new(ExpireAfter(Duration::from_millis(ms))),
            None => Arc::new(NeverExpire),
        }
    }

    #[must_use]
    pub fn housekeeping_interval(&self) -> Option<Duration> {
        self.housekeeping_interval_ms.map(Duration::from_millis)
    }

    #[inline]
    #[must_use]
    pub fn with_penalty_override(mut self, implementation_id: impl Into<String>, penalty: Penalty) -> Self {
        self.penalty_overrides
            .insert(implementation_id.into(), penalty.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_invalid_source_expiration(mut self, window: Duration) -> Self {
        self.invalid_source_expiration_ms = Some(u64::try_from(window.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_plugin_discovery(mut self, enabled: bool) -> Self {
        self.disable_plugin_discovery = !enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_descriptors(mut self, max: u64) -> Self {
        self.max_descriptors = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_artifacts(mut self, max: u64) -> Self {
        self.max_artifacts = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

impl Default for PixrouteConfig {
    fn default() -> Self {
        Self {
            disable_plugin_discovery: false,
            invalid_source_expiration_ms: None,
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            housekeeping_interval_ms: None,
            penalty_overrides: BTreeMap::new(),
        }
    }
}
