//! # Configuration
//!
//! `SlicesConfig` is read from an optional TOML file, then overridden field by
//! field from the environment. Every field has a default, so an empty file and
//! no file at all are both valid.
//!
//! ```toml
//! database = "slices.db"
//!
//! [search]
//! base_url = "http://localhost:9200"
//! path = "/slices/slices/_search"
//! timeout_ms = 10000
//!
//! [resolver]
//! timeout_ms = 5000
//! max_slices = 10000
//! max_rounds = 1000
//! ```
//!
//! ## Environment Overrides
//!
//! - `SLICES_DATABASE`
//! - `SLICES_SEARCH_URL`, `SLICES_SEARCH_PATH`, `SLICES_SEARCH_TIMEOUT_MS`
//! - `SLICES_RESOLVE_TIMEOUT_MS`, `SLICES_MAX_CLOSURE`
//!
//! Unparseable numeric overrides are logged and ignored.

use serde::{Deserialize, Serialize};
use slices_core::SliceError;
use slices_core::primitives::{MAX_CLOSURE_ROUNDS, MAX_CLOSURE_SLICES};
use slices_core::{CancelFlag, ClosureLimits};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "slices.db";
pub const DEFAULT_SEARCH_URL: &str = "http://localhost:9200";
pub const DEFAULT_SEARCH_PATH: &str = "/slices/slices/_search";
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlicesConfig {
    /// Path of the redb database file.
    pub database: PathBuf,
    pub search: SearchConfig,
    pub resolver: ResolverConfig,
}

impl Default for SlicesConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            search: SearchConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Where the external search service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub base_url: String,
    pub path: String,
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
            path: DEFAULT_SEARCH_PATH.to_string(),
            timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Bounds for closure resolution requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Wall-clock budget for one request.
    pub timeout_ms: u64,
    pub max_slices: usize,
    pub max_rounds: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_RESOLVE_TIMEOUT_MS,
            max_slices: MAX_CLOSURE_SLICES,
            max_rounds: MAX_CLOSURE_ROUNDS,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Closure limits for one request starting now.
    #[must_use]
    pub fn limits(&self, cancel: CancelFlag) -> ClosureLimits {
        ClosureLimits::new()
            .with_max_slices(self.max_slices)
            .with_max_rounds(self.max_rounds)
            .with_timeout(self.timeout())
            .with_cancel(cancel)
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl SlicesConfig {
    /// Load from `path` (if given) and apply environment overrides.
    ///
    /// A path that was named explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SliceError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    SliceError::IoError(format!("failed to read {}: {e}", path.display()))
                })?;
                let config = Self::from_toml_str(&contents)?;
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, SliceError> {
        toml::from_str(contents)
            .map_err(|e| SliceError::SerializationError(format!("invalid config: {e}")))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut text = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(database) = text("SLICES_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(url) = text("SLICES_SEARCH_URL") {
            self.search.base_url = url;
        }
        if let Some(path) = text("SLICES_SEARCH_PATH") {
            self.search.path = path;
        }
        if let Some(ms) = parsed(text("SLICES_SEARCH_TIMEOUT_MS"), "SLICES_SEARCH_TIMEOUT_MS") {
            self.search.timeout_ms = ms;
        }
        if let Some(ms) = parsed(text("SLICES_RESOLVE_TIMEOUT_MS"), "SLICES_RESOLVE_TIMEOUT_MS") {
            self.resolver.timeout_ms = ms;
        }
        if let Some(max) = parsed(text("SLICES_MAX_CLOSURE"), "SLICES_MAX_CLOSURE") {
            self.resolver.max_slices = max;
        }
    }
}

fn parsed<T>(raw: Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("invalid {key}, ignoring: {err}");
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
