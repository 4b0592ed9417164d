//! Configuration
//!
//! Two knobs drive the engine:
//! - `use_shared_cache`: track suspension scopes in a shared cache instead of
//!   process memory
//! - `suspension_buffer_secs`: grace period subtracted from a scope's start
//!   (default 10s)
//!
//! Sources, lowest to highest priority: defaults, YAML file, environment.
//!
//! ```yaml
//! version: 1
//! suspension:
//!   use_shared_cache: true
//!   suspension_buffer_secs: 10
//!   cache_key: suspended_models
//! ```

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported YAML schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Default grace period subtracted from a suspension's start
pub const DEFAULT_SUSPENSION_BUFFER_SECS: u64 = 10;

/// Upper bound on the grace period
pub const MAX_SUSPENSION_BUFFER_SECS: u64 = 3600;

/// Default shared-cache key holding the scope list
pub const DEFAULT_CACHE_KEY: &str = "suspended_models";

pub const ENV_USE_CACHE: &str = "INDEXSYNC_USE_CACHE";
pub const ENV_SUSPENSION_BUFFER_SECS: &str = "INDEXSYNC_SUSPENSION_BUFFER_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Track suspension scopes in a shared cache (cross-process)
    pub use_shared_cache: bool,

    /// Seconds subtracted from a scope's start time
    pub suspension_buffer_secs: u64,

    /// Shared-cache key of the scope list
    pub cache_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            use_shared_cache: false,
            suspension_buffer_secs: DEFAULT_SUSPENSION_BUFFER_SECS,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: Option<u32>,

    #[serde(default)]
    suspension: SyncConfig,
}

impl SyncConfig {
    /// Load from a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Parse YAML text
    pub fn from_yaml_str(raw: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(raw)?;
        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }
        file.suspension.validate()?;
        Ok(file.suspension)
    }

    /// Serialize as a v1 YAML document
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            suspension: self.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Apply `INDEXSYNC_*` environment overrides
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, CLI flags, tests)
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        if let Some(value) = lookup(ENV_USE_CACHE) {
            self.use_shared_cache = parse_flag(ENV_USE_CACHE, &value)?;
        }
        if let Some(value) = lookup(ENV_SUSPENSION_BUFFER_SECS) {
            self.suspension_buffer_secs =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        var: ENV_SUSPENSION_BUFFER_SECS.to_string(),
                        value: value.clone(),
                    })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.suspension_buffer_secs > MAX_SUSPENSION_BUFFER_SECS {
            return Err(ConfigError::range_with_hint(
                "suspension_buffer_secs",
                self.suspension_buffer_secs,
                0,
                MAX_SUSPENSION_BUFFER_SECS,
                "The buffer only absorbs clock and commit skew; long windows make backfill re-index far more than the suspended changes.",
            ));
        }
        if self.cache_key.trim().is_empty() {
            return Err(ConfigError::range_with_hint(
                "cache_key",
                "\"\"",
                "1 char",
                "any",
                "Set a non-empty shared-cache key.",
            ));
        }
        Ok(())
    }

    /// Grace period as a chrono duration
    pub fn suspension_buffer(&self) -> chrono::Duration {
        // Bounded by MAX_SUSPENSION_BUFFER_SECS after validation
        chrono::Duration::seconds(self.suspension_buffer_secs.min(i64::MAX as u64) as i64)
    }
}

fn parse_flag(var: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
