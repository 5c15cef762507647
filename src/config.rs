//! Engine configuration.
//!
//! A root layer uses [`EngineConfig::default()`] unless one is set on its
//! builder; child layers inherit their parent's configuration. Deployments
//! can also drive it from the environment with [`EngineConfig::from_env`].

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Environment variable for [`EngineConfig::hoist_parent_values`].
pub const ENV_HOIST_PARENT: &str = "STRATUM_HOIST_PARENT";
/// Environment variable for [`EngineConfig::snapshot_on_error`].
pub const ENV_SNAPSHOT_ON_ERROR: &str = "STRATUM_SNAPSHOT_ON_ERROR";
/// Environment variable for [`EngineConfig::max_depth`].
pub const ENV_MAX_DEPTH: &str = "STRATUM_MAX_DEPTH";
/// Environment variable for [`EngineConfig::eager_thread_name`].
pub const ENV_EAGER_THREAD_NAME: &str = "STRATUM_EAGER_THREAD_NAME";

/// Tunables for resolution behavior.
///
/// ```
/// use stratum_di::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_snapshot_on_error(true)
///     .with_max_depth(64);
/// assert!(config.hoist_parent_values);
/// assert_eq!(config.max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Copy values found in an ancestor into the child's import cache.
    pub hoist_parent_values: bool,
    /// Attach a [`GraphDump`](crate::GraphDump) to every resolution error.
    pub snapshot_on_error: bool,
    /// Maximum number of nested generator runs in one request.
    pub max_depth: usize,
    /// Name given to eager resolution threads.
    pub eager_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hoist_parent_values: true,
            snapshot_on_error: false,
            max_depth: 1024,
            eager_thread_name: "stratum-eager".to_string(),
        }
    }
}

impl EngineConfig {
    /// Sets [`hoist_parent_values`](Self::hoist_parent_values).
    pub fn with_hoist_parent_values(mut self, hoist: bool) -> Self {
        self.hoist_parent_values = hoist;
        self
    }

    /// Sets [`snapshot_on_error`](Self::snapshot_on_error).
    pub fn with_snapshot_on_error(mut self, snapshot: bool) -> Self {
        self.snapshot_on_error = snapshot;
        self
    }

    /// Sets [`max_depth`](Self::max_depth).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets [`eager_thread_name`](Self::eager_thread_name).
    pub fn with_eager_thread_name(mut self, name: impl Into<String>) -> Self {
        self.eager_thread_name = name.into();
        self
    }

    /// Reads the `STRATUM_*` variables, falling back to the default for any
    /// that is unset or unparsable.
    ///
    /// Booleans accept `1/0`, `true/false`, `yes/no` and `on/off`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(hoist) = env_bool(ENV_HOIST_PARENT) {
            config.hoist_parent_values = hoist;
        }
        if let Some(snapshot) = env_bool(ENV_SNAPSHOT_ON_ERROR) {
            config.snapshot_on_error = snapshot;
        }
        if let Some(depth) = env::var(ENV_MAX_DEPTH).ok().and_then(|v| v.trim().parse().ok()) {
            config.max_depth = depth;
        } else if env::var_os(ENV_MAX_DEPTH).is_some() {
            tracing::warn!(var = ENV_MAX_DEPTH, "ignoring unparsable value");
        }
        if let Ok(name) = env::var(ENV_EAGER_THREAD_NAME) {
            if !name.trim().is_empty() {
                config.eager_thread_name = name;
            }
        }
        config
    }
}

fn env_bool(var: &str) -> Option<bool> {
    let raw = env::var(var).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(var, value = %raw, "ignoring unparsable boolean");
            None
        }
    }
}
