//! # Engine Configuration
//!
//! Plain settings with defaults, optionally overridden from the environment.

use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_BRIDGE_THREAD: &str = "litengine-bridge";
pub const DEFAULT_OUTPUT_PREFIX: &str = "raw";

pub const ENV_MAX_DEPTH: &str = "LITENGINE_MAX_DEPTH";
pub const ENV_BRIDGE_THREAD: &str = "LITENGINE_BRIDGE_THREAD";
pub const ENV_OUTPUT_PREFIX: &str = "LITENGINE_OUTPUT_PREFIX";
pub const ENV_VERIFY_LITERALS: &str = "LITENGINE_VERIFY_LITERALS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deepest value nesting a conversion will follow.
    pub max_depth: usize,
    /// Name of the thread a dedicated bridge runs on.
    pub bridge_thread_name: String,
    /// Prefix for URIs minted by the default storage.
    pub output_prefix: String,
    /// Check every produced literal against its described wire type.
    pub verify_literals: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            bridge_thread_name: DEFAULT_BRIDGE_THREAD.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            verify_literals: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `LITENGINE_*` variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(depth) = parse_var(&lookup, ENV_MAX_DEPTH) {
            if depth == 0 {
                warn!(var = ENV_MAX_DEPTH, "max depth must be positive; keeping default");
            } else {
                config.max_depth = depth;
            }
        }
        if let Some(name) = lookup(ENV_BRIDGE_THREAD).filter(|s| !s.is_empty()) {
            config.bridge_thread_name = name;
        }
        if let Some(prefix) = lookup(ENV_OUTPUT_PREFIX).filter(|s| !s.is_empty()) {
            config.output_prefix = prefix;
        }
        if let Some(verify) = parse_var(&lookup, ENV_VERIFY_LITERALS) {
            config.verify_literals = verify;
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
