// Engine configuration
// Passed explicitly into the engine; nothing reads these values globally.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MEMORY_LIMIT_MB: u32 = 256;
pub const DEFAULT_SANDBOX_DIR: &str = "./sandbox";
pub const DEFAULT_REMOTE_URL: &str = "https://emkc.org/api/v2/piston";
pub const DEFAULT_REMOTE_OVERHEAD_SECS: u64 = 5;
pub const DEFAULT_PYTHON_BIN: &str = "python3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub default_timeout_secs: u64,
    pub memory_limit_mb: u32,
    pub sandbox_dir: PathBuf,
    pub remote_enabled: bool,
    pub remote_url: String,
    /// Extra wait on top of the execution budget for the API round-trip
    pub remote_overhead_secs: u64,
    pub python_bin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            sandbox_dir: PathBuf::from(DEFAULT_SANDBOX_DIR),
            remote_enabled: true,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_overhead_secs: DEFAULT_REMOTE_OVERHEAD_SECS,
            python_bin: DEFAULT_PYTHON_BIN.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment in production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            default_timeout_secs: parse_or(&lookup, "SANDBOX_TIMEOUT", defaults.default_timeout_secs),
            memory_limit_mb: parse_or(&lookup, "SANDBOX_MEMORY_LIMIT_MB", defaults.memory_limit_mb),
            sandbox_dir: lookup("SANDBOX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.sandbox_dir),
            remote_enabled: lookup("USE_EXTERNAL_API")
                .map(|v| parse_flag(&v, defaults.remote_enabled))
                .unwrap_or(defaults.remote_enabled),
            remote_url: lookup("PISTON_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.remote_url),
            remote_overhead_secs: parse_or(&lookup, "REMOTE_OVERHEAD_SECS", defaults.remote_overhead_secs),
            python_bin: lookup("PYTHON_BIN").unwrap_or(defaults.python_bin),
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_secs * 1000
    }

    pub fn with_sandbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox_dir = dir.into();
        self
    }

    pub fn with_remote(mut self, enabled: bool) -> Self {
        self.remote_enabled = enabled;
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    pub fn with_python_bin(mut self, bin: impl Into<String>) -> Self {
        self.python_bin = bin.into();
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = key, value = %raw, default = %default, "Invalid config value, using default");
                default
            }
        },
        None => default,
    }
}

fn parse_flag(raw: &str, default: bool) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(value = %raw, default = default, "Invalid boolean config value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_timeout_ms(), 5000);
        assert_eq!(config.memory_limit_mb, 256);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("SANDBOX_TIMEOUT", "10"),
            ("SANDBOX_PATH", "/tmp/grading"),
            ("USE_EXTERNAL_API", "false"),
            ("PISTON_API_URL", "http://localhost:2000/api/v2/"),
        ]));
        assert_eq!(config.default_timeout_secs, 10);
        assert_eq!(config.sandbox_dir, PathBuf::from("/tmp/grading"));
        assert!(!config.remote_enabled);
        assert_eq!(config.remote_url, "http://localhost:2000/api/v2");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("SANDBOX_TIMEOUT", "soon"),
            ("USE_EXTERNAL_API", "maybe"),
        ]));
        assert_eq!(config.default_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.remote_enabled);
    }
}
