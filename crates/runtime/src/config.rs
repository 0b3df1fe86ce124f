// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! num_threads = 4
//! enable_profiling = true
//! tuning_mode = "tune_and_cache"
//! tuning_cache = "./tuning.cache"
//! ```

use kernel_select::{TuningConfig, TuningMode};
use std::path::{Path, PathBuf};

/// Configuration for the dispatch engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads (defaults to the number of online CPU
    /// cores). The embedding application sizes its tokio runtime with
    /// this.
    pub num_threads: Option<usize>,
    /// Whether per-node timing is recorded during execution.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// How the kernel selector consults the tuning cache.
    #[serde(default)]
    pub tuning_mode: TuningMode,
    /// Backing file for the offline tuning cache.
    #[serde(default)]
    pub tuning_cache: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, super::RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            super::RuntimeError::Config(format!(
                "cannot read config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, super::RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| super::RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, super::RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| super::RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Returns the tuning configuration for the kernel selector.
    pub fn tuning_config(&self) -> TuningConfig {
        TuningConfig {
            mode: self.tuning_mode,
            cache_file: self.tuning_cache.clone(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            enable_profiling: true,
            tuning_mode: TuningMode::Disabled,
            tuning_cache: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert!(c.enable_profiling);
        assert_eq!(c.tuning_mode, TuningMode::Disabled);
        assert!(c.tuning_cache.is_none());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
num_threads = 2
enable_profiling = false
tuning_mode = "tune_and_cache"
tuning_cache = "/tmp/tuning.cache"
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.num_threads, Some(2));
        assert!(!c.enable_profiling);
        assert_eq!(c.tuning_mode, TuningMode::TuneAndCache);
        assert_eq!(c.tuning_cache, Some(PathBuf::from("/tmp/tuning.cache")));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            num_threads: Some(8),
            tuning_mode: TuningMode::UseCache,
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        let back = RuntimeConfig::from_toml(&toml).unwrap();
        assert_eq!(back.num_threads, Some(8));
        assert_eq!(back.tuning_mode, TuningMode::UseCache);
    }

    #[test]
    fn test_resolve_threads() {
        let c = RuntimeConfig {
            num_threads: Some(8),
            ..Default::default()
        };
        assert_eq!(c.resolve_threads(), 8);

        let c2 = RuntimeConfig::default();
        assert!(c2.resolve_threads() >= 1);
    }

    #[test]
    fn test_bad_toml() {
        assert!(RuntimeConfig::from_toml("num_threads = \"many\"").is_err());
    }
}
