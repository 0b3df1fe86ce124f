// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The autotuning cache: parameter hash → fastest known implementation.
//!
//! Two stores share one record type:
//! - **offline**: keyed by `(device, hash)`, loaded read-only from an
//!   append-only text file. Safe to share across threads without locking.
//! - **online**: keyed additionally by driver and host version, populated
//!   by in-process tuning and appended to the same file so the next run
//!   starts warm.
//!
//! # File Format
//! One tab-separated record per line:
//! ```text
//! <device>\t<hash>\t<impl_name>\t<tune_index>\t<micros>
//! ```
//! Appending is the only write mode; on load, the last record for a key
//! wins. Malformed lines are skipped (logged at debug), so a truncated
//! final line after a crash never poisons the cache.

use crate::SelectError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Computes the stable FNV-1a hash of a normalised parameter string.
///
/// The hash must survive process restarts and library upgrades, which
/// rules out `DefaultHasher`; FNV-1a is fixed by definition.
pub fn stable_hash(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// One cached tuning result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Winning implementation name.
    pub impl_name: String,
    /// Tuning configuration index of the winning kernel.
    pub tune_index: i32,
    /// Measured run time in microseconds (0 when unknown).
    pub micros: u64,
}

/// The tuning cache, offline and online stores combined.
pub struct TuningCache {
    offline: HashMap<(String, u64), CacheRecord>,
    online: HashMap<(String, String, String, u64), CacheRecord>,
    file: Option<PathBuf>,
}

impl TuningCache {
    /// Creates an empty, memory-only cache (no persistence).
    pub fn in_memory() -> Self {
        Self {
            offline: HashMap::new(),
            online: HashMap::new(),
            file: None,
        }
    }

    /// Opens a cache backed by `path`, loading any existing records.
    ///
    /// A missing file is an empty cache, not an error.
    pub fn open(path: &Path) -> Result<Self, SelectError> {
        let mut cache = Self {
            offline: HashMap::new(),
            online: HashMap::new(),
            file: Some(path.to_path_buf()),
        };

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut loaded = 0usize;
                for (lineno, line) in content.lines().enumerate() {
                    match parse_line(line) {
                        Some((device, hash, record)) => {
                            cache.offline.insert((device, hash), record);
                            loaded += 1;
                        }
                        None if line.trim().is_empty() => {}
                        None => {
                            tracing::debug!(
                                "skipping malformed cache line {} in '{}'",
                                lineno + 1,
                                path.display(),
                            );
                        }
                    }
                }
                tracing::info!(
                    "tuning cache '{}': {} records loaded",
                    path.display(),
                    loaded,
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("tuning cache '{}' not found, starting empty", path.display());
            }
            Err(e) => return Err(SelectError::CacheIo(e)),
        }

        Ok(cache)
    }

    /// Looks up the offline store: `(device, hash)`.
    pub fn lookup_offline(&self, device: &str, hash: u64) -> Option<&CacheRecord> {
        self.offline.get(&(device.to_string(), hash))
    }

    /// Looks up the online store: `(device, driver, host, hash)`.
    pub fn lookup_online(
        &self,
        device: &str,
        driver: &str,
        host: &str,
        hash: u64,
    ) -> Option<&CacheRecord> {
        self.online.get(&(
            device.to_string(),
            driver.to_string(),
            host.to_string(),
            hash,
        ))
    }

    /// Stores a tuning result in both stores and appends it to the cache
    /// file when one is configured.
    pub fn store(
        &mut self,
        device: &str,
        driver: &str,
        host: &str,
        hash: u64,
        record: CacheRecord,
    ) -> Result<(), SelectError> {
        if let Some(path) = &self.file {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(
                file,
                "{}\t{:016x}\t{}\t{}\t{}",
                device, hash, record.impl_name, record.tune_index, record.micros,
            )?;
        }

        self.offline
            .insert((device.to_string(), hash), record.clone());
        self.online.insert(
            (
                device.to_string(),
                driver.to_string(),
                host.to_string(),
                hash,
            ),
            record,
        );
        Ok(())
    }

    /// Number of offline records.
    pub fn len(&self) -> usize {
        self.offline.len()
    }

    /// Returns `true` if the offline store is empty.
    pub fn is_empty(&self) -> bool {
        self.offline.is_empty()
    }

    /// Iterates over offline records as `(device, hash, record)`, sorted
    /// for stable output (CLI dumps, tests).
    pub fn iter_sorted(&self) -> Vec<(&str, u64, &CacheRecord)> {
        let mut entries: Vec<_> = self
            .offline
            .iter()
            .map(|((device, hash), record)| (device.as_str(), *hash, record))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }
}

/// Parses one cache line; `None` for malformed input.
fn parse_line(line: &str) -> Option<(String, u64, CacheRecord)> {
    let mut parts = line.split('\t');
    let device = parts.next()?.to_string();
    let hash = u64::from_str_radix(parts.next()?, 16).ok()?;
    let impl_name = parts.next()?.to_string();
    let tune_index = parts.next()?.parse().ok()?;
    let micros = parts.next()?.parse().ok()?;
    if device.is_empty() || impl_name.is_empty() {
        return None;
    }
    Some((
        device,
        hash,
        CacheRecord {
            impl_name,
            tune_index,
            micros,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, index: i32) -> CacheRecord {
        CacheRecord {
            impl_name: name.into(),
            tune_index: index,
            micros: 42,
        }
    }

    #[test]
    fn test_stable_hash_known_values() {
        // FNV-1a is fixed by definition; pin a couple of values.
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(stable_hash("a"), stable_hash("b"));
        assert_eq!(stable_hash("op=matmul"), stable_hash("op=matmul"));
    }

    #[test]
    fn test_in_memory_store_and_lookup() {
        let mut cache = TuningCache::in_memory();
        cache
            .store("dev0", "drv1", "host1", 99, record("impl_a", 2))
            .unwrap();

        assert_eq!(cache.lookup_offline("dev0", 99), Some(&record("impl_a", 2)));
        assert_eq!(
            cache.lookup_online("dev0", "drv1", "host1", 99),
            Some(&record("impl_a", 2))
        );
        // Different device or driver never hits.
        assert!(cache.lookup_offline("dev1", 99).is_none());
        assert!(cache.lookup_online("dev0", "drv2", "host1", 99).is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.cache");

        {
            let mut cache = TuningCache::open(&path).unwrap();
            cache
                .store("dev0", "", "", 7, record("impl_a", 1))
                .unwrap();
            cache
                .store("dev0", "", "", 8, record("impl_b", 0))
                .unwrap();
        }

        let reloaded = TuningCache::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.lookup_offline("dev0", 7).unwrap().impl_name, "impl_a");
        assert_eq!(reloaded.lookup_offline("dev0", 8).unwrap().impl_name, "impl_b");
    }

    #[test]
    fn test_append_only_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.cache");

        {
            let mut cache = TuningCache::open(&path).unwrap();
            cache.store("dev0", "", "", 7, record("old", 0)).unwrap();
            cache.store("dev0", "", "", 7, record("new", 3)).unwrap();
        }

        // Both lines are on disk; the later one wins on load.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let reloaded = TuningCache::open(&path).unwrap();
        assert_eq!(reloaded.lookup_offline("dev0", 7).unwrap().impl_name, "new");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.cache");
        std::fs::write(
            &path,
            "dev0\t0000000000000007\timpl_a\t1\t10\nnot a record\ndev0\tzzzz\tx\t0\t0\n",
        )
        .unwrap();

        let cache = TuningCache::open(&path).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup_offline("dev0", 7).unwrap().impl_name, "impl_a");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TuningCache::open(&dir.path().join("absent.cache")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_iter_sorted() {
        let mut cache = TuningCache::in_memory();
        cache.store("b", "", "", 2, record("x", 0)).unwrap();
        cache.store("a", "", "", 9, record("y", 0)).unwrap();
        cache.store("a", "", "", 1, record("z", 0)).unwrap();

        let keys: Vec<_> = cache
            .iter_sorted()
            .into_iter()
            .map(|(d, h, _)| (d.to_string(), h))
            .collect();
        assert_eq!(
            keys,
            vec![("a".to_string(), 1), ("a".to_string(), 9), ("b".to_string(), 2)]
        );
    }
}
