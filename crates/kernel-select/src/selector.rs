// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The kernel-selection state machine.
//!
//! Selection runs once per node compilation:
//!
//! ```text
//! select()
//!   ├─ tuning disabled ──► offline cache ──hit──► re-validate ──ok──► done
//!   │                          │ miss/stale                 │ stale
//!   │                          ▼                            ▼
//!   │                      naive path ◄────────────────────┘
//!   ├─ tuning enabled ───► online cache ──hit──► re-validate ──ok──► done
//!   │                          │ miss/stale
//!   │                          ▼
//!   │        runner available? ──no──► naive path (silent degrade)
//!   │                          │ yes
//!   │                          ▼
//!   │        measure tuning-eligible candidates
//!   │            │ none usable
//!   │            ▼
//!   │        measure reference (non-tuning) candidates
//!   │            │ winner
//!   │            ▼
//!   │        persist (hash → impl, index) ──► done
//! ```
//!
//! Cost ties on the naive path are broken by registration order — first
//! wins — so selection is deterministic for fixed inputs.

use crate::{
    stable_hash, BackendId, BenchmarkRunner, CacheRecord, CandidateImpl as _, ImplRegistry,
    KernelData, KernelParams, SelectError, TuningCache, TuningConfig, TuningMode,
};

/// Selects one kernel per node from the registry, consulting the tuning
/// cache.
///
/// The selector borrows everything it touches: the registry and offline
/// cache are shared read-only, the cache is only written on a tuning win.
/// Selection happens single-threaded during compilation, before any
/// request targeting the graph exists.
pub struct KernelSelector<'a> {
    registry: &'a ImplRegistry,
    cache: &'a mut TuningCache,
    tuning: &'a TuningConfig,
    runner: Option<&'a dyn BenchmarkRunner>,
}

impl<'a> KernelSelector<'a> {
    pub fn new(
        registry: &'a ImplRegistry,
        cache: &'a mut TuningCache,
        tuning: &'a TuningConfig,
        runner: Option<&'a dyn BenchmarkRunner>,
    ) -> Self {
        Self {
            registry,
            cache,
            tuning,
            runner,
        }
    }

    /// Selects the kernel for one node on `backend`.
    pub fn select(
        &mut self,
        backend: BackendId,
        params: &KernelParams,
    ) -> Result<KernelData, SelectError> {
        let desc = self
            .registry
            .backend(backend)
            .ok_or(SelectError::UnknownBackend(backend))?;
        let device = desc.device_id.clone();
        let driver = desc.driver_version.clone();
        let host = desc.host_version.clone();

        let hash = stable_hash(&params.normalized());

        let cached = match self.tuning.mode {
            TuningMode::Disabled => self.cache.lookup_offline(&device, hash).cloned(),
            TuningMode::UseCache | TuningMode::TuneAndCache => self
                .cache
                .lookup_online(&device, &driver, &host, hash)
                .cloned(),
        };

        if let Some(record) = cached {
            if let Some(data) = self.build_cached(backend, params, &record) {
                tracing::debug!(
                    "node '{}': cache hit → {} (index {})",
                    params.node,
                    record.impl_name,
                    record.tune_index,
                );
                return Ok(data);
            }
            // Cache is stale for this key (implementation gone, key no
            // longer supported, or build refused) — fall through to the
            // naive path, as a hit that cannot be honoured must not
            // trigger re-tuning.
            tracing::debug!(
                "node '{}': stale cache entry '{}', using naive path",
                params.node,
                record.impl_name,
            );
            return self.naive_best(backend, params);
        }

        if self.tuning.mode != TuningMode::TuneAndCache {
            return self.naive_best(backend, params);
        }
        let Some(runner) = self.runner else {
            // Tuning requested but no runner: degrade silently.
            tracing::debug!(
                "node '{}': tuning requested without a runner, using naive path",
                params.node,
            );
            return self.naive_best(backend, params);
        };

        self.tune(backend, params, runner, &device, &driver, &host, hash)
    }

    /// Rebuilds a cached selection, re-validating the capability key.
    fn build_cached(
        &self,
        backend: BackendId,
        params: &KernelParams,
        record: &CacheRecord,
    ) -> Option<KernelData> {
        let required = params.required_key();
        let implementation = self
            .registry
            .candidates(backend, params.op)
            .iter()
            .find(|imp| imp.name() == record.impl_name)?;
        if !implementation.supported_key().supports(required) {
            return None;
        }
        let mut data = implementation.build(params, record.tune_index).ok()?;
        data.measured_us = Some(record.micros);
        Some(data)
    }

    /// The naive path: lowest estimated cost among capability-matching
    /// candidates; individual build failures exclude the candidate.
    pub fn naive_best(
        &self,
        backend: BackendId,
        params: &KernelParams,
    ) -> Result<KernelData, SelectError> {
        let required = params.required_key();
        let mut best: Option<KernelData> = None;

        for implementation in self.registry.candidates(backend, params.op) {
            if !implementation.supported_key().supports(required) {
                continue;
            }
            match implementation.build(params, 0) {
                Ok(data) => {
                    // Strict `<` keeps the first-registered candidate on a
                    // tie.
                    let better = best
                        .as_ref()
                        .map(|b| data.estimated_cost < b.estimated_cost)
                        .unwrap_or(true);
                    if better {
                        best = Some(data);
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "node '{}': candidate '{}' not applicable: {}",
                        params.node,
                        implementation.name(),
                        e,
                    );
                }
            }
        }

        best.ok_or_else(|| SelectError::NoKernel {
            node: params.node.clone(),
            op: params.op.to_string(),
        })
    }

    /// Online tuning: measure tuning-eligible candidates, fall back to the
    /// reference pool, persist the winner.
    #[allow(clippy::too_many_arguments)]
    fn tune(
        &mut self,
        backend: BackendId,
        params: &KernelParams,
        runner: &dyn BenchmarkRunner,
        device: &str,
        driver: &str,
        host: &str,
        hash: u64,
    ) -> Result<KernelData, SelectError> {
        let mut best = self.measure_pool(backend, params, runner, true);
        if best.is_none() {
            // No tuning-eligible implementation produced usable kernels;
            // retry restricted to the reference pool before giving up.
            best = self.measure_pool(backend, params, runner, false);
        }

        let Some(data) = best else {
            return Err(SelectError::NoKernel {
                node: params.node.clone(),
                op: params.op.to_string(),
            });
        };

        let micros = data.measured_us.unwrap_or(0);
        self.cache.store(
            device,
            driver,
            host,
            hash,
            CacheRecord {
                impl_name: data.impl_name.clone(),
                tune_index: data.tune_index,
                micros,
            },
        )?;
        tracing::info!(
            "node '{}': tuned → {} (index {}, {}us)",
            params.node,
            data.impl_name,
            data.tune_index,
            micros,
        );
        Ok(data)
    }

    /// Builds and measures every candidate in one pool (tuning-eligible or
    /// reference) and returns the minimum measured time.
    fn measure_pool(
        &self,
        backend: BackendId,
        params: &KernelParams,
        runner: &dyn BenchmarkRunner,
        tuning_pool: bool,
    ) -> Option<KernelData> {
        let required = params.required_key();
        let mut best: Option<KernelData> = None;

        for implementation in self.registry.candidates(backend, params.op) {
            if implementation.tuning_supported() != tuning_pool
                || !implementation.supported_key().supports(required)
            {
                continue;
            }

            let mut kernels = Vec::new();
            for index in implementation.tune_indices(params) {
                match implementation.build(params, index) {
                    Ok(data) => kernels.push(data),
                    Err(e) => {
                        tracing::debug!(
                            "node '{}': tuning candidate '{}' index {} not applicable: {}",
                            params.node,
                            implementation.name(),
                            index,
                            e,
                        );
                    }
                }
            }
            if kernels.is_empty() {
                continue;
            }

            let times = runner.run_kernels(params, &kernels);
            for (mut data, time) in kernels.into_iter().zip(times) {
                if time == u64::MAX {
                    continue;
                }
                data.measured_us = Some(time);
                let better = best
                    .as_ref()
                    .and_then(|b| b.measured_us)
                    .map(|t| time < t)
                    .unwrap_or(true);
                if better {
                    best = Some(data);
                }
            }
        }

        best
    }
}
