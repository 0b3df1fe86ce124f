// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernel-select
//!
//! Kernel selection for compiled graph nodes.
//!
//! Every operator has one or more registered candidate implementations,
//! each an opaque, benchmarkable unit with a declared [`CapabilityKey`].
//! Selection runs per node compilation, never per request, through three
//! paths:
//!
//! 1. **Naive** (default): every implementation whose capability key is a
//!    superset of the node's required key attempts to produce kernel data;
//!    the lowest estimated cost wins, ties broken by registration order.
//!    A failing attempt excludes that candidate — it is never fatal.
//! 2. **Cached**: a stable hash of the node's normalised parameters is
//!    looked up in the offline cache (tuning disabled) or the online cache
//!    (tuning enabled). Hits are re-validated against the required key and
//!    fall back to the naive path when stale.
//! 3. **Online tuning**: with a [`BenchmarkRunner`] available, every
//!    tuning-eligible candidate's kernels are measured and the fastest is
//!    persisted. Without a runner the selector degrades silently to the
//!    naive path.
//!
//! The offline cache is a device-keyed, append-only text file so tuning
//! results stay diffable and tool-inspectable.

mod backend;
mod cache;
mod capability;
mod error;
mod implementation;
mod params;
pub mod reference;
mod selector;
mod tuning;

pub use backend::{BackendDesc, BackendId, ImplRegistry};
pub use cache::{stable_hash, CacheRecord, TuningCache};
pub use capability::CapabilityKey;
pub use error::{KernelAttemptError, KernelError, SelectError};
pub use implementation::{CandidateImpl, ImplConfig, Kernel, KernelData};
pub use params::{KernelParams, PostOp};
pub use selector::KernelSelector;
pub use tuning::{BenchmarkRunner, InProcessRunner, TuningConfig, TuningMode};
