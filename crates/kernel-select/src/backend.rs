// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backend identities and the candidate-implementation registry.
//!
//! The set of available backends and their registered implementations is
//! supplied by the embedding application (a device registry is outside
//! this engine); the registry here is the engine's view of that data.

use crate::CandidateImpl;
use graph_ir::OpKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of one compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct BackendId(pub u8);

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend{}", self.0)
    }
}

/// Descriptive identity of a backend, used to key tuning-cache entries so
/// results never leak across hardware.
#[derive(Debug, Clone)]
pub struct BackendDesc {
    pub id: BackendId,
    /// Human-readable name ("cpu", "accel0").
    pub name: String,
    /// Stable device identity string.
    pub device_id: String,
    /// Driver version, part of the online cache key.
    pub driver_version: String,
    /// Host/runtime version, part of the online cache key.
    pub host_version: String,
}

impl BackendDesc {
    /// Creates a descriptor with empty driver/host versions.
    pub fn new(id: BackendId, name: &str, device_id: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            device_id: device_id.to_string(),
            driver_version: String::new(),
            host_version: String::new(),
        }
    }
}

/// Registry of candidate implementations per (backend, operator).
///
/// Registration order is meaningful: the selector breaks cost ties in
/// favour of the first-registered candidate, which keeps selection
/// deterministic for fixed inputs.
#[derive(Default)]
pub struct ImplRegistry {
    backends: Vec<BackendDesc>,
    impls: HashMap<(BackendId, OpKind), Vec<Arc<dyn CandidateImpl>>>,
}

impl ImplRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend descriptor.
    pub fn add_backend(&mut self, desc: BackendDesc) {
        self.backends.push(desc);
    }

    /// Returns a backend descriptor by id.
    pub fn backend(&self, id: BackendId) -> Option<&BackendDesc> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Returns all registered backends.
    pub fn backends(&self) -> &[BackendDesc] {
        &self.backends
    }

    /// Registers a candidate for `(backend, op)`, appended after any
    /// existing candidates.
    pub fn register(
        &mut self,
        backend: BackendId,
        op: OpKind,
        implementation: Arc<dyn CandidateImpl>,
    ) {
        self.impls
            .entry((backend, op))
            .or_default()
            .push(implementation);
    }

    /// Returns the candidates for `(backend, op)` in registration order.
    pub fn candidates(&self, backend: BackendId, op: OpKind) -> &[Arc<dyn CandidateImpl>] {
        self.impls
            .get(&(backend, op))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` if at least one candidate exists for `(backend, op)`.
    pub fn supports(&self, backend: BackendId, op: OpKind) -> bool {
        !self.candidates(backend, op).is_empty()
    }
}

impl std::fmt::Debug for ImplRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplRegistry")
            .field("backends", &self.backends.len())
            .field("entries", &self.impls.len())
            .finish()
    }
}
