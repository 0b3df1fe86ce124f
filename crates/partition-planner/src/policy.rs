// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backend-assignment policies.
//!
//! A policy decides, per node, which backend should execute it. The
//! planner validates every choice against the implementation registry:
//! a node for which no backend has a registered candidate is fatal.

use graph_ir::Node;
use kernel_select::{BackendId, ImplRegistry};
use std::collections::HashMap;

/// Per-node backend assignment.
///
/// Policies are purely algorithmic — no I/O or device probing — which
/// keeps them trivially unit-testable.
pub trait BackendPolicy: Send + Sync {
    /// Human-readable name of this policy.
    fn name(&self) -> &str;

    /// Chooses a backend for `node`, or `None` when no registered backend
    /// supports it (which the planner reports as fatal).
    fn assign(&self, node: &Node, registry: &ImplRegistry) -> Option<BackendId>;
}

/// Assigns every node to one backend.
#[derive(Debug, Clone)]
pub struct SingleBackend {
    backend: BackendId,
}

impl SingleBackend {
    pub fn new(backend: BackendId) -> Self {
        Self { backend }
    }
}

impl BackendPolicy for SingleBackend {
    fn name(&self) -> &str {
        "single-backend"
    }

    fn assign(&self, node: &Node, registry: &ImplRegistry) -> Option<BackendId> {
        registry
            .supports(self.backend, node.op)
            .then_some(self.backend)
    }
}

/// Prefers an accelerator backend, falling back per node to a host
/// backend for operators the accelerator cannot run.
#[derive(Debug, Clone)]
pub struct PreferAccelerator {
    accelerator: BackendId,
    fallback: BackendId,
}

impl PreferAccelerator {
    pub fn new(accelerator: BackendId, fallback: BackendId) -> Self {
        Self {
            accelerator,
            fallback,
        }
    }
}

impl BackendPolicy for PreferAccelerator {
    fn name(&self) -> &str {
        "prefer-accelerator"
    }

    fn assign(&self, node: &Node, registry: &ImplRegistry) -> Option<BackendId> {
        if registry.supports(self.accelerator, node.op) {
            return Some(self.accelerator);
        }
        registry
            .supports(self.fallback, node.op)
            .then_some(self.fallback)
    }
}

/// Explicit per-node affinities with a default backend.
#[derive(Debug, Clone)]
pub struct ExplicitAffinity {
    affinities: HashMap<String, BackendId>,
    default: BackendId,
}

impl ExplicitAffinity {
    pub fn new(affinities: HashMap<String, BackendId>, default: BackendId) -> Self {
        Self {
            affinities,
            default,
        }
    }

    /// Convenience constructor from `(node name, backend)` pairs.
    pub fn from_pairs(pairs: &[(&str, BackendId)], default: BackendId) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, backend)| (name.to_string(), *backend))
                .collect(),
            default,
        )
    }
}

impl BackendPolicy for ExplicitAffinity {
    fn name(&self) -> &str {
        "explicit-affinity"
    }

    fn assign(&self, node: &Node, registry: &ImplRegistry) -> Option<BackendId> {
        let chosen = self
            .affinities
            .get(&node.name)
            .copied()
            .unwrap_or(self.default);
        registry.supports(chosen, node.op).then_some(chosen)
    }
}
