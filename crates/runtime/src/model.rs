// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled model: everything requests share.

use crate::{InferRequest, PerfCounter, PerfStatus};
use graph_compiler::CompiledSubgraph;
use graph_ir::{EdgeId, Graph, Validated};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tensor_core::{Tensor, TensorDesc};

/// The immutable result of [`crate::compile`]: the annotated graph, the
/// compiled sub-graphs, and the blob name tables.
///
/// Shared read-only by every [`InferRequest`] created from it.
#[derive(Clone)]
pub struct CompiledModel {
    pub(crate) inner: Arc<ModelInner>,
}

pub(crate) struct ModelInner {
    pub graph: Graph<Validated>,
    pub subgraphs: Vec<Arc<CompiledSubgraph>>,
    /// Graph input blobs by name.
    pub inputs: BTreeMap<String, EdgeId>,
    /// Graph output blobs by name.
    pub outputs: BTreeMap<String, EdgeId>,
    /// Constant buffers, bound into every request's table.
    pub constants: HashMap<EdgeId, Arc<Tensor>>,
    /// Per-node counter template, cloned into each request.
    pub perf_template: BTreeMap<String, PerfCounter>,
    pub profiling: bool,
}

impl CompiledModel {
    /// Creates a reusable inference request against this model.
    pub fn create_request(&self) -> InferRequest {
        InferRequest::new(self.inner.clone())
    }

    /// Returns the input blob names in declaration order.
    pub fn input_names(&self) -> Vec<&str> {
        self.inner.inputs.keys().map(String::as_str).collect()
    }

    /// Returns the output blob names in declaration order.
    pub fn output_names(&self) -> Vec<&str> {
        self.inner.outputs.keys().map(String::as_str).collect()
    }

    /// Returns the declared descriptor of a named input or output blob.
    pub fn blob_desc(&self, name: &str) -> Option<&TensorDesc> {
        self.inner
            .inputs
            .get(name)
            .or_else(|| self.inner.outputs.get(name))
            .map(|&edge| &self.inner.graph.edge(edge).desc)
    }

    /// Number of compiled sub-graphs.
    pub fn num_subgraphs(&self) -> usize {
        self.inner.subgraphs.len()
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let steps: usize = self.inner.subgraphs.iter().map(|s| s.steps.len()).sum();
        let absorbed = self
            .inner
            .perf_template
            .values()
            .filter(|c| c.status == PerfStatus::Absorbed)
            .count();
        format!(
            "CompiledModel '{}': {} sub-graphs, {} steps, {} fused nodes, inputs {:?}, outputs {:?}",
            self.inner.graph.name(),
            self.inner.subgraphs.len(),
            steps,
            absorbed,
            self.input_names(),
            self.output_names(),
        )
    }
}

impl std::fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModel")
            .field("graph", &self.inner.graph.name())
            .field("subgraphs", &self.inner.subgraphs.len())
            .finish()
    }
}
