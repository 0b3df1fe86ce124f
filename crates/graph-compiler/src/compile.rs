// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sub-graph compilation: fusion → negotiation → kernel selection.

use crate::{fusion, negotiate, CompileError, PrimitiveDescriptor};
use graph_ir::{EdgeId, Graph, NodeId, Validated};
use kernel_select::{
    BackendId, BenchmarkRunner, ImplRegistry, Kernel, KernelSelector, TuningCache, TuningConfig,
};
use partition_planner::PartitionPlan;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One executable step of a compiled sub-graph.
#[derive(Clone)]
pub struct ExecStep {
    /// The compiled node.
    pub node: NodeId,
    /// Node name, for perf counters and diagnostics.
    pub node_name: String,
    /// Selected implementation name.
    pub impl_name: String,
    /// The kernel handle, resolved once here.
    pub kernel: Arc<dyn Kernel>,
    /// Input edge buffers, in port order (fused extras appended).
    pub inputs: Vec<EdgeId>,
    /// Output edge buffer.
    pub output: EdgeId,
    /// Negotiated descriptor of the output buffer.
    pub output_desc: tensor_core::TensorDesc,
    /// Input index whose buffer the output aliases, if any.
    pub in_place: Option<usize>,
    /// Estimated cost of the selected kernel.
    pub estimated_cost: u64,
    /// Measured time when the selection came from tuning or a cache hit.
    pub measured_us: Option<u64>,
}

impl std::fmt::Debug for ExecStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecStep")
            .field("node", &self.node_name)
            .field("impl", &self.impl_name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("in_place", &self.in_place)
            .finish()
    }
}

/// One backend's compiled fragment: the straight-line step list plus the
/// blob names and dependencies inherited from the partition plan.
#[derive(Debug, Clone)]
pub struct CompiledSubgraph {
    pub index: usize,
    pub backend: BackendId,
    pub steps: Vec<ExecStep>,
    pub input_names: BTreeSet<String>,
    pub output_names: BTreeSet<String>,
    pub depends_on: Vec<usize>,
}

/// Everything compilation produces.
pub struct CompileOutput {
    /// The graph, including all inserted copy and reorder nodes.
    pub graph: Graph<Validated>,
    /// One compiled sub-graph per sub-request, plan order.
    pub subgraphs: Vec<CompiledSubgraph>,
    /// Selected descriptor per compiled node.
    pub descriptors: HashMap<NodeId, PrimitiveDescriptor>,
    /// Nodes absorbed by fusion, mapped to their hosts.
    pub absorbed: HashMap<NodeId, NodeId>,
}

/// Compiles a partitioned graph into executable sub-graphs.
///
/// Runs single-threaded, before any request targeting the graph exists —
/// the online cache and benchmark runner need no locking.
pub fn compile(
    graph: Graph<Validated>,
    plan: PartitionPlan,
    registry: &ImplRegistry,
    cache: &mut TuningCache,
    tuning: &TuningConfig,
    runner: Option<&dyn BenchmarkRunner>,
) -> Result<CompileOutput, CompileError> {
    let mut graph = graph;
    let mut plan = plan;

    let order = graph.topo_order()?;
    let mut fusion_table = fusion::analyze(&graph, &order, &plan);
    tracing::debug!(
        "fusion: {} node(s) absorbed",
        fusion_table.num_absorbed()
    );

    let mut negotiation =
        negotiate::negotiate(&mut graph, &mut plan, registry, &mut fusion_table)?;

    let mut selector = KernelSelector::new(registry, cache, tuning, runner);
    let mut subgraphs = Vec::with_capacity(plan.subrequests.len());

    for sub in &plan.subrequests {
        let mut steps = Vec::new();
        for &node_id in &sub.nodes {
            if fusion_table.is_absorbed(node_id) {
                continue;
            }
            let params = negotiation
                .params
                .get(&node_id)
                .expect("negotiation covered every scheduled node");
            let data = selector.select(sub.backend, params)?;

            let descriptor = negotiation
                .descriptors
                .get_mut(&node_id)
                .expect("descriptor recorded");
            descriptor.impl_name = data.impl_name.clone();

            steps.push(ExecStep {
                node: node_id,
                node_name: graph.node(node_id).name.clone(),
                impl_name: data.impl_name,
                kernel: data.kernel,
                inputs: negotiation.effective_inputs[&node_id].clone(),
                output: negotiation.effective_output[&node_id],
                output_desc: descriptor.outputs[0].desc.clone(),
                in_place: descriptor.in_place(),
                estimated_cost: data.estimated_cost,
                measured_us: data.measured_us,
            });
        }

        subgraphs.push(CompiledSubgraph {
            index: sub.index,
            backend: sub.backend,
            steps,
            input_names: sub.input_names.clone(),
            output_names: sub.output_names.clone(),
            depends_on: sub.depends_on.clone(),
        });
    }

    let absorbed: HashMap<NodeId, NodeId> = graph
        .iter_nodes()
        .filter_map(|node| fusion_table.host_of(node.id).map(|host| (node.id, host)))
        .collect();

    tracing::info!(
        "compiled '{}': {} sub-graphs, {} steps, {} fused",
        graph.name(),
        subgraphs.len(),
        subgraphs.iter().map(|s| s.steps.len()).sum::<usize>(),
        absorbed.len(),
    );

    Ok(CompileOutput {
        graph,
        subgraphs,
        descriptors: negotiation.descriptors,
        absorbed,
    })
}
