// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The top-level compilation entry point.

use crate::model::ModelInner;
use crate::{CompiledModel, PerfCounter, PerfStatus, RuntimeConfig, RuntimeError};
use graph_ir::{Graph, Validated};
use kernel_select::{BenchmarkRunner, ImplRegistry, TuningCache};
use partition_planner::BackendPolicy;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Compiles a validated graph into a [`CompiledModel`].
///
/// Pipeline: partition under `policy` → negotiate descriptors → select
/// kernels (consulting `cache`, measuring with `runner` when the config
/// enables tuning). Runs entirely on the calling thread; no request
/// exists until the returned model creates one.
pub fn compile(
    graph: Graph<Validated>,
    policy: &dyn BackendPolicy,
    registry: &ImplRegistry,
    cache: &mut TuningCache,
    config: &RuntimeConfig,
    runner: Option<&dyn BenchmarkRunner>,
) -> Result<CompiledModel, RuntimeError> {
    tracing::info!("compiling '{}' with policy '{}'", graph.name(), policy.name());

    let (graph, plan) = partition_planner::partition(graph, policy, registry)?;
    let tuning = config.tuning_config();
    let output = graph_compiler::compile(graph, plan, registry, cache, &tuning, runner)?;

    let graph = output.graph;

    let inputs: BTreeMap<String, graph_ir::EdgeId> = graph
        .inputs()
        .iter()
        .map(|&edge| (graph.edge(edge).display_name(), edge))
        .collect();
    let outputs: BTreeMap<String, graph_ir::EdgeId> = graph
        .outputs()
        .iter()
        .map(|&edge| (graph.edge(edge).display_name(), edge))
        .collect();

    let constants: HashMap<graph_ir::EdgeId, Arc<tensor_core::Tensor>> = graph
        .iter_edges()
        .filter_map(|edge| {
            graph
                .constant(edge.id)
                .map(|tensor| (edge.id, Arc::new(tensor.clone())))
        })
        .collect();

    // Counter template: every compute node, absorbed ones marked.
    let mut perf_template = BTreeMap::new();
    for node in graph.iter_nodes() {
        if !node.op.is_compute() {
            continue;
        }
        let (impl_name, status, estimated_cost) = if let Some(host) = output.absorbed.get(&node.id)
        {
            let host_impl = output
                .descriptors
                .get(host)
                .map(|d| d.impl_name.clone())
                .unwrap_or_default();
            (host_impl, PerfStatus::Absorbed, 0)
        } else if let Some(descriptor) = output.descriptors.get(&node.id) {
            (
                descriptor.impl_name.clone(),
                PerfStatus::NotRun,
                descriptor.estimated_cost,
            )
        } else {
            continue;
        };
        perf_template.insert(
            node.name.clone(),
            PerfCounter {
                node_name: node.name.clone(),
                impl_name,
                status,
                micros: 0,
                estimated_cost,
            },
        );
    }

    let model = CompiledModel {
        inner: Arc::new(ModelInner {
            graph,
            subgraphs: output.subgraphs.into_iter().map(Arc::new).collect(),
            inputs,
            outputs,
            constants,
            perf_template,
            profiling: config.enable_profiling,
        }),
    };
    tracing::info!("{}", model.summary());
    Ok(model)
}
