// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Descriptor negotiation.
//!
//! Walks compute nodes in topological order and fixes, per node, the
//! input/output configuration it will execute with. An input config is
//! compatible with the producer's selected output config when precision
//! and layout match exactly; a layout difference that a reorder can bridge
//! costs one conversion and materialises a reorder node between the two.
//!
//! Candidate preference, in order:
//! 1. fewest required conversions (zero preferred),
//! 2. in-place reuse of an input buffer,
//! 3. lowest estimated cost,
//! 4. registration order.
//!
//! Fusion is decided before negotiation and preferred; when a fused node
//! finds no viable configuration it is unfused and retried before the
//! failure becomes fatal.

use crate::{CompileError, FusionTable, PrimitiveDescriptor};
use graph_ir::{EdgeId, Graph, NodeId, OpKind, Validated};
use kernel_select::{CandidateImpl as _, ImplRegistry, KernelParams};
use partition_planner::PartitionPlan;
use std::collections::HashMap;
use tensor_core::{DataConfig, TensorDesc};

/// Everything negotiation settles, keyed by node.
#[derive(Debug, Default)]
pub(crate) struct Negotiation {
    /// The selected descriptor per compiled node.
    pub descriptors: HashMap<NodeId, PrimitiveDescriptor>,
    /// Final kernel parameters per compiled node (the cache key material).
    pub params: HashMap<NodeId, KernelParams>,
    /// Input edges per node after fusion and reorder insertion.
    pub effective_inputs: HashMap<NodeId, Vec<EdgeId>>,
    /// Output edge per node after fusion.
    pub effective_output: HashMap<NodeId, EdgeId>,
}

/// One viable candidate configuration found for a node.
struct Selected {
    impl_name: String,
    inputs: Vec<DataConfig>,
    output: DataConfig,
    /// `(port, edge, required desc)` for every port needing a reorder.
    conversions: Vec<(usize, EdgeId, TensorDesc)>,
    estimated_cost: u64,
}

pub(crate) fn negotiate(
    graph: &mut Graph<Validated>,
    plan: &mut PartitionPlan,
    registry: &ImplRegistry,
    fusion: &mut FusionTable,
) -> Result<Negotiation, CompileError> {
    let order = graph.topo_order()?;
    let mut subrequest_of: HashMap<NodeId, usize> = plan
        .subrequests
        .iter()
        .flat_map(|sub| sub.nodes.iter().map(move |&n| (n, sub.index)))
        .collect();

    // Selected descriptor of every edge; unlisted edges keep their
    // declared descriptor (data sources are always as declared).
    let mut negotiated: HashMap<EdgeId, TensorDesc> = HashMap::new();
    let mut result = Negotiation::default();

    for &node_id in &order {
        if !graph.node(node_id).op.is_compute() || fusion.is_absorbed(node_id) {
            continue;
        }

        let selected = loop {
            match try_negotiate(graph, registry, fusion, plan, &negotiated, node_id) {
                Some(selected) => break selected,
                None if fusion.chain(node_id).is_some() => {
                    // The fused descriptor found no viable configuration;
                    // retry unfused before failing the node.
                    tracing::debug!(
                        "node '{}': fused negotiation failed, retrying unfused",
                        graph.node(node_id).name,
                    );
                    fusion.unfuse(node_id);
                }
                None => {
                    let node = graph.node(node_id);
                    return Err(CompileError::NoViableDescriptor {
                        node: node.name.clone(),
                        op: node.op.to_string(),
                    });
                }
            }
        };

        apply_selection(
            graph,
            plan,
            &mut subrequest_of,
            &mut negotiated,
            &mut result,
            fusion,
            node_id,
            selected,
        )?;
    }

    Ok(result)
}

/// Enumerates candidates for one node and returns the best viable
/// configuration, or `None`.
fn try_negotiate(
    graph: &Graph<Validated>,
    registry: &ImplRegistry,
    fusion: &FusionTable,
    plan: &PartitionPlan,
    negotiated: &HashMap<EdgeId, TensorDesc>,
    node_id: NodeId,
) -> Option<Selected> {
    let node = graph.node(node_id);
    let backend = *plan.assignments.get(&node_id)?;

    let (inputs, output_edge, post_ops) = match fusion.chain(node_id) {
        Some(chain) => {
            let mut inputs = node.inputs.clone();
            inputs.extend(chain.extra_inputs.iter().copied());
            (inputs, chain.final_output, chain.post_ops.clone())
        }
        None => (node.inputs.clone(), node.output(), Vec::new()),
    };

    let edge_desc = |edge: EdgeId| -> TensorDesc {
        negotiated
            .get(&edge)
            .cloned()
            .unwrap_or_else(|| graph.edge(edge).desc.clone())
    };

    let declared_output = graph.edge(output_edge).desc.clone();
    // Named edges are graph outputs or boundary blobs: their memory
    // contract is fixed, a candidate may not restate it.
    let output_locked = graph.edge(output_edge).name.is_some();

    let mut params = KernelParams::new(node.op, node.name.clone());
    params.inputs = inputs.iter().map(|&e| edge_desc(e)).collect();
    params.outputs = vec![declared_output.clone()];
    params.attrs = node
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    params.post_ops = post_ops;

    // (conversions, no-in-place, cost, registration index) — minimised
    // lexicographically.
    let mut best: Option<(Selected, (usize, usize, u64, usize))> = None;

    for (index, candidate) in registry.candidates(backend, node.op).iter().enumerate() {
        for config in candidate.supported_configs(&params) {
            if config.inputs.len() != inputs.len() || config.outputs.len() != 1 {
                continue;
            }
            let out_config = &config.outputs[0];
            if out_config.desc.shape != declared_output.shape
                || out_config.desc.dtype != declared_output.dtype
            {
                continue;
            }
            if output_locked && out_config.desc != declared_output {
                continue;
            }

            // Conversion accounting per input port.
            let mut conversions = Vec::new();
            let mut feasible = true;
            for (port, (&edge, required)) in
                inputs.iter().zip(config.inputs.iter()).enumerate()
            {
                let current = edge_desc(edge);
                if current == required.desc {
                    continue;
                }
                if current.reorderable_to(&required.desc) {
                    conversions.push((port, edge, required.desc.clone()));
                } else {
                    feasible = false;
                    break;
                }
            }
            if !feasible {
                continue;
            }

            // In-place aliasing is only legal when the aliased input is
            // single-consumer, produced by a compute node, not a named
            // blob, and not itself being reordered.
            let mut in_place = out_config.in_place;
            if let Some(target) = in_place {
                let legal = inputs.get(target).is_some_and(|&edge| {
                    let record = graph.edge(edge);
                    record.has_single_consumer()
                        && record.name.is_none()
                        && record
                            .producer
                            .map(|p| graph.node(p).op.is_compute())
                            .unwrap_or(false)
                        && !conversions.iter().any(|(port, _, _)| *port == target)
                });
                if !legal {
                    in_place = None;
                }
            }

            let cost = candidate.estimated_cost(&params);
            let score = (
                conversions.len(),
                usize::from(in_place.is_none()),
                cost,
                index,
            );
            let better = best.as_ref().map(|(_, s)| score < *s).unwrap_or(true);
            if better {
                let mut output = out_config.clone();
                output.in_place = in_place;
                best = Some((
                    Selected {
                        impl_name: candidate.name().to_string(),
                        inputs: config.inputs.clone(),
                        output,
                        conversions,
                        estimated_cost: cost,
                    },
                    score,
                ));
            }
        }
    }

    best.map(|(selected, _)| selected)
}

/// Applies a selection: inserts the required reorders, records the
/// descriptor, and publishes the output's negotiated contract.
#[allow(clippy::too_many_arguments)]
fn apply_selection(
    graph: &mut Graph<Validated>,
    plan: &mut PartitionPlan,
    subrequest_of: &mut HashMap<NodeId, usize>,
    negotiated: &mut HashMap<EdgeId, TensorDesc>,
    result: &mut Negotiation,
    fusion: &FusionTable,
    node_id: NodeId,
    selected: Selected,
) -> Result<(), CompileError> {
    let sub_index = *subrequest_of
        .get(&node_id)
        .expect("compute node belongs to a sub-request");

    let (mut inputs, output_edge) = match fusion.chain(node_id) {
        Some(chain) => {
            let mut inputs = graph.node(node_id).inputs.clone();
            inputs.extend(chain.extra_inputs.iter().copied());
            (inputs, chain.final_output)
        }
        None => (graph.node(node_id).inputs.clone(), graph.node(node_id).output()),
    };

    for (port, edge, target) in &selected.conversions {
        let source_desc = negotiated
            .get(edge)
            .cloned()
            .unwrap_or_else(|| graph.edge(*edge).desc.clone());

        // Fused extra inputs are not wired as graph inputs of this node;
        // reorder insertion needs the actual consumer.
        let consumer = if graph.edge(*edge).consumers.contains(&node_id) {
            node_id
        } else {
            fusion
                .chain(node_id)
                .and_then(|chain| {
                    chain
                        .absorbed
                        .iter()
                        .copied()
                        .find(|&a| graph.edge(*edge).consumers.contains(&a))
                })
                .unwrap_or(node_id)
        };

        let (reorder_node, new_edge) =
            graph.insert_reorder(*edge, consumer, target.clone(), "reorder")?;
        negotiated.insert(new_edge, target.clone());

        // Schedule the reorder just before this node in its sub-request.
        let backend = plan.subrequests[sub_index].backend;
        plan.assignments.insert(reorder_node, backend);
        subrequest_of.insert(reorder_node, sub_index);
        let nodes = &mut plan.subrequests[sub_index].nodes;
        let position = nodes
            .iter()
            .position(|&n| n == node_id)
            .unwrap_or(nodes.len());
        nodes.insert(position, reorder_node);

        // The reorder's own contract is trivial: declared in, target out.
        let mut reorder_params =
            KernelParams::new(OpKind::Reorder, graph.node(reorder_node).name.clone());
        reorder_params.inputs = vec![source_desc.clone()];
        reorder_params.outputs = vec![target.clone()];
        result.params.insert(reorder_node, reorder_params);
        result.descriptors.insert(
            reorder_node,
            PrimitiveDescriptor {
                impl_name: String::new(),
                inputs: vec![DataConfig::plain(source_desc)],
                outputs: vec![DataConfig::plain(target.clone())],
                estimated_cost: target.shape.num_elements() as u64,
                post_ops: Vec::new(),
            },
        );
        result
            .effective_inputs
            .insert(reorder_node, vec![*edge]);
        result.effective_output.insert(reorder_node, new_edge);

        inputs[*port] = new_edge;
    }

    negotiated.insert(output_edge, selected.output.desc.clone());

    let mut params = KernelParams::new(graph.node(node_id).op, graph.node(node_id).name.clone());
    params.inputs = selected.inputs.iter().map(|c| c.desc.clone()).collect();
    params.outputs = vec![selected.output.desc.clone()];
    params.attrs = graph
        .node(node_id)
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    params.post_ops = fusion
        .chain(node_id)
        .map(|c| c.post_ops.clone())
        .unwrap_or_default();

    tracing::debug!(
        "node '{}': descriptor {} ({} conversions, in_place={:?})",
        graph.node(node_id).name,
        selected.impl_name,
        selected.conversions.len(),
        selected.output.in_place,
    );

    result.descriptors.insert(
        node_id,
        PrimitiveDescriptor {
            impl_name: selected.impl_name,
            inputs: selected.inputs,
            outputs: vec![selected.output],
            estimated_cost: selected.estimated_cost,
            post_ops: params.post_ops.clone(),
        },
    );
    result.params.insert(node_id, params);
    result.effective_inputs.insert(node_id, inputs);
    result.effective_output.insert(node_id, output_edge);

    Ok(())
}
