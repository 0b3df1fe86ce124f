// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The partitioning pass.
//!
//! Walks the graph in topological order, groups contiguous runs of
//! same-backend compute nodes into sub-requests, and materialises an
//! explicit copy node (an [`OpKind::Reorder`]) wherever a consumer's
//! backend differs from its producer's. Copies execute on the consumer's
//! backend, so a sub-request never reads memory another backend is still
//! producing.

use crate::{BackendPolicy, BoundaryBlob, PartitionPlan, PlannerError, SubRequestPlan};
use graph_ir::{EdgeId, Graph, NodeId, OpKind, Validated};
use kernel_select::{BackendId, ImplRegistry};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Splits `graph` into backend-homogeneous sub-requests.
///
/// Takes the graph by value: boundary copies are inserted into it, and
/// the annotated graph is returned alongside the plan. The graph and plan
/// together are the compiler's input.
///
/// # Errors
/// [`PlannerError::UnsupportedNode`] when the policy finds no backend for
/// a node; [`PlannerError::NoComputeNodes`] for a graph of pure data
/// sources; graph errors (cycles) pass through.
pub fn partition(
    mut graph: Graph<Validated>,
    policy: &dyn BackendPolicy,
    registry: &ImplRegistry,
) -> Result<(Graph<Validated>, PartitionPlan), PlannerError> {
    let order = graph.topo_order()?;

    // ── Assign backends to compute nodes ───────────────────────────
    let mut assignments: HashMap<NodeId, BackendId> = HashMap::new();
    for &node_id in &order {
        let node = graph.node(node_id);
        if !node.op.is_compute() {
            continue;
        }
        let backend = policy.assign(node, registry).ok_or_else(|| {
            PlannerError::UnsupportedNode {
                node: node.name.clone(),
                op: node.op.to_string(),
            }
        })?;
        assignments.insert(node_id, backend);
    }

    // ── Group contiguous same-backend runs ─────────────────────────
    let mut groups: Vec<(BackendId, Vec<NodeId>)> = Vec::new();
    let mut subrequest_of: HashMap<NodeId, usize> = HashMap::new();
    for &node_id in &order {
        let Some(&backend) = assignments.get(&node_id) else {
            continue;
        };
        match groups.last_mut() {
            Some((current, nodes)) if *current == backend => nodes.push(node_id),
            _ => groups.push((backend, vec![node_id])),
        }
        subrequest_of.insert(node_id, groups.len() - 1);
    }
    if groups.is_empty() {
        return Err(PlannerError::NoComputeNodes);
    }

    // ── Find crossing edges ────────────────────────────────────────
    // (edge, producing sub-request, consumer node, consuming sub-request)
    let mut crossings: Vec<(EdgeId, usize, NodeId, usize)> = Vec::new();
    for (&node_id, &sub) in &subrequest_of {
        for &edge_id in &graph.node(node_id).outputs {
            for &consumer in &graph.edge(edge_id).consumers {
                if let Some(&consumer_sub) = subrequest_of.get(&consumer) {
                    if consumer_sub != sub {
                        crossings.push((edge_id, sub, consumer, consumer_sub));
                    }
                }
            }
        }
    }
    // HashMap iteration order is arbitrary; sort for reproducible copy
    // names and boundary tables.
    crossings.sort_by_key(|&(edge, _, consumer, _)| (edge, consumer));

    // ── Materialise boundary copies ────────────────────────────────
    let mut boundaries: BTreeMap<EdgeId, (String, usize, BTreeSet<usize>)> = BTreeMap::new();
    let mut num_copy_nodes = 0usize;
    for (edge_id, producer_sub, consumer, consumer_sub) in crossings {
        // Boundary blobs must be addressable by name.
        if graph.edge(edge_id).name.is_none() {
            let producer_node = graph.edge(edge_id).producer.expect("validated edge");
            let name = format!("{}:out", graph.node(producer_node).name);
            graph.name_edge(edge_id, name);
        }
        let name = graph.edge(edge_id).display_name();

        let desc = graph.edge(edge_id).desc.clone();
        let (copy_node, _) = graph.insert_reorder(edge_id, consumer, desc, "copy")?;
        num_copy_nodes += 1;

        // The copy runs on the consumer's backend, scheduled just before
        // its consumer.
        let backend = groups[consumer_sub].0;
        assignments.insert(copy_node, backend);
        subrequest_of.insert(copy_node, consumer_sub);
        let nodes = &mut groups[consumer_sub].1;
        let position = nodes
            .iter()
            .position(|&n| n == consumer)
            .unwrap_or(nodes.len());
        nodes.insert(position, copy_node);

        boundaries
            .entry(edge_id)
            .or_insert_with(|| (name, producer_sub, BTreeSet::new()))
            .2
            .insert(consumer_sub);
    }

    // ── Assign data-source nodes ───────────────────────────────────
    // Inputs and constants execute nowhere, but every node carries a
    // backend; they inherit the first consuming sub-request's backend.
    for node in graph.iter_nodes() {
        if node.op.is_compute() {
            continue;
        }
        let backend = node
            .outputs
            .iter()
            .flat_map(|&e| graph.edge(e).consumers.iter())
            .find_map(|c| assignments.get(c).copied())
            .unwrap_or(groups[0].0);
        assignments.insert(node.id, backend);
    }

    // ── Blob ownership and dependencies ────────────────────────────
    let boundary_names: HashMap<EdgeId, &str> = boundaries
        .iter()
        .map(|(&edge, (name, _, _))| (edge, name.as_str()))
        .collect();
    let graph_outputs: BTreeSet<EdgeId> = graph.outputs().iter().copied().collect();

    let mut subrequests = Vec::with_capacity(groups.len());
    for (index, (backend, nodes)) in groups.iter().enumerate() {
        let mut input_names = BTreeSet::new();
        let mut output_names = BTreeSet::new();
        let mut depends_on = BTreeSet::new();

        for &node_id in nodes {
            for &input in &graph.node(node_id).inputs {
                let edge = graph.edge(input);
                let producer = edge.producer.expect("validated edge");
                if !graph.node(producer).op.is_compute() {
                    // Graph input or constant.
                    input_names.insert(edge.display_name());
                } else if let Some(&producer_sub) = subrequest_of.get(&producer) {
                    if producer_sub != index {
                        if let Some(name) = boundary_names.get(&input) {
                            input_names.insert((*name).to_string());
                        }
                        depends_on.insert(producer_sub);
                    }
                }
            }
            for &output in &graph.node(node_id).outputs {
                if graph_outputs.contains(&output) {
                    output_names.insert(graph.edge(output).display_name());
                }
                if let Some(name) = boundary_names.get(&output) {
                    output_names.insert((*name).to_string());
                }
            }
        }

        subrequests.push(SubRequestPlan {
            index,
            backend: *backend,
            nodes: nodes.clone(),
            input_names,
            output_names,
            depends_on: depends_on.into_iter().collect(),
        });
    }

    let plan = PartitionPlan {
        policy_name: policy.name().to_string(),
        subrequests,
        boundaries: boundaries
            .into_iter()
            .map(|(edge, (name, producer, consumers))| BoundaryBlob {
                name,
                edge,
                producer,
                consumers: consumers.into_iter().collect(),
            })
            .collect(),
        assignments,
        num_copy_nodes,
    };
    plan.validate()?;
    tracing::info!("{}", plan.summary());

    Ok((graph, plan))
}
