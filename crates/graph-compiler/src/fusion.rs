// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fusion analysis: absorbing consumers into their producing node.
//!
//! A compute node's single consumer can be bound into the node's
//! descriptor instead of compiled independently:
//! - **activation-after-compute**: `MatMul → Relu` becomes one matmul
//!   kernel with a relu post-op;
//! - **elementwise-after-compute**: `MatMul → Add` becomes one matmul
//!   kernel with a sum post-op, the addend riding as an extra input.
//!
//! Absorbed nodes are skipped during independent compilation; the host
//! writes its result directly to the last absorbed node's output edge, so
//! the intermediate tensor is never materialised.

use graph_ir::{EdgeId, Graph, NodeId, OpKind, Validated};
use kernel_select::PostOp;
use partition_planner::PartitionPlan;
use std::collections::HashMap;

/// The fused effects bound to one host node.
#[derive(Debug, Clone)]
pub struct FusionChain {
    /// Post-operations in application order.
    pub post_ops: Vec<PostOp>,
    /// Extra input edges (one per [`PostOp::Sum`]), in application order.
    pub extra_inputs: Vec<EdgeId>,
    /// The absorbed nodes, in chain order.
    pub absorbed: Vec<NodeId>,
    /// The edge the host now produces: the last absorbed node's output.
    pub final_output: EdgeId,
}

/// Fusion decisions for a whole graph.
#[derive(Debug, Default)]
pub struct FusionTable {
    /// absorbed node → its host.
    absorbed: HashMap<NodeId, NodeId>,
    /// host → its chain.
    chains: HashMap<NodeId, FusionChain>,
}

impl FusionTable {
    /// Returns `true` if `node` was absorbed into another node.
    pub fn is_absorbed(&self, node: NodeId) -> bool {
        self.absorbed.contains_key(&node)
    }

    /// Returns the host a node was absorbed into.
    pub fn host_of(&self, node: NodeId) -> Option<NodeId> {
        self.absorbed.get(&node).copied()
    }

    /// Returns the fusion chain bound to a host node.
    pub fn chain(&self, host: NodeId) -> Option<&FusionChain> {
        self.chains.get(&host)
    }

    /// Number of absorbed nodes.
    pub fn num_absorbed(&self) -> usize {
        self.absorbed.len()
    }

    /// Drops a host's fusion, restoring its absorbed nodes to independent
    /// compilation.
    ///
    /// Called when the fused descriptor finds no viable configuration;
    /// the documented precedence prefers fusion but never at the price of
    /// an uncompilable node.
    pub fn unfuse(&mut self, host: NodeId) {
        if let Some(chain) = self.chains.remove(&host) {
            for node in chain.absorbed {
                self.absorbed.remove(&node);
            }
        }
    }
}

/// Runs fusion analysis over the graph.
///
/// Only [`OpKind::MatMul`] hosts absorb; a consumer is absorbable when it
/// is the sole consumer of the host's (current) output edge, lives in the
/// same sub-request, and the edge itself is anonymous (named edges are
/// graph outputs or boundary blobs and must stay materialised). A fused
/// `Add` additionally requires its second operand to be available before
/// the host runs.
pub fn analyze(
    graph: &Graph<Validated>,
    order: &[NodeId],
    plan: &PartitionPlan,
) -> FusionTable {
    let position: HashMap<NodeId, usize> = order
        .iter()
        .enumerate()
        .map(|(i, &n)| (n, i))
        .collect();
    let subrequest_of: HashMap<NodeId, usize> = plan
        .subrequests
        .iter()
        .flat_map(|sub| sub.nodes.iter().map(move |&n| (n, sub.index)))
        .collect();

    let mut table = FusionTable::default();

    for &host in order {
        if graph.node(host).op != OpKind::MatMul || table.is_absorbed(host) {
            continue;
        }
        let Some(&host_sub) = subrequest_of.get(&host) else {
            continue;
        };

        let mut chain = FusionChain {
            post_ops: Vec::new(),
            extra_inputs: Vec::new(),
            absorbed: Vec::new(),
            final_output: graph.node(host).output(),
        };

        loop {
            let edge = graph.edge(chain.final_output);
            if edge.name.is_some() || !edge.has_single_consumer() {
                break;
            }
            let consumer = edge.consumers[0];
            if subrequest_of.get(&consumer) != Some(&host_sub)
                || table.is_absorbed(consumer)
            {
                break;
            }

            let consumer_node = graph.node(consumer);
            match consumer_node.op {
                OpKind::Relu => {
                    chain.post_ops.push(PostOp::Relu);
                }
                OpKind::Add => {
                    let Some(&other) = consumer_node
                        .inputs
                        .iter()
                        .find(|&&e| e != chain.final_output)
                    else {
                        break;
                    };
                    // The addend must exist before the host runs: its
                    // producer precedes the host, or it is a data source.
                    let producer = graph.edge(other).producer.expect("validated edge");
                    let available = !graph.node(producer).op.is_compute()
                        || position.get(&producer) < position.get(&host);
                    if !available {
                        break;
                    }
                    chain.post_ops.push(PostOp::Sum);
                    chain.extra_inputs.push(other);
                }
                _ => break,
            }

            chain.absorbed.push(consumer);
            chain.final_output = consumer_node.output();
        }

        if !chain.absorbed.is_empty() {
            tracing::debug!(
                "fusing {} node(s) into '{}'",
                chain.absorbed.len(),
                graph.node(host).name,
            );
            for &node in &chain.absorbed {
                table.absorbed.insert(node, host);
            }
            table.chains.insert(host, chain);
        }
    }

    table
}
