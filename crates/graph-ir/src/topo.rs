// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Topological ordering of a validated graph.
//!
//! Depth-first traversal from all source nodes; a node is emitted after
//! every node producing one of its inputs, so the returned sequence runs
//! producers before consumers. The traversal visits sources in arena order
//! and successors in edge insertion order, which makes the ordering stable
//! across runs on identical input — compilation is reproducible.

use crate::{Graph, GraphError, NodeId, Validated};

/// DFS visit state per node.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Graph<Validated> {
    /// Returns all nodes in dependency order (producers before consumers).
    ///
    /// # Errors
    /// Returns [`GraphError::Cycle`] if a back-edge is detected or if any
    /// node is unreachable from the source set (which, in a graph where
    /// every edge has a producer, can only happen inside a cycle). A
    /// cyclic graph cannot be scheduled; the failure is fatal and never
    /// partial.
    pub fn topo_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.num_nodes();
        let mut marks = vec![Mark::Unvisited; n];
        let mut order = Vec::with_capacity(n);

        // Sources: nodes with no inputs (Input, Constant, and any detached
        // producer), in arena order for determinism.
        for node in self.iter_nodes() {
            if node.inputs.is_empty() {
                self.visit(node.id, &mut marks, &mut order)?;
            }
        }

        // Anything still unvisited sits on a cycle with no entry point.
        if order.len() != n {
            let stuck = self
                .iter_nodes()
                .find(|node| marks[node.id.0] == Mark::Unvisited)
                .map(|node| node.name.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle { node: stuck });
        }

        // Post-order DFS emits consumers first; reverse for producers-first.
        order.reverse();
        Ok(order)
    }

    /// Iterative DFS from `root`, pushing nodes in post-order.
    fn visit(
        &self,
        root: NodeId,
        marks: &mut [Mark],
        order: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        if marks[root.0] == Mark::Done {
            return Ok(());
        }

        // Stack frames: (node, index of the next successor to expand).
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        marks[root.0] = Mark::InProgress;

        while let Some(&mut (node, next)) = stack.last_mut() {
            let successors = self.successors(node);
            if next < successors.len() {
                let child = successors[next];
                stack.last_mut().expect("frame exists").1 += 1;
                match marks[child.0] {
                    Mark::Unvisited => {
                        marks[child.0] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        return Err(GraphError::Cycle {
                            node: self.node(child).name.clone(),
                        });
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node.0] = Mark::Done;
                order.push(node);
                stack.pop();
            }
        }

        Ok(())
    }

    /// Successor nodes of `node`: the consumers of each output edge, in
    /// output order then attachment order.
    fn successors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &edge in &self.node(node).outputs {
            for &consumer in &self.edge(edge).consumers {
                out.push(consumer);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphBuilder, OpKind};
    use tensor_core::{DType, Shape, Tensor, TensorDesc};

    fn desc(cols: usize) -> TensorDesc {
        TensorDesc::new(Shape::matrix(1, cols), DType::F32)
    }

    #[test]
    fn test_chain_order() {
        let mut b = GraphBuilder::new("chain");
        let x = b.add_input("x", desc(4));
        let (a, ea) = b.add_node("a", OpKind::Relu, &[x], desc(4));
        let (c, ec) = b.add_node("c", OpKind::Relu, &[ea], desc(4));
        b.mark_output(ec, "y");
        let g = b.build().validate().unwrap();

        let order = g.topo_order().unwrap();
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(a) < pos(c));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_producers_before_consumers() {
        // Diamond: x → (a, b) → add.
        let mut b = GraphBuilder::new("diamond");
        let x = b.add_input("x", desc(4));
        let (na, ea) = b.add_node("a", OpKind::Relu, &[x], desc(4));
        let (nb, eb) = b.add_node("b", OpKind::Softmax, &[x], desc(4));
        let (nsum, esum) = b.add_node("sum", OpKind::Add, &[ea, eb], desc(4));
        b.mark_output(esum, "y");
        let g = b.build().validate().unwrap();

        let order = g.topo_order().unwrap();
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(na) < pos(nsum));
        assert!(pos(nb) < pos(nsum));
    }

    #[test]
    fn test_stable_ordering() {
        // Two independent chains; repeated sorts must agree exactly.
        let build = || {
            let mut b = GraphBuilder::new("stable");
            let x = b.add_input("x", desc(4));
            let z = b.add_input("z", desc(4));
            let (_, ea) = b.add_node("a", OpKind::Relu, &[x], desc(4));
            let (_, eb) = b.add_node("b", OpKind::Relu, &[z], desc(4));
            b.mark_output(ea, "ya");
            b.mark_output(eb, "yb");
            b.build().validate().unwrap()
        };

        let first = build().topo_order().unwrap();
        for _ in 0..5 {
            assert_eq!(build().topo_order().unwrap(), first);
        }
    }

    #[test]
    fn test_cycle_detected() {
        // a consumes a declared edge later produced by b, and b consumes
        // a's output: a → b → a.
        let mut b = GraphBuilder::new("cyclic");
        let pending = b.declare_edge(desc(4));
        let (na, ea) = b.add_node("a", OpKind::Relu, &[pending], desc(4));
        let (nb, _) = b.add_node("b", OpKind::Relu, &[ea], desc(4));
        b.set_producer(pending, nb);
        let _ = na;
        let g = b.build().validate().unwrap();

        assert!(matches!(g.topo_order(), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_cycle_never_partially_succeeds() {
        // A valid chain plus a detached 2-cycle: the sort must fail even
        // though part of the graph is orderable.
        let mut b = GraphBuilder::new("half-cyclic");
        let x = b.add_input("x", desc(4));
        let (_, ea) = b.add_node("ok", OpKind::Relu, &[x], desc(4));
        b.mark_output(ea, "y");

        let pending = b.declare_edge(desc(4));
        let (_, ec) = b.add_node("c", OpKind::Relu, &[pending], desc(4));
        let (nd, _) = b.add_node("d", OpKind::Relu, &[ec], desc(4));
        b.set_producer(pending, nd);

        let g = b.build().validate().unwrap();
        assert!(matches!(g.topo_order(), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_constants_are_sources() {
        let mut b = GraphBuilder::new("consts");
        let x = b.add_input("x", desc(4));
        let w = b.add_constant("w", Tensor::zeros(TensorDesc::new(Shape::matrix(4, 4), DType::F32)));
        let (nm, em) = b.add_node("fc", OpKind::MatMul, &[x, w], desc(4));
        b.mark_output(em, "y");
        let g = b.build().validate().unwrap();

        let order = g.topo_order().unwrap();
        assert_eq!(order.len(), 3);
        assert_eq!(*order.last().unwrap(), nm);
    }
}
