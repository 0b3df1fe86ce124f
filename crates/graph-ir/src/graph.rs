// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution graph arena and its builder.
//!
//! # Type-State Pattern
//!
//! ```text
//! GraphBuilder ── build() ──► Graph<Loaded> ── validate() ──► Graph<Validated>
//! ```
//!
//! Validation checks the structural invariants once; downstream components
//! (partitioner, negotiator) take `Graph<Validated>` and can rely on every
//! edge having exactly one producer and every index being in range.

use crate::{AttrValue, Edge, EdgeId, GraphError, Node, NodeId, OpKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tensor_core::{Tensor, TensorDesc};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been assembled but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for partitioning.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── Graph ──────────────────────────────────────────────────────────

/// The complete execution graph: node and edge arenas plus the named
/// input/output edge lists.
///
/// The generic parameter `S` encodes the validation state at compile time.
#[derive(Debug, Clone)]
pub struct Graph<S: GraphState = Loaded> {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    inputs: Vec<EdgeId>,
    outputs: Vec<EdgeId>,
    constants: HashMap<EdgeId, Tensor>,
    _state: std::marker::PhantomData<S>,
}

// ── Builder ────────────────────────────────────────────────────────

/// Incremental constructor for a [`Graph`].
///
/// The builder is the only way to create nodes and edges, which keeps the
/// arena indices consistent by construction. Structural problems (dangling
/// edges, duplicate names) are reported by [`Graph::validate`], matching
/// the loader's two-phase flow.
pub struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    inputs: Vec<EdgeId>,
    outputs: Vec<EdgeId>,
    constants: HashMap<EdgeId, Tensor>,
}

impl GraphBuilder {
    /// Creates an empty builder for a graph with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            constants: HashMap::new(),
        }
    }

    /// Adds a graph input: an [`OpKind::Input`] node producing one edge
    /// named `name`.
    pub fn add_input(&mut self, name: &str, desc: TensorDesc) -> EdgeId {
        let (_, edge) = self.push_node(
            name.to_string(),
            OpKind::Input,
            BTreeMap::new(),
            vec![],
            desc,
            Some(name.to_string()),
        );
        self.inputs.push(edge);
        edge
    }

    /// Adds a constant: an [`OpKind::Constant`] node whose value is baked
    /// into the graph and bound into every request's blob table.
    pub fn add_constant(&mut self, name: &str, value: Tensor) -> EdgeId {
        let desc = value.desc().clone();
        let (_, edge) = self.push_node(
            name.to_string(),
            OpKind::Constant,
            BTreeMap::new(),
            vec![],
            desc,
            Some(name.to_string()),
        );
        self.constants.insert(edge, value);
        edge
    }

    /// Adds an operator node consuming `inputs` and producing one edge
    /// with descriptor `out_desc`. Returns the new node and its output
    /// edge.
    pub fn add_node(
        &mut self,
        name: &str,
        op: OpKind,
        inputs: &[EdgeId],
        out_desc: TensorDesc,
    ) -> (NodeId, EdgeId) {
        self.add_node_with_attrs(name, op, inputs, out_desc, BTreeMap::new())
    }

    /// Like [`GraphBuilder::add_node`] with explicit attributes.
    pub fn add_node_with_attrs(
        &mut self,
        name: &str,
        op: OpKind,
        inputs: &[EdgeId],
        out_desc: TensorDesc,
        attrs: BTreeMap<String, AttrValue>,
    ) -> (NodeId, EdgeId) {
        self.push_node(
            name.to_string(),
            op,
            attrs,
            inputs.to_vec(),
            out_desc,
            None,
        )
    }

    /// Declares an edge with no producer yet.
    ///
    /// Used when wiring is known before the producing node exists; the
    /// producer must be bound with [`GraphBuilder::set_producer`] before
    /// validation, which rejects unresolved producers as dangling.
    pub fn declare_edge(&mut self, desc: TensorDesc) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            name: None,
            desc,
            producer: None,
            consumers: Vec::new(),
        });
        id
    }

    /// Binds `node` as the producer of a declared edge and appends the
    /// edge to the node's output list.
    pub fn set_producer(&mut self, edge: EdgeId, node: NodeId) {
        if let Some(e) = self.edges.get_mut(edge.0) {
            e.producer = Some(node);
        }
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.outputs.push(edge);
        }
    }

    /// Attaches `node` as a consumer of `edge` (appended to both sides).
    ///
    /// Normally consumers are wired by [`GraphBuilder::add_node`]; this
    /// exists for graphs assembled around declared edges.
    pub fn add_consumer(&mut self, edge: EdgeId, node: NodeId) {
        if let Some(e) = self.edges.get_mut(edge.0) {
            e.consumers.push(node);
        }
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.inputs.push(edge);
        }
    }

    /// Marks an edge as a graph output under the given blob name.
    pub fn mark_output(&mut self, edge: EdgeId, name: &str) {
        if let Some(e) = self.edges.get_mut(edge.0) {
            e.name = Some(name.to_string());
        }
        self.outputs.push(edge);
    }

    /// Consumes the builder and returns the graph in the `Loaded` state.
    pub fn build(self) -> Graph<Loaded> {
        Graph {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            inputs: self.inputs,
            outputs: self.outputs,
            constants: self.constants,
            _state: std::marker::PhantomData,
        }
    }

    fn push_node(
        &mut self,
        name: String,
        op: OpKind,
        attrs: BTreeMap<String, AttrValue>,
        inputs: Vec<EdgeId>,
        out_desc: TensorDesc,
        edge_name: Option<String>,
    ) -> (NodeId, EdgeId) {
        let node_id = NodeId(self.nodes.len());
        let edge_id = EdgeId(self.edges.len());

        for &input in &inputs {
            if let Some(e) = self.edges.get_mut(input.0) {
                e.consumers.push(node_id);
            }
        }

        self.edges.push(Edge {
            id: edge_id,
            name: edge_name,
            desc: out_desc,
            producer: Some(node_id),
            consumers: Vec::new(),
        });
        self.nodes.push(Node {
            id: node_id,
            name,
            op,
            attrs,
            inputs,
            outputs: vec![edge_id],
        });

        (node_id, edge_id)
    }
}

// ── Loaded state ───────────────────────────────────────────────────

impl Graph<Loaded> {
    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph is non-empty.
    /// - Every edge has a producer and every referenced index is in range.
    /// - Node and blob names are unique.
    /// - No edge descriptor has zero elements.
    /// - Input/output lists reference named edges.
    pub fn validate(self) -> Result<Graph<Validated>, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(GraphError::DuplicateName {
                    name: node.name.clone(),
                });
            }
            for &edge in node.inputs.iter().chain(node.outputs.iter()) {
                if edge.0 >= self.edges.len() {
                    return Err(GraphError::UnknownEdge {
                        node: node.name.clone(),
                        edge: edge.0,
                    });
                }
            }
            match node.op {
                OpKind::MatMul | OpKind::Add | OpKind::Mul => {
                    if node.inputs.len() != 2 {
                        return Err(GraphError::InvalidNode {
                            node: node.name.clone(),
                            detail: format!(
                                "{} expects 2 inputs, got {}",
                                node.op,
                                node.inputs.len()
                            ),
                        });
                    }
                }
                OpKind::Relu | OpKind::Softmax | OpKind::Reorder => {
                    if node.inputs.len() != 1 {
                        return Err(GraphError::InvalidNode {
                            node: node.name.clone(),
                            detail: format!(
                                "{} expects 1 input, got {}",
                                node.op,
                                node.inputs.len()
                            ),
                        });
                    }
                }
                OpKind::Concat => {
                    if node.inputs.is_empty() {
                        return Err(GraphError::InvalidNode {
                            node: node.name.clone(),
                            detail: "concat expects at least 1 input".into(),
                        });
                    }
                }
                OpKind::Input | OpKind::Constant => {
                    if !node.inputs.is_empty() {
                        return Err(GraphError::InvalidNode {
                            node: node.name.clone(),
                            detail: format!("{} takes no inputs", node.op),
                        });
                    }
                }
            }
        }

        for edge in &self.edges {
            if edge.producer.is_none() {
                return Err(GraphError::DanglingEdge {
                    edge: edge.display_name(),
                });
            }
            if edge.desc.shape.num_elements() == 0 {
                return Err(GraphError::InvalidNode {
                    node: edge.display_name(),
                    detail: "edge descriptor has zero elements".into(),
                });
            }
        }

        tracing::debug!(
            "graph '{}' validated: {} nodes, {} edges",
            self.name,
            self.nodes.len(),
            self.edges.len(),
        );

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            inputs: self.inputs,
            outputs: self.outputs,
            constants: self.constants,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl Graph<Validated> {
    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Returns a node by id.
    ///
    /// # Panics
    /// Panics on an out-of-range id; ids handed out by this graph are
    /// always valid.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns an edge by id.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    /// Iterates over all nodes in arena order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Iterates over all edges in arena order.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Returns the graph input edges in declaration order.
    pub fn inputs(&self) -> &[EdgeId] {
        &self.inputs
    }

    /// Returns the graph output edges in declaration order.
    pub fn outputs(&self) -> &[EdgeId] {
        &self.outputs
    }

    /// Returns the constant value bound to an edge, if any.
    pub fn constant(&self, edge: EdgeId) -> Option<&Tensor> {
        self.constants.get(&edge)
    }

    /// Looks up a named edge (graph input, output, or boundary blob).
    pub fn edge_by_name(&self, name: &str) -> Option<EdgeId> {
        self.edges
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .map(|e| e.id)
    }

    /// Looks up a node by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Inserts a reorder node between `edge` and one of its consumers.
    ///
    /// The consumer's input slot is rewired to a fresh edge with
    /// descriptor `target`, produced by a new [`OpKind::Reorder`] node
    /// consuming `edge`. Every-edge-one-producer is preserved. Returns the
    /// new node and edge.
    ///
    /// This is the only mutation a validated graph supports; the
    /// partitioner uses it for cross-backend copies and the negotiator for
    /// layout conversions.
    pub fn insert_reorder(
        &mut self,
        edge: EdgeId,
        consumer: NodeId,
        target: TensorDesc,
        tag: &str,
    ) -> Result<(NodeId, EdgeId), GraphError> {
        let consumer_name = self.nodes[consumer.0].name.clone();
        let source_name = self.edges[edge.0].display_name();
        if !self.edges[edge.0].consumers.contains(&consumer) {
            return Err(GraphError::InvalidNode {
                node: consumer_name,
                detail: format!("not a consumer of edge '{source_name}'"),
            });
        }

        let node_id = NodeId(self.nodes.len());
        let edge_id = EdgeId(self.edges.len());
        let reorder_name = format!("{source_name}/{tag}/{consumer_name}");

        self.edges.push(Edge {
            id: edge_id,
            name: None,
            desc: target,
            producer: Some(node_id),
            consumers: vec![consumer],
        });
        self.nodes.push(Node {
            id: node_id,
            name: reorder_name,
            op: OpKind::Reorder,
            attrs: BTreeMap::new(),
            inputs: vec![edge],
            outputs: vec![edge_id],
        });

        // Rewire: the original edge now feeds the reorder node instead of
        // the consumer; the consumer reads the reordered edge.
        let e = &mut self.edges[edge.0];
        for c in e.consumers.iter_mut() {
            if *c == consumer {
                *c = node_id;
            }
        }
        for input in self.nodes[consumer.0].inputs.iter_mut() {
            if *input == edge {
                *input = edge_id;
            }
        }

        tracing::debug!(
            "inserted reorder {} between '{}' and '{}'",
            edge_id,
            source_name,
            self.nodes[consumer.0].name,
        );

        Ok((node_id, edge_id))
    }

    /// Names an edge, making it addressable as a blob.
    ///
    /// Used by the partitioner when an internal edge becomes a boundary.
    pub fn name_edge(&mut self, edge: EdgeId, name: impl Into<String>) {
        self.edges[edge.0].name = Some(name.into());
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "Graph '{}': {} nodes, {} edges, {} inputs, {} outputs",
            self.name,
            self.nodes.len(),
            self.edges.len(),
            self.inputs.len(),
            self.outputs.len(),
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> Graph<S> {
    /// Returns the graph name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: GraphState> fmt::Display for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape};

    fn f32_desc(rows: usize, cols: usize) -> TensorDesc {
        TensorDesc::new(Shape::matrix(rows, cols), DType::F32)
    }

    /// in → matmul(w) → relu → out
    fn small_graph() -> Graph<Validated> {
        let mut b = GraphBuilder::new("small");
        let x = b.add_input("x", f32_desc(1, 4));
        let w = b.add_constant(
            "w",
            Tensor::zeros(f32_desc(4, 4)),
        );
        let (_, mm) = b.add_node("fc", OpKind::MatMul, &[x, w], f32_desc(1, 4));
        let (_, act) = b.add_node("act", OpKind::Relu, &[mm], f32_desc(1, 4));
        b.mark_output(act, "y");
        b.build().validate().unwrap()
    }

    #[test]
    fn test_build_and_validate() {
        let g = small_graph();
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.inputs().len(), 1);
        assert_eq!(g.outputs().len(), 1);
    }

    #[test]
    fn test_validate_empty() {
        let g = GraphBuilder::new("empty").build();
        assert!(matches!(g.validate(), Err(GraphError::EmptyGraph)));
    }

    #[test]
    fn test_validate_dangling_edge() {
        let mut b = GraphBuilder::new("dangling");
        let x = b.add_input("x", f32_desc(1, 4));
        let pending = b.declare_edge(f32_desc(1, 4));
        let (_, out) = b.add_node("add", OpKind::Add, &[x, pending], f32_desc(1, 4));
        b.mark_output(out, "y");
        // `pending` never got a producer.
        assert!(matches!(
            b.build().validate(),
            Err(GraphError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_validate_duplicate_name() {
        let mut b = GraphBuilder::new("dup");
        let x = b.add_input("x", f32_desc(1, 4));
        let (_, out) = b.add_node("x", OpKind::Relu, &[x], f32_desc(1, 4));
        b.mark_output(out, "y");
        assert!(matches!(
            b.build().validate(),
            Err(GraphError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_validate_wrong_arity() {
        let mut b = GraphBuilder::new("arity");
        let x = b.add_input("x", f32_desc(1, 4));
        let (_, out) = b.add_node("fc", OpKind::MatMul, &[x], f32_desc(1, 4));
        b.mark_output(out, "y");
        assert!(matches!(
            b.build().validate(),
            Err(GraphError::InvalidNode { .. })
        ));
    }

    #[test]
    fn test_validate_zero_elements() {
        let mut b = GraphBuilder::new("zero");
        let x = b.add_input("x", TensorDesc::new(Shape::matrix(0, 4), DType::F32));
        b.mark_output(x, "y");
        assert!(b.build().validate().is_err());
    }

    #[test]
    fn test_edge_lookup_by_name() {
        let g = small_graph();
        assert!(g.edge_by_name("x").is_some());
        assert!(g.edge_by_name("y").is_some());
        assert!(g.edge_by_name("bogus").is_none());
    }

    #[test]
    fn test_consumer_wiring() {
        let g = small_graph();
        let x = g.edge_by_name("x").unwrap();
        let fc = g.node_by_name("fc").unwrap();
        assert_eq!(g.edge(x).consumers, vec![fc]);
        assert_eq!(g.edge(x).producer, Some(g.node_by_name("x").unwrap()));
    }

    #[test]
    fn test_insert_reorder_rewires() {
        let mut g = small_graph();
        let x = g.edge_by_name("x").unwrap();
        let fc = g.node_by_name("fc").unwrap();

        let target = g.edge(x).desc.reordered(tensor_core::Layout::ColMajor);
        let (rid, new_edge) = g.insert_reorder(x, fc, target, "reorder").unwrap();

        // The original edge now feeds the reorder node only.
        assert_eq!(g.edge(x).consumers, vec![rid]);
        // The consumer reads the new edge.
        assert_eq!(g.node(fc).inputs[0], new_edge);
        assert_eq!(g.edge(new_edge).producer, Some(rid));
        assert_eq!(g.edge(new_edge).consumers, vec![fc]);
        assert_eq!(g.node(rid).op, OpKind::Reorder);
    }

    #[test]
    fn test_insert_reorder_non_consumer_rejected() {
        let mut g = small_graph();
        let y = g.edge_by_name("y").unwrap();
        let fc = g.node_by_name("fc").unwrap();
        let target = g.edge(y).desc.clone();
        assert!(g.insert_reorder(y, fc, target, "reorder").is_err());
    }

    #[test]
    fn test_constant_storage() {
        let g = small_graph();
        let w = g.edge_by_name("w").unwrap();
        assert!(g.constant(w).is_some());
        let x = g.edge_by_name("x").unwrap();
        assert!(g.constant(x).is_none());
    }

    #[test]
    fn test_summary_and_display() {
        let g = small_graph();
        assert!(g.summary().contains("small"));
        assert!(g.summary().contains("4 nodes"));
        let display = format!("{g}");
        assert!(display.contains("fc"));
        assert!(display.contains("act"));
    }
}
