// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph edges: tensor values flowing between nodes.

use crate::NodeId;
use tensor_core::TensorDesc;

/// Index of an [`Edge`] in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct EdgeId(pub usize);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One tensor value produced by a node and consumed by zero or more others.
///
/// Producer and consumers are plain index lists rather than shared
/// pointers; the edge's lifetime is the graph's lifetime.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Arena index of this edge.
    pub id: EdgeId,
    /// Blob name, when this edge is a graph input, a graph output, or a
    /// partition boundary.
    pub name: Option<String>,
    /// The tensor descriptor produced on this edge.
    pub desc: TensorDesc,
    /// The producing node. `None` only while under construction via
    /// [`crate::GraphBuilder::declare_edge`]; validation rejects graphs
    /// with unresolved producers.
    pub producer: Option<NodeId>,
    /// The consuming nodes, in attachment order.
    pub consumers: Vec<NodeId>,
}

impl Edge {
    /// Returns `true` if exactly one node consumes this edge.
    ///
    /// In-place aliasing is only legal on single-consumer edges.
    pub fn has_single_consumer(&self) -> bool {
        self.consumers.len() == 1
    }

    /// Returns the display name: the blob name if set, the arena index
    /// otherwise.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape};

    #[test]
    fn test_single_consumer() {
        let mut e = Edge {
            id: EdgeId(0),
            name: None,
            desc: TensorDesc::new(Shape::vector(4), DType::F32),
            producer: Some(NodeId(0)),
            consumers: vec![NodeId(1)],
        };
        assert!(e.has_single_consumer());
        e.consumers.push(NodeId(2));
        assert!(!e.has_single_consumer());
    }

    #[test]
    fn test_display_name() {
        let e = Edge {
            id: EdgeId(3),
            name: Some("logits".into()),
            desc: TensorDesc::new(Shape::vector(4), DType::F32),
            producer: Some(NodeId(0)),
            consumers: vec![],
        };
        assert_eq!(e.display_name(), "logits");

        let anon = Edge { name: None, ..e };
        assert_eq!(anon.display_name(), "e3");
    }
}
