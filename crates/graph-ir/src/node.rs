// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes: one operator instance with bound attributes.

use crate::{AttrValue, EdgeId, OpKind};
use std::collections::BTreeMap;

/// Index of a [`Node`] in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One operator instance in the execution graph.
///
/// Identity, operator tag, port wiring, and attributes are fixed when the
/// graph is built. Backend assignment and the selected primitive descriptor
/// are compilation results and live in the compiler's side tables, keyed by
/// [`NodeId`] — the graph itself stays read-only and shareable.
#[derive(Debug, Clone)]
pub struct Node {
    /// Arena index of this node.
    pub id: NodeId,
    /// Unique human-readable name.
    pub name: String,
    /// Operator type tag.
    pub op: OpKind,
    /// String-keyed attributes, immutable after build.
    pub attrs: BTreeMap<String, AttrValue>,
    /// Ordered input edge references.
    pub inputs: Vec<EdgeId>,
    /// Ordered output edge references.
    pub outputs: Vec<EdgeId>,
}

impl Node {
    /// Returns the node's single output edge.
    ///
    /// Every operator in the closed [`OpKind`] set produces exactly one
    /// value; this accessor reflects that without digging into `outputs`.
    pub fn output(&self) -> EdgeId {
        self.outputs[0]
    }

    /// Looks up an attribute by key.
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Returns a one-line summary for logs and graph dumps.
    pub fn summary(&self) -> String {
        format!(
            "{} '{}' ({} inputs)",
            self.op,
            self.name,
            self.inputs.len()
        )
    }
}
