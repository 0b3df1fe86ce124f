// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Normalised node parameters: the selection and cache key material.

use crate::CapabilityKey;
use graph_ir::OpKind;
use std::collections::BTreeMap;
use tensor_core::TensorDesc;

/// A post-operation fused into a compute node's kernel.
///
/// Fusion binds a following node's effect into the current node's
/// descriptor; the bound effects surface here so the selected kernel can
/// apply them and so the parameter hash distinguishes fused from unfused
/// nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOp {
    /// Clamp negatives after the main computation.
    Relu,
    /// Accumulate an extra input (appended after the regular ports) onto
    /// the output.
    Sum,
}

impl PostOp {
    pub fn as_str(self) -> &'static str {
        match self {
            PostOp::Relu => "relu",
            PostOp::Sum => "sum",
        }
    }
}

/// The normalised description of one node's compilation problem.
///
/// Everything selection depends on is in here: operator kind, port
/// descriptors, attributes, and fused post-ops. [`KernelParams::normalized`]
/// renders it into a canonical string whose [`crate::stable_hash`] keys the
/// tuning caches.
#[derive(Debug, Clone)]
pub struct KernelParams {
    /// Operator kind of the node being compiled.
    pub op: OpKind,
    /// Node name, for diagnostics only — not part of the normalised form,
    /// so renaming a node never invalidates its cache entry.
    pub node: String,
    /// Required input descriptors, in port order.
    pub inputs: Vec<TensorDesc>,
    /// Required output descriptors, in port order.
    pub outputs: Vec<TensorDesc>,
    /// Normalised (sorted) attribute map.
    pub attrs: BTreeMap<String, String>,
    /// Fused post-operations, in application order.
    pub post_ops: Vec<PostOp>,
}

impl KernelParams {
    /// Creates parameters with no attributes or post-ops.
    pub fn new(op: OpKind, node: impl Into<String>) -> Self {
        Self {
            op,
            node: node.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: BTreeMap::new(),
            post_ops: Vec::new(),
        }
    }

    /// The capability key this node requires: the union of every port's
    /// precision and layout.
    pub fn required_key(&self) -> CapabilityKey {
        let mut key = CapabilityKey::empty();
        for desc in self.inputs.iter().chain(self.outputs.iter()) {
            key = key.with_dtype(desc.dtype).with_layout(desc.layout);
        }
        key
    }

    /// Renders the canonical parameter string.
    ///
    /// The format is stable: operator, ports, sorted attributes, post-ops,
    /// each in a fixed order. Cache entries survive process restarts
    /// because this string (and its hash) never depends on memory
    /// addresses, map iteration order, or node naming.
    pub fn normalized(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = write!(s, "op={}", self.op);
        for (i, d) in self.inputs.iter().enumerate() {
            let _ = write!(s, "|in{i}={d}");
        }
        for (i, d) in self.outputs.iter().enumerate() {
            let _ = write!(s, "|out{i}={d}");
        }
        for (k, v) in &self.attrs {
            let _ = write!(s, "|attr:{k}={v}");
        }
        for p in &self.post_ops {
            let _ = write!(s, "|post={}", p.as_str());
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stable_hash;
    use tensor_core::{DType, Layout, Shape};

    fn params() -> KernelParams {
        let mut p = KernelParams::new(OpKind::MatMul, "fc");
        p.inputs.push(TensorDesc::new(Shape::matrix(1, 4), DType::F32));
        p.inputs.push(TensorDesc::with_layout(
            Shape::matrix(4, 4),
            DType::F32,
            Layout::ColMajor,
        ));
        p.outputs.push(TensorDesc::new(Shape::matrix(1, 4), DType::F32));
        p
    }

    #[test]
    fn test_normalized_is_deterministic() {
        assert_eq!(params().normalized(), params().normalized());
        assert_eq!(
            stable_hash(&params().normalized()),
            stable_hash(&params().normalized())
        );
    }

    #[test]
    fn test_node_name_not_in_normal_form() {
        let mut renamed = params();
        renamed.node = "other".into();
        assert_eq!(params().normalized(), renamed.normalized());
    }

    #[test]
    fn test_post_ops_change_hash() {
        let plain = params();
        let mut fused = params();
        fused.post_ops.push(PostOp::Relu);
        assert_ne!(
            stable_hash(&plain.normalized()),
            stable_hash(&fused.normalized())
        );
    }

    #[test]
    fn test_required_key_covers_ports() {
        let key = params().required_key();
        let f32_row = CapabilityKey::empty()
            .with_dtype(DType::F32)
            .with_layout(Layout::RowMajor);
        let col = CapabilityKey::empty().with_layout(Layout::ColMajor);
        assert!(key.supports(f32_row));
        assert!(key.supports(col));
    }
}
