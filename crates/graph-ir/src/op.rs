// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The closed set of operator kinds.

/// Operator type tag of a [`crate::Node`].
///
/// The set is closed: dispatch resolves a concrete implementation once at
/// compile time and stores a direct handle, so no open-ended registry of
/// operator types (or downcast chain) is needed at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// A graph input placeholder. Produces one edge, consumes nothing.
    Input,
    /// A constant value (weights, folded data) baked into the graph.
    Constant,
    /// 2-D matrix multiplication.
    MatMul,
    /// Elementwise addition.
    Add,
    /// Elementwise multiplication.
    Mul,
    /// Rectified linear activation.
    Relu,
    /// Row-wise softmax over the last dimension.
    Softmax,
    /// Concatenation along the last axis.
    Concat,
    /// Layout conversion, materialised by the partitioner at backend
    /// boundaries and by the negotiator between incompatible descriptors.
    Reorder,
}

impl OpKind {
    /// Returns a human-readable label for this operator kind.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Input => "input",
            OpKind::Constant => "constant",
            OpKind::MatMul => "matmul",
            OpKind::Add => "add",
            OpKind::Mul => "mul",
            OpKind::Relu => "relu",
            OpKind::Softmax => "softmax",
            OpKind::Concat => "concat",
            OpKind::Reorder => "reorder",
        }
    }

    /// Returns `true` for kinds that execute a kernel, as opposed to the
    /// data-source kinds ([`OpKind::Input`], [`OpKind::Constant`]) whose
    /// values are bound before execution starts.
    pub fn is_compute(self) -> bool {
        !matches!(self, OpKind::Input | OpKind::Constant)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
