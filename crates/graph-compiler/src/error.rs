// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph compilation.

/// Errors that abort compilation of a graph.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// No candidate produced a globally consistent descriptor for the
    /// node. Fatal for the graph, localized to compilation.
    #[error("no viable descriptor for {op} node '{node}'")]
    NoViableDescriptor { node: String, op: String },

    /// Kernel selection failed for a node with a settled descriptor.
    #[error("kernel selection failed: {0}")]
    Select(#[from] kernel_select::SelectError),

    /// Graph mutation (reorder insertion) failed.
    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),
}
