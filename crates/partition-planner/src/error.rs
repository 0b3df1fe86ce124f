// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the partition planner.

/// Errors that can occur during partition planning.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// No backend in the registry can execute the node.
    ///
    /// Fatal for the graph, reported with the offending node.
    #[error("no backend can execute {op} node '{node}'")]
    UnsupportedNode { node: String, op: String },

    /// The graph has no compute nodes to schedule.
    #[error("graph contains no compute nodes")]
    NoComputeNodes,

    /// The produced plan is internally inconsistent.
    #[error("invalid partition plan: {detail}")]
    InvalidPlan { detail: String },

    /// Graph-level failure (cycle, structural defect) during planning.
    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),
}
