// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the runtime.

/// Errors that can occur while compiling a model or driving a request.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `start()` was called on a request that is not idle. The caller may
    /// retry later; concurrent starts are rejected, never queued.
    #[error("request is busy")]
    RequestBusy,

    /// `start()` requires a running tokio runtime to spawn onto.
    #[error("no tokio runtime available on this thread")]
    NoRuntime,

    /// The named blob does not exist on this model.
    #[error("unknown blob '{name}'")]
    UnknownBlob { name: String },

    /// A blob was bound with an incompatible descriptor.
    #[error("blob '{name}' mismatch: {detail}")]
    BlobMismatch { name: String, detail: String },

    /// The blob exists but holds no value yet (output read before a run).
    #[error("blob '{name}' has not been produced yet")]
    BlobNotReady { name: String },

    /// A buffer referenced by a compiled step was absent at execution.
    #[error("missing buffer for edge {edge} at node '{node}'")]
    MissingBuffer { node: String, edge: String },

    /// A kernel failed during sub-request execution.
    #[error("execution failed at node '{node}': {detail}")]
    Execution { node: String, detail: String },

    /// Partition planning failed.
    #[error("planner error: {0}")]
    Planner(#[from] partition_planner::PlannerError),

    /// Graph compilation failed.
    #[error("compile error: {0}")]
    Compile(#[from] graph_compiler::CompileError),

    /// Kernel selection or tuning-cache I/O failed.
    #[error("selection error: {0}")]
    Select(#[from] kernel_select::SelectError),

    /// Graph construction or validation failed.
    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
