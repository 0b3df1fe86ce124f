// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel selection and execution.

use crate::BackendId;

/// A single candidate failed to produce kernel data.
///
/// This is the expected, *recovered* error of the selection loop: the
/// selector logs it and excludes the candidate. It never aborts
/// compilation on its own.
#[derive(Debug, thiserror::Error)]
#[error("kernel candidate not applicable: {0}")]
pub struct KernelAttemptError(pub String);

/// Errors raised while executing a built kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The kernel does not implement the in-place entry point.
    #[error("kernel does not support in-place execution")]
    InPlaceUnsupported,

    /// A tensor operation inside the kernel failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    /// The kernel received an argument list it cannot interpret.
    #[error("kernel invocation error: {0}")]
    Invocation(String),
}

/// Errors that abort selection for a node.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// No candidate implementation produced usable kernel data.
    #[error("no usable kernel for {op} node '{node}'")]
    NoKernel { node: String, op: String },

    /// The referenced backend is not registered.
    #[error("unknown backend {0:?}")]
    UnknownBackend(BackendId),

    /// Reading or appending the offline cache file failed.
    #[error("tuning cache I/O: {0}")]
    CacheIo(#[from] std::io::Error),
}
