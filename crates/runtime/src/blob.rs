// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-request blob table.
//!
//! Edge buffers are stored behind `Arc` so concurrent sub-requests can
//! read a boundary blob while the table hands out clones cheaply; a
//! buffer is only ever written by the single step that produces it, and
//! in-place steps take the sole remaining reference out of the table
//! first.

use graph_ir::EdgeId;
use std::collections::HashMap;
use std::sync::Arc;
use tensor_core::Tensor;

/// Edge-indexed tensor storage, exclusively owned by one request.
#[derive(Debug, Default)]
pub(crate) struct BlobTable {
    buffers: HashMap<EdgeId, Arc<Tensor>>,
}

impl BlobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cheap handle to the buffer bound to `edge`.
    pub fn get(&self, edge: EdgeId) -> Option<Arc<Tensor>> {
        self.buffers.get(&edge).cloned()
    }

    /// Binds a buffer to `edge`, replacing any previous value.
    pub fn insert(&mut self, edge: EdgeId, tensor: Arc<Tensor>) {
        self.buffers.insert(edge, tensor);
    }

    /// Removes and returns the buffer bound to `edge`.
    ///
    /// Used by in-place steps, which may only target single-consumer
    /// edges — after removal nothing else can observe the buffer, so
    /// mutating it is safe.
    pub fn take(&mut self, edge: EdgeId) -> Option<Arc<Tensor>> {
        self.buffers.remove(&edge)
    }

    /// Returns `true` if `edge` currently has a bound buffer.
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.buffers.contains_key(&edge)
    }
}
