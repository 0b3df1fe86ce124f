// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The in-memory execution graph: an arena of [`Node`] and [`Edge`] records
//! addressed by index, built once from externally supplied node specs and
//! immutable afterwards (compilation annotates it through side tables and
//! controlled reorder insertion, never by rewriting attributes).
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! Graph<Loaded>     — nodes and edges assembled, not yet checked.
//!       │  .validate()
//!       ▼
//! Graph<Validated>  — structure verified, ready for partitioning.
//! ```
//!
//! The transition consumes the old state and returns the new one, so there
//! is zero runtime cost — the marker types are `PhantomData` (ZST). The
//! partitioner and compiler only accept `Graph<Validated>`.
//!
//! # Arena Edges
//!
//! Edges are shared between one producer and many consumers. Rather than
//! reference-counted links with back-pointers, both directions are plain
//! index lists into the arenas, which keeps the graph `Send + Sync` and
//! free of reference cycles.

mod attr;
mod edge;
mod error;
mod graph;
mod node;
mod op;
mod spec;
mod topo;

pub use attr::AttrValue;
pub use edge::{Edge, EdgeId};
pub use error::GraphError;
pub use graph::{Graph, GraphBuilder, GraphState, Loaded, Validated};
pub use node::{Node, NodeId};
pub use op::OpKind;
pub use spec::{ConstantSpec, GraphSpec, InputSpec, NodeSpec};
