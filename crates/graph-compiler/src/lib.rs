// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-compiler
//!
//! Turns a partitioned graph into executable sub-graphs.
//!
//! Per node, in topological order:
//! 1. **Fusion** — absorb elementwise and activation consumers into their
//!    producing compute node's descriptor (the absorbed nodes are skipped
//!    during independent compilation).
//! 2. **Negotiation** — enumerate each candidate implementation's port
//!    configurations and pick the one consistent with the neighbours'
//!    selected descriptors, preferring zero conversions, then in-place
//!    reuse, then lowest estimated cost; a layout mismatch that a reorder
//!    can bridge costs one conversion and materialises a reorder node.
//! 3. **Selection** — hand the negotiated parameters to the kernel
//!    selector (naive, cached, or tuned) and bind the resulting kernel
//!    into an [`ExecStep`].
//!
//! The output is one [`CompiledSubgraph`] per sub-request: a straight-line
//! step list over edge buffers, ready for the dispatch engine.

mod compile;
mod descriptor;
mod error;
mod fusion;
mod negotiate;

pub use compile::{compile, CompileOutput, CompiledSubgraph, ExecStep};
pub use descriptor::PrimitiveDescriptor;
pub use error::CompileError;
pub use fusion::{FusionChain, FusionTable};
