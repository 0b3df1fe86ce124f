// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor descriptors and reference numeric kernels for the heterogeneous
//! inference runtime.
//!
//! This crate provides:
//! - [`DType`] — supported element precisions (f32, f16, bf16, i8).
//! - [`Layout`] — physical memory layouts ([`Layout::RowMajor`],
//!   [`Layout::ColMajor`]) that the descriptor negotiator matches between
//!   producers and consumers.
//! - [`Shape`] — dimension descriptors with stride computation.
//! - [`TensorDesc`] — the full memory contract of an edge: shape + dtype +
//!   layout.
//! - [`DataConfig`] — a per-port descriptor entry (desc, in-place aliasing,
//!   constant flag) used during negotiation.
//! - [`Tensor`] — an owned host buffer carrying a descriptor; the blob type
//!   bound to inference requests.
//! - Reference operations: matmul, eltwise add/mul, relu, softmax, concat,
//!   and layout reorder. These back the built-in candidate implementations.
//!
//! # Design Goals
//! - Zero-copy views wherever possible.
//! - Operations work on pre-allocated output buffers — no heap allocation
//!   in the dispatch hot path.
//! - Clean error types via `thiserror`.

mod desc;
mod dtype;
mod error;
mod layout;
mod ops;
mod shape;
mod tensor;

pub use desc::{DataConfig, TensorDesc};
pub use dtype::DType;
pub use error::TensorError;
pub use layout::Layout;
pub use ops::{add, add_in_place, concat, matmul, mul, relu, relu_in_place, reorder, softmax};
pub use shape::Shape;
pub use tensor::{Tensor, TensorView};
