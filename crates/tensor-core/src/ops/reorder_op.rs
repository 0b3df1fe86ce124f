// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layout reorder: physical permutation between row-major and col-major.
//!
//! Reorder nodes are materialised by the partitioner at backend boundaries
//! and by the negotiator wherever a producer's selected layout differs from
//! a consumer's required layout.

use crate::{DType, Layout, Tensor, TensorError, TensorView};

/// Copies `input` into `output`, permuting elements so that `output`'s
/// declared layout holds.
///
/// For identical layouts this is a plain byte copy. Between
/// [`Layout::RowMajor`] and [`Layout::ColMajor`] the permutation is defined
/// for rank-2 tensors; rank-1 and scalar buffers are layout-invariant and
/// copied as-is.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if shapes differ and
/// [`TensorError::UnsupportedLayout`] for a row/col conversion of a tensor
/// with rank above 2.
pub fn reorder(input: &TensorView<'_>, output: &mut Tensor) -> Result<(), TensorError> {
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "reorder",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    if input.dtype() != output.dtype() {
        return Err(TensorError::UnsupportedDType {
            op: "reorder",
            dtype: output.dtype(),
        });
    }

    let src_layout = input.layout();
    let dst_layout = output.layout();

    // Same layout, or a buffer where layout carries no meaning.
    if src_layout == dst_layout || input.shape().rank() < 2 {
        output.as_bytes_mut().copy_from_slice(input.as_bytes());
        return Ok(());
    }

    if input.shape().rank() > 2 {
        return Err(TensorError::UnsupportedLayout {
            op: "reorder",
            layout: dst_layout,
        });
    }
    if input.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "reorder",
            dtype: input.dtype(),
        });
    }

    let rows = input.shape().dims()[0];
    let cols = input.shape().dims()[1];
    let src = input.as_f32_slice();
    let dst = output.as_f32_slice_mut();

    // Row-major element (r, c) sits at r*cols + c; col-major at c*rows + r.
    match (src_layout, dst_layout) {
        (Layout::RowMajor, Layout::ColMajor) => {
            for r in 0..rows {
                for c in 0..cols {
                    dst[c * rows + r] = src[r * cols + c];
                }
            }
        }
        (Layout::ColMajor, Layout::RowMajor) => {
            for r in 0..rows {
                for c in 0..cols {
                    dst[r * cols + c] = src[c * rows + r];
                }
            }
        }
        _ => unreachable!("identical layouts handled above"),
    }

    Ok(())
}
