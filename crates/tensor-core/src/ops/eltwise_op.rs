// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise binary operations.

use crate::{DType, Tensor, TensorError, TensorView};

/// Computes `output[i] = lhs[i] + rhs[i]`.
///
/// Both inputs and the output must share the same shape, dtype (`F32`),
/// and layout — elementwise operations are layout-agnostic as long as all
/// operands agree.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] or
/// [`TensorError::UnsupportedDType`] on incompatible operands.
pub fn add(
    lhs: &TensorView<'_>,
    rhs: &TensorView<'_>,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    eltwise(lhs, rhs, output, "add", |a, b| a + b)
}

/// Computes `output[i] = lhs[i] * rhs[i]`. Same contract as [`add`].
pub fn mul(
    lhs: &TensorView<'_>,
    rhs: &TensorView<'_>,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    eltwise(lhs, rhs, output, "mul", |a, b| a * b)
}

fn eltwise(
    lhs: &TensorView<'_>,
    rhs: &TensorView<'_>,
    output: &mut Tensor,
    op: &'static str,
    f: impl Fn(f32, f32) -> f32,
) -> Result<(), TensorError> {
    if lhs.dtype() != DType::F32 || rhs.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op,
            dtype: if lhs.dtype() != DType::F32 {
                lhs.dtype()
            } else {
                rhs.dtype()
            },
        });
    }
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    if output.shape() != lhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: lhs.shape().clone(),
            rhs: output.shape().clone(),
        });
    }

    let a = lhs.as_f32_slice();
    let b = rhs.as_f32_slice();
    let out = output.as_f32_slice_mut();
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = f(x, y);
    }
    Ok(())
}

/// In-place variant: `io[i] = io[i] + rhs[i]`.
///
/// Used when the negotiated descriptor aliases the output onto input 0.
pub fn add_in_place(io: &mut Tensor, rhs: &TensorView<'_>) -> Result<(), TensorError> {
    if io.dtype() != DType::F32 || rhs.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "add_in_place",
            dtype: rhs.dtype(),
        });
    }
    if io.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "add_in_place",
            lhs: io.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    let b = rhs.as_f32_slice().to_vec();
    for (o, y) in io.as_f32_slice_mut().iter_mut().zip(b) {
        *o += y;
    }
    Ok(())
}
