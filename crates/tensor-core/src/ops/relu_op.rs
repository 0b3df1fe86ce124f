// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rectified linear unit activation.

use crate::{DType, Tensor, TensorError, TensorView};

/// Computes `output[i] = max(0, input[i])`.
///
/// Input and output must share the same shape and be `F32`. Layout is
/// irrelevant — the operation is pointwise.
pub fn relu(input: &TensorView<'_>, output: &mut Tensor) -> Result<(), TensorError> {
    if input.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "relu",
            dtype: input.dtype(),
        });
    }
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "relu",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }

    let src = input.as_f32_slice();
    let dst = output.as_f32_slice_mut();
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s.max(0.0);
    }
    Ok(())
}

/// In-place variant: `io[i] = max(0, io[i])`.
pub fn relu_in_place(io: &mut Tensor) -> Result<(), TensorError> {
    if io.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "relu_in_place",
            dtype: io.dtype(),
        });
    }
    for x in io.as_f32_slice_mut() {
        *x = x.max(0.0);
    }
    Ok(())
}
