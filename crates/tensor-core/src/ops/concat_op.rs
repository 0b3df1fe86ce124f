// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Concatenation along the last axis.

use crate::{DType, Tensor, TensorError, TensorView};

/// Concatenates `inputs` along the last axis into `output`.
///
/// All inputs must be `F32`, row-major, share every dimension except the
/// last, and the output's last dimension must equal the sum of the inputs'.
pub fn concat(inputs: &[TensorView<'_>], output: &mut Tensor) -> Result<(), TensorError> {
    let first = inputs.first().ok_or(TensorError::Numeric {
        op: "concat",
        detail: "no inputs".into(),
    })?;

    for input in inputs {
        if input.dtype() != DType::F32 {
            return Err(TensorError::UnsupportedDType {
                op: "concat",
                dtype: input.dtype(),
            });
        }
        let a = first.shape().dims();
        let b = input.shape().dims();
        if a.len() != b.len() || a[..a.len() - 1] != b[..b.len() - 1] {
            return Err(TensorError::ShapeMismatch {
                op: "concat",
                lhs: first.shape().clone(),
                rhs: input.shape().clone(),
            });
        }
    }

    let rank = first.shape().rank().max(1);
    let out_last = output.shape().dim(rank - 1).unwrap_or(0);
    let in_last_sum: usize = inputs
        .iter()
        .map(|i| i.shape().dim(rank - 1).unwrap_or(0))
        .sum();
    if out_last != in_last_sum {
        return Err(TensorError::ShapeMismatch {
            op: "concat (output)",
            lhs: first.shape().clone(),
            rhs: output.shape().clone(),
        });
    }

    let rows: usize = first.shape().dims()[..rank - 1].iter().product::<usize>().max(1);
    let dst = output.as_f32_slice_mut();

    let mut col_offset = 0;
    for input in inputs {
        let cols = input.shape().dim(rank - 1).unwrap_or(0);
        let src = input.as_f32_slice();
        for row in 0..rows {
            let d = row * out_last + col_offset;
            let s = row * cols;
            dst[d..d + cols].copy_from_slice(&src[s..s + cols]);
        }
        col_offset += cols;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Shape, TensorDesc};

    #[test]
    fn test_concat_vectors() {
        let a = Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap();
        let b = Tensor::from_f32(Shape::vector(3), &[3.0, 4.0, 5.0]).unwrap();
        let mut out = Tensor::zeros(TensorDesc::new(Shape::vector(5), DType::F32));

        concat(&[a.view(), b.view()], &mut out).unwrap();
        assert_eq!(out.as_f32_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_concat_matrices() {
        // [[1, 2], [3, 4]] ++ [[5], [6]] → [[1, 2, 5], [3, 4, 6]]
        let a = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Tensor::from_f32(Shape::matrix(2, 1), &[5.0, 6.0]).unwrap();
        let mut out = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 3), DType::F32));

        concat(&[a.view(), b.view()], &mut out).unwrap();
        assert_eq!(out.as_f32_slice(), &[1.0, 2.0, 5.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_concat_row_mismatch() {
        let a = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));
        let b = Tensor::zeros(TensorDesc::new(Shape::matrix(3, 1), DType::F32));
        let mut out = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 3), DType::F32));
        assert!(concat(&[a.view(), b.view()], &mut out).is_err());
    }

    #[test]
    fn test_concat_empty_inputs() {
        let mut out = Tensor::zeros(TensorDesc::new(Shape::vector(1), DType::F32));
        assert!(concat(&[], &mut out).is_err());
    }
}
