// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication operation.

use crate::{DType, Layout, Shape, Tensor, TensorError, TensorView};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// `lhs` is `[M, K]` row-major; `rhs` is `[K, N]` and may be stored either
/// row-major or column-major — the kernel adapts its indexing to the
/// declared layout. `output` must be `[M, N]` row-major.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
/// Returns [`TensorError::UnsupportedDType`] if the dtype is not `F32`.
/// Returns [`TensorError::UnsupportedLayout`] if `lhs` is not row-major.
pub fn matmul(
    lhs: &TensorView<'_>,
    rhs: &TensorView<'_>,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    // Validate dtype — currently only F32 is supported.
    if lhs.dtype() != DType::F32 || rhs.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "matmul",
            dtype: if lhs.dtype() != DType::F32 {
                lhs.dtype()
            } else {
                rhs.dtype()
            },
        });
    }

    if lhs.layout() != Layout::RowMajor {
        return Err(TensorError::UnsupportedLayout {
            op: "matmul",
            layout: lhs.layout(),
        });
    }

    // Validate shapes.
    if !lhs.shape().is_matmul_compatible(rhs.shape()) {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }

    let lhs_dims = lhs.shape().dims();
    let rhs_dims = rhs.shape().dims();
    let m = lhs_dims[lhs_dims.len() - 2];
    let k = lhs_dims[lhs_dims.len() - 1];
    let n = rhs_dims[rhs_dims.len() - 1];

    let expected_shape = Shape::matrix(m, n);
    if output.shape() != &expected_shape || output.dtype() != DType::F32 {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: expected_shape,
            rhs: output.shape().clone(),
        });
    }

    let a = lhs.as_f32_slice();
    let b = rhs.as_f32_slice();
    let c = output.as_f32_slice_mut();

    match rhs.layout() {
        Layout::RowMajor => matmul_f32_row_major(a, b, c, m, k, n),
        Layout::ColMajor => matmul_f32_col_major(a, b, c, m, k, n),
    }

    Ok(())
}

/// f32 matrix multiply with a row-major right-hand side.
///
/// Uses an ikj loop order: the inner loop is a saxpy on a row of C,
/// which is sequential in memory for both B and C.
fn matmul_f32_row_major(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    c.iter_mut().for_each(|x| *x = 0.0);

    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            let c_row = &mut c[i * n..(i + 1) * n];
            let b_row = &b[p * n..(p + 1) * n];
            for j in 0..n {
                c_row[j] += a_ip * b_row[j];
            }
        }
    }
}

/// f32 matrix multiply with a column-major right-hand side.
///
/// Column `j` of B is the contiguous slice `b[j*k .. (j+1)*k]`, so the
/// inner dot product streams both operands sequentially.
fn matmul_f32_col_major(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    for i in 0..m {
        let a_row = &a[i * k..(i + 1) * k];
        for j in 0..n {
            let b_col = &b[j * k..(j + 1) * k];
            let mut acc = 0.0f32;
            for p in 0..k {
                acc += a_row[p] * b_col[p];
            }
            c[i * n + j] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Shape, TensorDesc};

    #[test]
    fn test_matmul_2x3_times_3x2() {
        // A = [[1, 2, 3], [4, 5, 6]]
        // B = [[7, 8], [9, 10], [11, 12]]
        // C = [[58, 64], [139, 154]]
        let a = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b =
            Tensor::from_f32(Shape::matrix(3, 2), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let mut c = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        matmul(&a.view(), &b.view(), &mut c).unwrap();

        let result = c.as_f32_slice();
        assert!((result[0] - 58.0).abs() < 1e-5);
        assert!((result[1] - 64.0).abs() < 1e-5);
        assert!((result[2] - 139.0).abs() < 1e-5);
        assert!((result[3] - 154.0).abs() < 1e-5);
    }

    #[test]
    fn test_matmul_col_major_rhs() {
        // Same product as above, but B stored column-major:
        // columns [7, 9, 11] and [8, 10, 12].
        let a = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b_desc =
            TensorDesc::with_layout(Shape::matrix(3, 2), DType::F32, Layout::ColMajor);
        let b_data: Vec<u8> = [7.0f32, 9.0, 11.0, 8.0, 10.0, 12.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let b = Tensor::from_bytes(b_desc, b_data).unwrap();
        let mut c = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        matmul(&a.view(), &b.view(), &mut c).unwrap();

        let result = c.as_f32_slice();
        assert!((result[0] - 58.0).abs() < 1e-5);
        assert!((result[1] - 64.0).abs() < 1e-5);
        assert!((result[2] - 139.0).abs() < 1e-5);
        assert!((result[3] - 154.0).abs() < 1e-5);
    }

    #[test]
    fn test_matmul_identity() {
        // A * I = A
        let a = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let eye = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let mut c = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        matmul(&a.view(), &eye.view(), &mut c).unwrap();

        assert_eq!(c.as_f32_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 3), DType::F32));
        let b = Tensor::zeros(TensorDesc::new(Shape::matrix(4, 2), DType::F32)); // 4 != 3
        let mut c = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        let result = matmul(&a.view(), &b.view(), &mut c);
        assert!(result.is_err());
    }

    #[test]
    fn test_matmul_1x1() {
        let a = Tensor::from_f32(Shape::matrix(1, 1), &[3.0]).unwrap();
        let b = Tensor::from_f32(Shape::matrix(1, 1), &[4.0]).unwrap();
        let mut c = Tensor::zeros(TensorDesc::new(Shape::matrix(1, 1), DType::F32));

        matmul(&a.view(), &b.view(), &mut c).unwrap();
        assert!((c.as_f32_slice()[0] - 12.0).abs() < 1e-6);
    }
}
