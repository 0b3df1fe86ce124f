// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type and view abstractions.

use crate::{DType, Layout, Shape, TensorDesc, TensorError};

/// An owned tensor stored in contiguous host memory.
///
/// `Tensor` is the blob type of the inference pipeline: request inputs and
/// outputs, constants, and intermediate edge buffers are all `Tensor`s.
/// It owns its data buffer, carries a full [`TensorDesc`], and exposes
/// immutable views via [`TensorView`].
#[derive(Debug, Clone)]
pub struct Tensor {
    desc: TensorDesc,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{DType, Shape, Tensor, TensorDesc};
    /// let t = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 3), DType::F32));
    /// assert_eq!(t.size_bytes(), 24); // 2 * 3 * 4 bytes
    /// ```
    pub fn zeros(desc: TensorDesc) -> Self {
        let size = desc.size_bytes();
        Self {
            desc,
            data: vec![0u8; size],
        }
    }

    /// Creates a tensor from raw bytes.
    ///
    /// Returns an error if the buffer size does not match `desc.size_bytes()`.
    pub fn from_bytes(desc: TensorDesc, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = desc.size_bytes();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { desc, data })
    }

    /// Creates a row-major `F32` tensor from a slice of values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.as_f32_slice(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let desc = TensorDesc::new(shape, DType::F32);
        if values.len() != desc.shape.num_elements() {
            return Err(TensorError::BufferSizeMismatch {
                expected: desc.size_bytes(),
                actual: values.len() * DType::F32.size_bytes(),
            });
        }
        // SAFETY: reinterpreting &[f32] as &[u8] is safe for Copy types.
        let byte_slice = unsafe {
            std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 4)
        };
        Ok(Self {
            desc,
            data: byte_slice.to_vec(),
        })
    }

    /// Returns the tensor's full descriptor.
    pub fn desc(&self) -> &TensorDesc {
        &self.desc
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    /// Returns the tensor's physical layout.
    pub fn layout(&self) -> Layout {
        self.desc.layout
    }

    /// Retags the tensor's layout without touching the data.
    ///
    /// Used by reorder kernels after physically permuting the buffer.
    pub fn set_layout(&mut self, layout: Layout) {
        self.desc.layout = layout;
    }

    /// Returns an immutable view over this tensor's data.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            desc: &self.desc,
            data: &self.data,
        }
    }

    /// Returns the raw byte slice backing this tensor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a mutable reference to the raw byte buffer.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the memory footprint of this tensor in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Interprets the buffer as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn as_f32_slice(&self) -> &[f32] {
        assert_eq!(
            self.dtype(),
            DType::F32,
            "as_f32_slice called on {:?} tensor",
            self.dtype()
        );
        // SAFETY: the buffer was constructed from f32 data of exactly
        // num_elements() values.
        unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const f32,
                self.desc.shape.num_elements(),
            )
        }
    }

    /// Interprets the buffer as a mutable slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        assert_eq!(
            self.dtype(),
            DType::F32,
            "as_f32_slice_mut called on {:?} tensor",
            self.dtype()
        );
        let n = self.desc.shape.num_elements();
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut f32, n) }
    }

    /// Fills the tensor with a constant `f32` value.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn fill_f32(&mut self, value: f32) {
        let slice = self.as_f32_slice_mut();
        slice.iter_mut().for_each(|x| *x = value);
    }
}

/// A borrowed, read-only view over a [`Tensor`]'s data.
///
/// Views are zero-copy and tied to the lifetime of the source tensor,
/// enforced by the borrow checker.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    desc: &'a TensorDesc,
    data: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Creates a view from raw parts (used internally by tensor ops).
    pub fn from_parts(desc: &'a TensorDesc, data: &'a [u8]) -> Self {
        Self { desc, data }
    }

    /// Returns the full descriptor of the viewed tensor.
    pub fn desc(&self) -> &TensorDesc {
        self.desc
    }

    /// Returns the shape of the viewed tensor.
    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    /// Returns the data type of the viewed tensor.
    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    /// Returns the physical layout of the viewed tensor.
    pub fn layout(&self) -> Layout {
        self.desc.layout
    }

    /// Returns the raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }

    /// Interprets the view as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn as_f32_slice(&self) -> &[f32] {
        assert_eq!(
            self.dtype(),
            DType::F32,
            "as_f32_slice called on {:?} view",
            self.dtype()
        );
        unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const f32,
                self.desc.shape.num_elements(),
            )
        }
    }
}
