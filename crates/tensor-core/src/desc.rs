// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors: the memory contract carried by every graph edge.
//!
//! A [`TensorDesc`] is what flows through compilation — shape, precision,
//! and layout. A [`DataConfig`] wraps a descriptor with the negotiation
//! attributes (in-place aliasing, constant flag) that a candidate
//! implementation declares per input/output port.

use crate::{DType, Layout, Shape};

/// The full memory contract of one tensor value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TensorDesc {
    /// Logical dimensions.
    pub shape: Shape,
    /// Element precision.
    pub dtype: DType,
    /// Physical element ordering.
    pub layout: Layout,
}

impl TensorDesc {
    /// Creates a descriptor with the default [`Layout::RowMajor`] layout.
    pub fn new(shape: Shape, dtype: DType) -> Self {
        Self {
            shape,
            dtype,
            layout: Layout::RowMajor,
        }
    }

    /// Creates a descriptor with an explicit layout.
    pub fn with_layout(shape: Shape, dtype: DType, layout: Layout) -> Self {
        Self {
            shape,
            dtype,
            layout,
        }
    }

    /// Returns the buffer size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// Returns a copy of this descriptor with a different layout.
    pub fn reordered(&self, layout: Layout) -> Self {
        Self {
            shape: self.shape.clone(),
            dtype: self.dtype,
            layout,
        }
    }

    /// Returns `true` if `self` can be consumed where `required` is
    /// expected without any conversion.
    pub fn matches(&self, required: &TensorDesc) -> bool {
        self == required
    }

    /// Returns `true` if a reorder can legally convert `self` into
    /// `required`: same shape and precision, layouts may differ.
    ///
    /// Precision conversion is not a reorder's job, so differing dtypes
    /// are never reorderable.
    pub fn reorderable_to(&self, required: &TensorDesc) -> bool {
        self.shape == required.shape && self.dtype == required.dtype
    }
}

impl std::fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.shape, self.dtype, self.layout)
    }
}

/// One port entry of a primitive descriptor.
///
/// Candidate implementations return a list of these per input and output
/// during negotiation; the selected set becomes the node's execution
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// The memory contract required at this port.
    pub desc: TensorDesc,
    /// For an output port: the input index whose buffer this output may
    /// alias, or `None` when the output needs its own buffer.
    pub in_place: Option<usize>,
    /// Whether the value at this port is constant (weights, folded data).
    pub constant: bool,
}

impl DataConfig {
    /// Creates a plain config: dedicated buffer, non-constant.
    pub fn plain(desc: TensorDesc) -> Self {
        Self {
            desc,
            in_place: None,
            constant: false,
        }
    }

    /// Creates a config whose buffer aliases input `index`.
    pub fn in_place(desc: TensorDesc, index: usize) -> Self {
        Self {
            desc,
            in_place: Some(index),
            constant: false,
        }
    }

    /// Creates a constant config (weights and folded inputs).
    pub fn constant(desc: TensorDesc) -> Self {
        Self {
            desc,
            in_place: None,
            constant: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bytes() {
        let d = TensorDesc::new(Shape::matrix(2, 3), DType::F32);
        assert_eq!(d.size_bytes(), 24);
        assert_eq!(d.layout, Layout::RowMajor);
    }

    #[test]
    fn test_reordered() {
        let d = TensorDesc::new(Shape::matrix(4, 4), DType::F32);
        let r = d.reordered(Layout::ColMajor);
        assert_eq!(r.layout, Layout::ColMajor);
        assert_eq!(r.shape, d.shape);
    }

    #[test]
    fn test_reorderable_to() {
        let row = TensorDesc::new(Shape::matrix(4, 4), DType::F32);
        let col = row.reordered(Layout::ColMajor);
        assert!(!row.matches(&col));
        assert!(row.reorderable_to(&col));

        // Different dtype is never reorderable.
        let f16 = TensorDesc::with_layout(Shape::matrix(4, 4), DType::F16, Layout::ColMajor);
        assert!(!row.reorderable_to(&f16));

        // Different shape is never reorderable.
        let other = TensorDesc::new(Shape::matrix(4, 5), DType::F32);
        assert!(!row.reorderable_to(&other));
    }

    #[test]
    fn test_data_config_constructors() {
        let d = TensorDesc::new(Shape::vector(8), DType::F32);
        assert_eq!(DataConfig::plain(d.clone()).in_place, None);
        assert_eq!(DataConfig::in_place(d.clone(), 0).in_place, Some(0));
        assert!(DataConfig::constant(d).constant);
    }

    #[test]
    fn test_display() {
        let d = TensorDesc::new(Shape::matrix(2, 3), DType::F32);
        assert_eq!(format!("{d}"), "[2, 3]/f32/row_major");
    }
}
