// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Physical memory layouts.
//!
//! A layout describes how the elements of a tensor are ordered in its flat
//! buffer. Candidate implementations declare the layouts they accept; when a
//! producer's selected layout differs from a consumer's required layout, the
//! negotiator inserts a reorder node between them.

/// Physical element ordering of a tensor buffer.
///
/// For rank-2 tensors the distinction is the classic row-major vs
/// column-major storage. For other ranks only [`Layout::RowMajor`]
/// (C-order) is meaningful; reorders between the two are defined for
/// matrices only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// C-order: the last dimension is contiguous. The default for every
    /// graph input and output.
    #[default]
    RowMajor,
    /// Fortran-order for matrices: the first dimension is contiguous.
    /// Preferred by implementations that stream the right-hand operand
    /// column-wise.
    ColMajor,
}

impl Layout {
    /// Returns a human-readable label for this layout.
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::RowMajor => "row_major",
            Layout::ColMajor => "col_major",
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
