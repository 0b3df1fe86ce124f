// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capability keys: what an implementation can handle, as a bitmask.
//!
//! A node's *required* key collects the precisions and layouts appearing
//! on its ports; an implementation *supports* the node when its declared
//! key is a superset of the required key. The superset test is a single
//! mask comparison, so the selection loop stays branch-cheap.

use tensor_core::{DType, Layout};

/// Bitmask of precisions, layouts, and execution traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityKey {
    mask: u64,
}

const BIT_F32: u64 = 1 << 0;
const BIT_F16: u64 = 1 << 1;
const BIT_BF16: u64 = 1 << 2;
const BIT_I8: u64 = 1 << 3;
const BIT_ROW_MAJOR: u64 = 1 << 8;
const BIT_COL_MAJOR: u64 = 1 << 9;
const BIT_IN_PLACE: u64 = 1 << 16;

impl CapabilityKey {
    /// An empty key: supports nothing, required by nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Enables a precision bit.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.mask |= match dtype {
            DType::F32 => BIT_F32,
            DType::F16 => BIT_F16,
            DType::BF16 => BIT_BF16,
            DType::I8 => BIT_I8,
        };
        self
    }

    /// Enables a layout bit.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.mask |= match layout {
            Layout::RowMajor => BIT_ROW_MAJOR,
            Layout::ColMajor => BIT_COL_MAJOR,
        };
        self
    }

    /// Enables the in-place-aliasing trait.
    pub fn with_in_place(mut self) -> Self {
        self.mask |= BIT_IN_PLACE;
        self
    }

    /// Returns the union of two keys.
    pub fn merge(self, other: CapabilityKey) -> Self {
        Self {
            mask: self.mask | other.mask,
        }
    }

    /// Returns `true` if `self` declares everything `required` asks for.
    pub fn supports(self, required: CapabilityKey) -> bool {
        self.mask & required.mask == required.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superset_support() {
        let imp = CapabilityKey::empty()
            .with_dtype(DType::F32)
            .with_dtype(DType::F16)
            .with_layout(Layout::RowMajor)
            .with_layout(Layout::ColMajor);

        let req = CapabilityKey::empty()
            .with_dtype(DType::F32)
            .with_layout(Layout::RowMajor);
        assert!(imp.supports(req));

        let req_i8 = req.with_dtype(DType::I8);
        assert!(!imp.supports(req_i8));
    }

    #[test]
    fn test_empty_required_is_always_supported() {
        assert!(CapabilityKey::empty().supports(CapabilityKey::empty()));
        let imp = CapabilityKey::empty().with_dtype(DType::F32);
        assert!(imp.supports(CapabilityKey::empty()));
    }

    #[test]
    fn test_merge() {
        let a = CapabilityKey::empty().with_dtype(DType::F32);
        let b = CapabilityKey::empty().with_layout(Layout::ColMajor);
        let m = a.merge(b);
        assert!(m.supports(a));
        assert!(m.supports(b));
    }

    #[test]
    fn test_in_place_trait() {
        let imp = CapabilityKey::empty().with_dtype(DType::F32).with_in_place();
        let req = CapabilityKey::empty().with_in_place();
        assert!(imp.supports(req));
        assert!(!CapabilityKey::empty().with_dtype(DType::F32).supports(req));
    }
}
