// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Candidate implementations and built kernels.

use crate::{CapabilityKey, KernelAttemptError, KernelError, KernelParams};
use std::sync::Arc;
use tensor_core::{DataConfig, Tensor, TensorView};

/// An executable kernel, resolved once at compile time.
///
/// The dispatcher stores a direct handle to the selected kernel — there is
/// no per-request lookup or downcasting.
pub trait Kernel: Send + Sync {
    /// Executes the kernel: reads `inputs`, writes `output`.
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError>;

    /// In-place entry point: `io` is both input 0 and the output; any
    /// remaining inputs arrive as `extra`.
    ///
    /// Only kernels whose selected descriptor aliases the output onto
    /// input 0 are invoked this way; the default refuses.
    fn execute_in_place(
        &self,
        _io: &mut Tensor,
        _extra: &[TensorView<'_>],
    ) -> Result<(), KernelError> {
        Err(KernelError::InPlaceUnsupported)
    }
}

/// The result of building one candidate for one node.
#[derive(Clone)]
pub struct KernelData {
    /// Name of the implementation that produced this kernel.
    pub impl_name: String,
    /// The executable unit.
    pub kernel: Arc<dyn Kernel>,
    /// Estimated execution cost (abstract units; lower is better).
    pub estimated_cost: u64,
    /// Tuning configuration index this kernel was built with.
    pub tune_index: i32,
    /// Measured run time in microseconds, when a benchmark runner has
    /// timed this kernel.
    pub measured_us: Option<u64>,
}

impl std::fmt::Debug for KernelData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelData")
            .field("impl_name", &self.impl_name)
            .field("estimated_cost", &self.estimated_cost)
            .field("tune_index", &self.tune_index)
            .field("measured_us", &self.measured_us)
            .finish()
    }
}

/// One input/output configuration a candidate can execute with.
///
/// Candidates may offer several (e.g., an in-place variant and a plain
/// one); the negotiator picks among them across the whole graph.
#[derive(Debug, Clone)]
pub struct ImplConfig {
    /// Required per-input configs, in port order.
    pub inputs: Vec<DataConfig>,
    /// Produced per-output configs, in port order.
    pub outputs: Vec<DataConfig>,
}

/// A candidate implementation: capability key, cost estimation, and an
/// executable factory.
///
/// Many candidates may exist per operator; exactly one is selected per
/// node. Factories return [`KernelAttemptError`] for parameter shapes they
/// cannot serve — the selector treats that as "does not apply", never as a
/// compilation failure.
pub trait CandidateImpl: Send + Sync {
    /// Unique implementation name (also the cache record identity).
    fn name(&self) -> &str;

    /// Everything this implementation can handle.
    fn supported_key(&self) -> CapabilityKey;

    /// Whether this implementation participates in online tuning.
    /// Reference implementations return `false` and serve as the fallback
    /// pool when tuning finds nothing usable.
    fn tuning_supported(&self) -> bool {
        false
    }

    /// The port configurations this implementation offers for `params`,
    /// most preferred first.
    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig>;

    /// Estimated execution cost for `params` (lower is better).
    fn estimated_cost(&self, params: &KernelParams) -> u64;

    /// Tuning configuration indices worth measuring for `params`.
    fn tune_indices(&self, _params: &KernelParams) -> Vec<i32> {
        vec![0]
    }

    /// Builds the executable kernel for `params` at `tune_index`.
    fn build(
        &self,
        params: &KernelParams,
        tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError>;
}
