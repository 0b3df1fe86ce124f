// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tuning configuration and the benchmark-runner abstraction.

use crate::{Kernel as _, KernelData, KernelParams};
use std::path::PathBuf;
use std::time::Instant;
use tensor_core::Tensor;

/// How the selector consults and updates the tuning cache.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TuningMode {
    /// No tuning: offline cache lookups only, naive selection on a miss.
    #[default]
    Disabled,
    /// Use cached results (online store first) but never measure.
    UseCache,
    /// Measure candidates with the benchmark runner and persist winners.
    TuneAndCache,
}

/// Tuning configuration handed to [`crate::KernelSelector`].
///
/// The cache object itself is constructed once at engine initialisation
/// and passed by reference — there is no ambient singleton.
#[derive(Debug, Clone, Default)]
pub struct TuningConfig {
    pub mode: TuningMode,
    /// Backing file for the offline store; `None` keeps tuning results
    /// in memory for the process lifetime.
    pub cache_file: Option<PathBuf>,
}

/// Measures candidate kernels during online tuning.
///
/// Runners only execute during compilation, before any inference request
/// exists, so implementations need no internal synchronisation.
pub trait BenchmarkRunner: Send + Sync {
    /// Runs each kernel against scratch buffers shaped per `params` and
    /// returns per-kernel run times in microseconds. A kernel that fails
    /// to execute reports `u64::MAX`, which can never win.
    fn run_kernels(&self, params: &KernelParams, kernels: &[KernelData]) -> Vec<u64>;
}

/// A runner that executes kernels in-process on zero-filled scratch
/// tensors and takes the best of a few repetitions.
#[derive(Debug, Clone)]
pub struct InProcessRunner {
    /// Repetitions per kernel; the minimum is kept.
    pub iterations: u32,
}

impl Default for InProcessRunner {
    fn default() -> Self {
        Self { iterations: 3 }
    }
}

impl BenchmarkRunner for InProcessRunner {
    fn run_kernels(&self, params: &KernelParams, kernels: &[KernelData]) -> Vec<u64> {
        let inputs: Vec<Tensor> = params
            .inputs
            .iter()
            .map(|desc| Tensor::zeros(desc.clone()))
            .collect();
        let views: Vec<_> = inputs.iter().map(|t| t.view()).collect();

        kernels
            .iter()
            .map(|kd| {
                let Some(out_desc) = params.outputs.first() else {
                    return u64::MAX;
                };
                let mut output = Tensor::zeros(out_desc.clone());
                let mut best = u64::MAX;
                for _ in 0..self.iterations.max(1) {
                    let start = Instant::now();
                    if kd.kernel.execute(&views, &mut output).is_err() {
                        return u64::MAX;
                    }
                    // Wall-clock floor of 1us keeps zero-duration kernels
                    // comparable.
                    best = best.min(start.elapsed().as_micros().max(1) as u64);
                }
                best
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RefRelu;
    use crate::CandidateImpl;
    use graph_ir::OpKind;
    use tensor_core::{DType, Shape, TensorDesc};

    fn relu_params() -> KernelParams {
        let mut p = KernelParams::new(OpKind::Relu, "act");
        p.inputs
            .push(TensorDesc::new(Shape::matrix(1, 64), DType::F32));
        p.outputs
            .push(TensorDesc::new(Shape::matrix(1, 64), DType::F32));
        p
    }

    #[test]
    fn test_in_process_runner_measures() {
        let params = relu_params();
        let kd = RefRelu.build(&params, 0).unwrap();
        let runner = InProcessRunner::default();

        let times = runner.run_kernels(&params, &[kd]);
        assert_eq!(times.len(), 1);
        assert!(times[0] >= 1);
        assert!(times[0] < u64::MAX);
    }

    #[test]
    fn test_tuning_mode_serde() {
        let m: TuningMode = serde_json::from_str("\"tune_and_cache\"").unwrap();
        assert_eq!(m, TuningMode::TuneAndCache);
    }
}
