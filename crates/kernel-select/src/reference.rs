// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in reference implementations.
//!
//! These wrap the `tensor-core` kernels behind the [`CandidateImpl`]
//! interface. They are the candidate pool an embedding application
//! registers for its CPU-style backends, and the fallback pool online
//! tuning retries when no tuning-eligible implementation produces usable
//! kernels.

use crate::{
    CandidateImpl, CapabilityKey, ImplConfig, ImplRegistry, Kernel, KernelAttemptError,
    KernelData, KernelError, KernelParams, PostOp,
};
use graph_ir::OpKind;
use std::sync::Arc;
use tensor_core::{DataConfig, DType, Layout, Tensor, TensorView};

/// Registers the complete reference set for one backend.
pub fn register_all(registry: &mut ImplRegistry, backend: crate::BackendId) {
    registry.register(backend, OpKind::MatMul, Arc::new(RefMatMul));
    registry.register(backend, OpKind::MatMul, Arc::new(TiledMatMul));
    registry.register(backend, OpKind::Add, Arc::new(RefAdd));
    registry.register(backend, OpKind::Mul, Arc::new(RefMul));
    registry.register(backend, OpKind::Relu, Arc::new(RefRelu));
    registry.register(backend, OpKind::Softmax, Arc::new(RefSoftmax));
    registry.register(backend, OpKind::Concat, Arc::new(RefConcat));
    registry.register(backend, OpKind::Reorder, Arc::new(RefReorder));
}

fn f32_rowmajor_key() -> CapabilityKey {
    CapabilityKey::empty()
        .with_dtype(DType::F32)
        .with_layout(Layout::RowMajor)
}

fn any_layout_key() -> CapabilityKey {
    f32_rowmajor_key().with_layout(Layout::ColMajor)
}

/// Checks the fixed-arity port counts before building a kernel.
fn expect_ports(
    params: &KernelParams,
    inputs: usize,
    name: &str,
) -> Result<(), KernelAttemptError> {
    // Fused sum post-ops append one extra input each.
    let extra = params.post_ops.iter().filter(|p| **p == PostOp::Sum).count();
    if params.inputs.len() != inputs + extra || params.outputs.len() != 1 {
        return Err(KernelAttemptError(format!(
            "{name}: unexpected port count ({} in, {} out)",
            params.inputs.len(),
            params.outputs.len(),
        )));
    }
    Ok(())
}

// ── MatMul ─────────────────────────────────────────────────────────

/// Kernel executing matmul plus any fused post-ops.
struct MatMulKernel {
    post_ops: Vec<PostOp>,
}

impl Kernel for MatMulKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        if inputs.len() < 2 {
            return Err(KernelError::Invocation(format!(
                "matmul expects 2 inputs, got {}",
                inputs.len()
            )));
        }
        tensor_core::matmul(&inputs[0], &inputs[1], output)?;

        let mut extra = 2;
        for post in &self.post_ops {
            match post {
                PostOp::Relu => tensor_core::relu_in_place(output)?,
                PostOp::Sum => {
                    let addend = inputs.get(extra).ok_or_else(|| {
                        KernelError::Invocation("fused sum input missing".into())
                    })?;
                    tensor_core::add_in_place(output, addend)?;
                    extra += 1;
                }
            }
        }
        Ok(())
    }
}

/// Plain row-major matrix multiply.
pub struct RefMatMul;

impl CandidateImpl for RefMatMul {
    fn name(&self) -> &str {
        "matmul_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        f32_rowmajor_key()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        matmul_configs(params, Layout::RowMajor)
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        matmul_flops(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        check_matmul(params, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(MatMulKernel {
                post_ops: params.post_ops.clone(),
            }),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

/// Matrix multiply streaming a column-major weight operand.
///
/// Tuning-eligible: the tune index selects the accumulation strategy
/// measured by the runner.
pub struct TiledMatMul;

impl CandidateImpl for TiledMatMul {
    fn name(&self) -> &str {
        "matmul_tiled"
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key()
    }

    fn tuning_supported(&self) -> bool {
        true
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        matmul_configs(params, Layout::ColMajor)
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        // Column streaming saves a constant factor over the plain loop.
        matmul_flops(params) * 4 / 5
    }

    fn tune_indices(&self, _params: &KernelParams) -> Vec<i32> {
        vec![0, 1, 2]
    }

    fn build(
        &self,
        params: &KernelParams,
        tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        check_matmul(params, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(MatMulKernel {
                post_ops: params.post_ops.clone(),
            }),
            estimated_cost: self.estimated_cost(params),
            tune_index,
            measured_us: None,
        })
    }
}

fn check_matmul(params: &KernelParams, name: &str) -> Result<(), KernelAttemptError> {
    expect_ports(params, 2, name)?;
    let lhs = &params.inputs[0];
    let rhs = &params.inputs[1];
    if !lhs.shape.is_matmul_compatible(&rhs.shape) {
        return Err(KernelAttemptError(format!(
            "{name}: incompatible shapes {} x {}",
            lhs.shape, rhs.shape,
        )));
    }
    Ok(())
}

fn matmul_flops(params: &KernelParams) -> u64 {
    let (Some(lhs), Some(rhs)) = (params.inputs.first(), params.inputs.get(1)) else {
        return u64::MAX;
    };
    let dims = lhs.shape.dims();
    let m = dims.first().copied().unwrap_or(1) as u64;
    let k = dims.last().copied().unwrap_or(1) as u64;
    let n = rhs.shape.dims().last().copied().unwrap_or(1) as u64;
    m * k * n
}

/// Port configs for a matmul: lhs and output row-major, weight operand in
/// the implementation's preferred layout. Fused sum inputs ride along
/// unchanged.
fn matmul_configs(params: &KernelParams, weight_layout: Layout) -> Vec<ImplConfig> {
    if params.inputs.len() < 2 || params.outputs.len() != 1 {
        return vec![];
    }
    let mut inputs = vec![
        DataConfig::plain(params.inputs[0].reordered(Layout::RowMajor)),
        DataConfig::plain(params.inputs[1].reordered(weight_layout)),
    ];
    for extra in &params.inputs[2..] {
        inputs.push(DataConfig::plain(extra.reordered(Layout::RowMajor)));
    }
    vec![ImplConfig {
        inputs,
        outputs: vec![DataConfig::plain(
            params.outputs[0].reordered(Layout::RowMajor),
        )],
    }]
}

// ── Eltwise ────────────────────────────────────────────────────────

enum EltKind {
    Add,
    Mul,
}

struct EltwiseKernel {
    kind: EltKind,
    post_ops: Vec<PostOp>,
}

impl EltwiseKernel {
    fn apply_post_ops(&self, output: &mut Tensor) -> Result<(), KernelError> {
        for post in &self.post_ops {
            match post {
                PostOp::Relu => tensor_core::relu_in_place(output)?,
                PostOp::Sum => {
                    return Err(KernelError::Invocation(
                        "eltwise kernels fuse activations only".into(),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl Kernel for EltwiseKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        if inputs.len() != 2 {
            return Err(KernelError::Invocation(format!(
                "eltwise expects 2 inputs, got {}",
                inputs.len()
            )));
        }
        match self.kind {
            EltKind::Add => tensor_core::add(&inputs[0], &inputs[1], output)?,
            EltKind::Mul => tensor_core::mul(&inputs[0], &inputs[1], output)?,
        }
        self.apply_post_ops(output)
    }

    fn execute_in_place(
        &self,
        io: &mut Tensor,
        extra: &[TensorView<'_>],
    ) -> Result<(), KernelError> {
        match self.kind {
            EltKind::Add => {
                let rhs = extra.first().ok_or_else(|| {
                    KernelError::Invocation("eltwise in-place needs the second operand".into())
                })?;
                tensor_core::add_in_place(io, rhs)?;
                self.apply_post_ops(io)
            }
            EltKind::Mul => Err(KernelError::InPlaceUnsupported),
        }
    }
}

/// Elementwise addition; offers an in-place descriptor aliasing the
/// output onto input 0.
pub struct RefAdd;

impl CandidateImpl for RefAdd {
    fn name(&self) -> &str {
        "add_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key().with_in_place()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        let Some(configs) = unary_like_ports(params, 2) else {
            return vec![];
        };
        let (inputs, output) = configs;
        vec![
            // In-place first: the negotiator prefers descriptors that
            // reuse the input buffer.
            ImplConfig {
                inputs: inputs.clone(),
                outputs: vec![DataConfig::in_place(output.desc.clone(), 0)],
            },
            ImplConfig {
                inputs,
                outputs: vec![output],
            },
        ]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        expect_ports(params, 2, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(EltwiseKernel {
                kind: EltKind::Add,
                post_ops: params.post_ops.clone(),
            }),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

/// Elementwise multiplication (no in-place variant).
pub struct RefMul;

impl CandidateImpl for RefMul {
    fn name(&self) -> &str {
        "mul_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        let Some((inputs, output)) = unary_like_ports(params, 2) else {
            return vec![];
        };
        vec![ImplConfig {
            inputs,
            outputs: vec![output],
        }]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        expect_ports(params, 2, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(EltwiseKernel {
                kind: EltKind::Mul,
                post_ops: params.post_ops.clone(),
            }),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

// ── Relu ───────────────────────────────────────────────────────────

struct ReluKernel;

impl Kernel for ReluKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        let input = inputs
            .first()
            .ok_or_else(|| KernelError::Invocation("relu expects 1 input".into()))?;
        tensor_core::relu(input, output)?;
        Ok(())
    }

    fn execute_in_place(
        &self,
        io: &mut Tensor,
        _extra: &[TensorView<'_>],
    ) -> Result<(), KernelError> {
        tensor_core::relu_in_place(io)?;
        Ok(())
    }
}

/// Rectified linear activation; in-place capable.
pub struct RefRelu;

impl CandidateImpl for RefRelu {
    fn name(&self) -> &str {
        "relu_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key().with_in_place()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        let Some((inputs, output)) = unary_like_ports(params, 1) else {
            return vec![];
        };
        vec![
            ImplConfig {
                inputs: inputs.clone(),
                outputs: vec![DataConfig::in_place(output.desc.clone(), 0)],
            },
            ImplConfig {
                inputs,
                outputs: vec![output],
            },
        ]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        expect_ports(params, 1, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(ReluKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

// ── Softmax ────────────────────────────────────────────────────────

struct SoftmaxKernel;

impl Kernel for SoftmaxKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        let input = inputs
            .first()
            .ok_or_else(|| KernelError::Invocation("softmax expects 1 input".into()))?;
        tensor_core::softmax(input, output)?;
        Ok(())
    }
}

/// Row-wise softmax; row-major only (the reduction runs along rows).
pub struct RefSoftmax;

impl CandidateImpl for RefSoftmax {
    fn name(&self) -> &str {
        "softmax_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        f32_rowmajor_key()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        if params.inputs.len() != 1 || params.outputs.len() != 1 {
            return vec![];
        }
        vec![ImplConfig {
            inputs: vec![DataConfig::plain(
                params.inputs[0].reordered(Layout::RowMajor),
            )],
            outputs: vec![DataConfig::plain(
                params.outputs[0].reordered(Layout::RowMajor),
            )],
        }]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params) * 4
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        expect_ports(params, 1, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(SoftmaxKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

// ── Concat ─────────────────────────────────────────────────────────

struct ConcatKernel;

impl Kernel for ConcatKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        tensor_core::concat(inputs, output)?;
        Ok(())
    }
}

/// Concatenation along the last axis; row-major only.
pub struct RefConcat;

impl CandidateImpl for RefConcat {
    fn name(&self) -> &str {
        "concat_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        f32_rowmajor_key()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        if params.inputs.is_empty() || params.outputs.len() != 1 {
            return vec![];
        }
        vec![ImplConfig {
            inputs: params
                .inputs
                .iter()
                .map(|d| DataConfig::plain(d.reordered(Layout::RowMajor)))
                .collect(),
            outputs: vec![DataConfig::plain(
                params.outputs[0].reordered(Layout::RowMajor),
            )],
        }]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        if params.inputs.is_empty() || params.outputs.len() != 1 {
            return Err(KernelAttemptError("concat: no inputs".into()));
        }
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(ConcatKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

// ── Reorder ────────────────────────────────────────────────────────

struct ReorderKernel;

impl Kernel for ReorderKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        let input = inputs
            .first()
            .ok_or_else(|| KernelError::Invocation("reorder expects 1 input".into()))?;
        tensor_core::reorder(input, output)?;
        Ok(())
    }
}

/// Layout conversion between row- and column-major storage.
pub struct RefReorder;

impl CandidateImpl for RefReorder {
    fn name(&self) -> &str {
        "reorder_ref"
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        if params.inputs.len() != 1 || params.outputs.len() != 1 {
            return vec![];
        }
        // A reorder consumes and produces exactly the declared descriptors;
        // the layouts differing is the point.
        vec![ImplConfig {
            inputs: vec![DataConfig::plain(params.inputs[0].clone())],
            outputs: vec![DataConfig::plain(params.outputs[0].clone())],
        }]
    }

    fn estimated_cost(&self, params: &KernelParams) -> u64 {
        elements(params)
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        expect_ports(params, 1, self.name())?;
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(ReorderKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn elements(params: &KernelParams) -> u64 {
    params
        .outputs
        .first()
        .map(|d| d.shape.num_elements() as u64)
        .unwrap_or(u64::MAX)
}

/// Shared port derivation for pointwise operators: all ports adopt input
/// 0's declared layout.
fn unary_like_ports(
    params: &KernelParams,
    arity: usize,
) -> Option<(Vec<DataConfig>, DataConfig)> {
    if params.inputs.len() < arity || params.outputs.len() != 1 {
        return None;
    }
    let layout = params.inputs[0].layout;
    let inputs = params.inputs[..arity]
        .iter()
        .map(|d| DataConfig::plain(d.reordered(layout)))
        .collect();
    let output = DataConfig::plain(params.outputs[0].reordered(layout));
    Some((inputs, output))
}

// ── Test support ───────────────────────────────────────────────────

/// A no-op kernel for cost-model tests.
struct NoopKernel;

impl Kernel for NoopKernel {
    fn execute(
        &self,
        _inputs: &[TensorView<'_>],
        _output: &mut Tensor,
    ) -> Result<(), KernelError> {
        Ok(())
    }
}

/// An implementation with a fixed name and cost, optionally refusing to
/// build. Exists for selection and negotiation tests.
pub struct CostOverrideImpl {
    name: String,
    cost: u64,
    fails: bool,
}

impl CostOverrideImpl {
    pub fn new(name: &str, cost: u64) -> Self {
        Self {
            name: name.to_string(),
            cost,
            fails: false,
        }
    }

    /// A candidate whose every build attempt fails.
    pub fn failing(name: &str, cost: u64) -> Self {
        Self {
            name: name.to_string(),
            cost,
            fails: true,
        }
    }
}

impl CandidateImpl for CostOverrideImpl {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_key(&self) -> CapabilityKey {
        any_layout_key().with_in_place()
    }

    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        vec![ImplConfig {
            inputs: params.inputs.iter().cloned().map(DataConfig::plain).collect(),
            outputs: params
                .outputs
                .iter()
                .cloned()
                .map(DataConfig::plain)
                .collect(),
        }]
    }

    fn estimated_cost(&self, _params: &KernelParams) -> u64 {
        self.cost
    }

    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        if self.fails {
            return Err(KernelAttemptError(format!(
                "{} always fails by construction",
                self.name
            )));
        }
        Ok(KernelData {
            impl_name: self.name.clone(),
            kernel: Arc::new(NoopKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{Shape, TensorDesc};

    fn matmul_params() -> KernelParams {
        let mut p = KernelParams::new(OpKind::MatMul, "fc");
        p.inputs.push(TensorDesc::new(Shape::matrix(2, 3), DType::F32));
        p.inputs.push(TensorDesc::new(Shape::matrix(3, 2), DType::F32));
        p.outputs.push(TensorDesc::new(Shape::matrix(2, 2), DType::F32));
        p
    }

    #[test]
    fn test_matmul_kernel_executes() {
        let data = RefMatMul.build(&matmul_params(), 0).unwrap();
        let a = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::from_f32(Shape::matrix(3, 2), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let mut out = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        data.kernel.execute(&[a.view(), b.view()], &mut out).unwrap();
        assert_eq!(out.as_f32_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_fused_relu_post_op() {
        let mut params = matmul_params();
        params.post_ops.push(PostOp::Relu);
        let data = RefMatMul.build(&params, 0).unwrap();

        // Force negative products with a negative weight matrix.
        let a = Tensor::from_f32(Shape::matrix(2, 3), &[1.0; 6]).unwrap();
        let b = Tensor::from_f32(Shape::matrix(3, 2), &[-1.0; 6]).unwrap();
        let mut out = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));

        data.kernel.execute(&[a.view(), b.view()], &mut out).unwrap();
        assert_eq!(out.as_f32_slice(), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fused_sum_post_op() {
        // identity @ b + bias, with the bias riding as the fused extra
        // input.
        let a = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let b = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let bias = Tensor::from_f32(Shape::matrix(2, 2), &[10.0; 4]).unwrap();

        let mut params = KernelParams::new(OpKind::MatMul, "id");
        params.inputs.push(a.desc().clone());
        params.inputs.push(b.desc().clone());
        params.inputs.push(bias.desc().clone());
        params.outputs.push(b.desc().clone());
        params.post_ops.push(PostOp::Sum);

        let data = RefMatMul.build(&params, 0).unwrap();
        let mut out = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 2), DType::F32));
        data.kernel
            .execute(&[a.view(), b.view(), bias.view()], &mut out)
            .unwrap();
        assert_eq!(out.as_f32_slice(), &[11.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn test_matmul_rejects_bad_shapes() {
        let mut params = matmul_params();
        params.inputs[1] = TensorDesc::new(Shape::matrix(5, 2), DType::F32);
        assert!(RefMatMul.build(&params, 0).is_err());
    }

    #[test]
    fn test_relu_in_place_entry() {
        let mut p = KernelParams::new(OpKind::Relu, "act");
        p.inputs.push(TensorDesc::new(Shape::vector(4), DType::F32));
        p.outputs.push(TensorDesc::new(Shape::vector(4), DType::F32));
        let data = RefRelu.build(&p, 0).unwrap();

        let mut io = Tensor::from_f32(Shape::vector(4), &[-1.0, 1.0, -2.0, 2.0]).unwrap();
        data.kernel.execute_in_place(&mut io, &[]).unwrap();
        assert_eq!(io.as_f32_slice(), &[0.0, 1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_add_offers_in_place_config_first() {
        let mut p = KernelParams::new(OpKind::Add, "sum");
        p.inputs.push(TensorDesc::new(Shape::vector(4), DType::F32));
        p.inputs.push(TensorDesc::new(Shape::vector(4), DType::F32));
        p.outputs.push(TensorDesc::new(Shape::vector(4), DType::F32));

        let configs = RefAdd.supported_configs(&p);
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].outputs[0].in_place, Some(0));
        assert_eq!(configs[1].outputs[0].in_place, None);
    }

    #[test]
    fn test_tiled_matmul_prefers_col_major_weights() {
        let configs = TiledMatMul.supported_configs(&matmul_params());
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].inputs[1].desc.layout, Layout::ColMajor);
        assert_eq!(configs[0].inputs[0].desc.layout, Layout::RowMajor);
    }

    #[test]
    fn test_tiled_cost_below_reference() {
        let p = matmul_params();
        assert!(TiledMatMul.estimated_cost(&p) < RefMatMul.estimated_cost(&p));
    }

    #[test]
    fn test_register_all_covers_ops() {
        let mut reg = ImplRegistry::new();
        let id = crate::BackendId(0);
        register_all(&mut reg, id);
        for op in [
            OpKind::MatMul,
            OpKind::Add,
            OpKind::Mul,
            OpKind::Relu,
            OpKind::Softmax,
            OpKind::Concat,
            OpKind::Reorder,
        ] {
            assert!(reg.supports(id, op), "missing {op}");
        }
    }
}
