// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: graph construction → partitioning → compilation →
//! request execution, across one and two backends.

use graph_ir::{GraphBuilder, GraphSpec, OpKind};
use kernel_select::{
    reference, BackendDesc, BackendId, CandidateImpl, CapabilityKey, ImplConfig, ImplRegistry,
    InProcessRunner, Kernel, KernelAttemptError, KernelData, KernelError, KernelParams,
    TuningCache, TuningMode,
};
use partition_planner::{ExplicitAffinity, SingleBackend};
use runtime::{compile, CompiledModel, PerfStatus, RequestStatus, RuntimeConfig, RuntimeError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tensor_core::{DType, Layout, Shape, Tensor, TensorDesc, TensorView};

// ── Helpers ────────────────────────────────────────────────────────

fn cpu() -> BackendId {
    BackendId(0)
}

fn accel() -> BackendId {
    BackendId(1)
}

fn two_backend_registry() -> ImplRegistry {
    let mut reg = ImplRegistry::new();
    reg.add_backend(BackendDesc::new(cpu(), "cpu", "cpu-test"));
    reg.add_backend(BackendDesc::new(accel(), "accel", "accel-test"));
    reference::register_all(&mut reg, cpu());
    reference::register_all(&mut reg, accel());
    reg
}

fn desc(rows: usize, cols: usize) -> TensorDesc {
    TensorDesc::new(Shape::matrix(rows, cols), DType::F32)
}

/// x[1,4] @ w[4,4] → relu → softmax → y
fn mlp_graph() -> graph_ir::Graph<graph_ir::Validated> {
    let mut b = GraphBuilder::new("mlp");
    let x = b.add_input("x", desc(1, 4));
    let w = b.add_constant(
        "w",
        Tensor::from_f32(
            Shape::matrix(4, 4),
            // Identity with one negative row to exercise relu.
            &[
                1.0, 0.0, 0.0, 0.0, //
                0.0, -1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        )
        .unwrap(),
    );
    let (_, mm) = b.add_node("fc", OpKind::MatMul, &[x, w], desc(1, 4));
    let (_, act) = b.add_node("act", OpKind::Relu, &[mm], desc(1, 4));
    let (_, sm) = b.add_node("probs", OpKind::Softmax, &[act], desc(1, 4));
    b.mark_output(sm, "y");
    b.build().validate().unwrap()
}

fn compile_mlp(
    registry: &ImplRegistry,
    policy: &dyn partition_planner::BackendPolicy,
) -> CompiledModel {
    let mut cache = TuningCache::in_memory();
    compile(
        mlp_graph(),
        policy,
        registry,
        &mut cache,
        &RuntimeConfig::default(),
        None,
    )
    .unwrap()
}

fn softmax_of(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ── End-to-end, single backend ─────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_single_backend() {
    let registry = two_backend_registry();
    let model = compile_mlp(&registry, &SingleBackend::new(cpu()));
    assert_eq!(model.num_subgraphs(), 1);

    let request = model.create_request();
    request
        .set_blob(
            "x",
            Tensor::from_f32(Shape::matrix(1, 4), &[1.0, 2.0, 3.0, 4.0]).unwrap(),
        )
        .unwrap();

    let status = request.infer().await.unwrap();
    assert!(status.is_ready());

    // fc = [1, -2, 3, 4]; relu = [1, 0, 3, 4]; softmax of that.
    let expected = softmax_of(&[1.0, 0.0, 3.0, 4.0]);
    let y = request.get_blob("y").unwrap();
    for (got, want) in y.as_f32_slice().iter().zip(&expected) {
        assert!((got - want).abs() < 1e-5, "got {got}, want {want}");
    }
}

// ── End-to-end, heterogeneous ──────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_heterogeneous_matches_single_backend() {
    let registry = two_backend_registry();
    let single = compile_mlp(&registry, &SingleBackend::new(cpu()));
    let hetero = compile_mlp(
        &registry,
        &ExplicitAffinity::from_pairs(&[("act", accel())], cpu()),
    );
    // cpu(fc) → accel(act) → cpu(probs): three sub-graphs with copies.
    assert_eq!(hetero.num_subgraphs(), 3);

    let input = Tensor::from_f32(Shape::matrix(1, 4), &[0.5, -1.5, 2.5, 3.5]).unwrap();

    let run = |model: &CompiledModel| {
        let request = model.create_request();
        request.set_blob("x", input.clone()).unwrap();
        request
    };
    let single_req = run(&single);
    let hetero_req = run(&hetero);

    assert!(single_req.infer().await.unwrap().is_ready());
    assert!(hetero_req.infer().await.unwrap().is_ready());

    let a = single_req.get_blob("y").unwrap();
    let b = hetero_req.get_blob("y").unwrap();
    for (x, y) in a.as_f32_slice().iter().zip(b.as_f32_slice()) {
        assert!((x - y).abs() < 1e-6, "hetero diverged: {x} vs {y}");
    }
}

#[tokio::test]
async fn test_hetero_fusion_disabled_across_boundary() {
    let registry = two_backend_registry();
    let hetero = compile_mlp(
        &registry,
        &ExplicitAffinity::from_pairs(&[("act", accel())], cpu()),
    );
    let request = hetero.create_request();
    request.infer().await.unwrap();

    // Both fc and act executed as their own steps.
    let perf = request.performance();
    assert_eq!(perf["fc"].status, PerfStatus::Executed);
    assert_eq!(perf["act"].status, PerfStatus::Executed);
}

// ── Fusion observability ───────────────────────────────────────────

#[tokio::test]
async fn test_fused_relu_reported_absorbed() {
    let registry = two_backend_registry();
    let model = compile_mlp(&registry, &SingleBackend::new(cpu()));
    let request = model.create_request();
    request.infer().await.unwrap();

    let perf = request.performance();
    assert_eq!(perf["act"].status, PerfStatus::Absorbed);
    assert_eq!(perf["act"].impl_name, perf["fc"].impl_name);
    assert_eq!(perf["fc"].status, PerfStatus::Executed);
    assert_eq!(perf["probs"].status, PerfStatus::Executed);
}

// ── Concurrency: exactly one start wins ────────────────────────────

/// A kernel that sleeps before copying input to output, to hold the
/// request busy deterministically.
struct SleepyKernel {
    millis: u64,
}

impl Kernel for SleepyKernel {
    fn execute(
        &self,
        inputs: &[TensorView<'_>],
        output: &mut Tensor,
    ) -> Result<(), KernelError> {
        std::thread::sleep(Duration::from_millis(self.millis));
        output
            .as_bytes_mut()
            .copy_from_slice(inputs[0].as_bytes());
        Ok(())
    }
}

struct SleepyRelu {
    millis: u64,
}

impl CandidateImpl for SleepyRelu {
    fn name(&self) -> &str {
        "relu_sleepy"
    }
    fn supported_key(&self) -> CapabilityKey {
        CapabilityKey::empty()
            .with_dtype(DType::F32)
            .with_layout(Layout::RowMajor)
    }
    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        reference::RefRelu.supported_configs(params)
            .into_iter()
            .map(|mut config| {
                // No in-place: always a plain copy config.
                for output in &mut config.outputs {
                    output.in_place = None;
                }
                config
            })
            .collect()
    }
    fn estimated_cost(&self, _params: &KernelParams) -> u64 {
        1
    }
    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(SleepyKernel { millis: self.millis }),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

fn sleepy_model(millis: u64) -> CompiledModel {
    let mut reg = ImplRegistry::new();
    reg.add_backend(BackendDesc::new(cpu(), "cpu", "cpu-test"));
    reg.register(cpu(), OpKind::Relu, Arc::new(SleepyRelu { millis }));
    reg.register(cpu(), OpKind::Reorder, Arc::new(reference::RefReorder));

    let mut b = GraphBuilder::new("sleepy");
    let x = b.add_input("x", desc(1, 4));
    let (_, e) = b.add_node("slow", OpKind::Relu, &[x], desc(1, 4));
    b.mark_output(e, "y");
    let graph = b.build().validate().unwrap();

    let mut cache = TuningCache::in_memory();
    compile(
        graph,
        &SingleBackend::new(cpu()),
        &reg,
        &mut cache,
        &RuntimeConfig::default(),
        None,
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_exactly_one_wins() {
    let model = sleepy_model(150);
    let request = model.create_request();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    request
        .set_callback(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let r1 = request.clone();
    let r2 = request.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { r1.start() }),
        tokio::spawn(async move { r2.start() }),
    );
    let results = [a.unwrap(), b.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let busy = results
        .iter()
        .filter(|r| matches!(r, Err(RuntimeError::RequestBusy)))
        .count();
    assert_eq!(wins, 1, "exactly one start must win");
    assert_eq!(busy, 1, "the loser must observe RequestBusy");

    let status = request.wait(Some(Duration::from_secs(5))).await;
    assert!(status.is_ready());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "callback fires exactly once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_zero_while_busy_is_timeout() {
    let model = sleepy_model(150);
    let request = model.create_request();
    request.start().unwrap();

    let probe = request.wait(Some(Duration::ZERO)).await;
    assert_eq!(probe, RequestStatus::Timeout);
    assert!(request.is_busy());

    let final_status = request.wait(Some(Duration::from_secs(5))).await;
    assert!(final_status.is_ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_short_wait_times_out_without_cancelling() {
    let model = sleepy_model(200);
    let request = model.create_request();
    request.start().unwrap();

    let early = request.wait(Some(Duration::from_millis(20))).await;
    assert_eq!(early, RequestStatus::Timeout);

    // The run was not disturbed.
    let done = request.wait(Some(Duration::from_secs(5))).await;
    assert!(done.is_ready());
}

// ── Failure handling ───────────────────────────────────────────────

struct FailingKernel;

impl Kernel for FailingKernel {
    fn execute(
        &self,
        _inputs: &[TensorView<'_>],
        _output: &mut Tensor,
    ) -> Result<(), KernelError> {
        Err(KernelError::Invocation("injected failure".into()))
    }
}

struct FailingRelu;

impl CandidateImpl for FailingRelu {
    fn name(&self) -> &str {
        "relu_failing"
    }
    fn supported_key(&self) -> CapabilityKey {
        CapabilityKey::empty()
            .with_dtype(DType::F32)
            .with_layout(Layout::RowMajor)
    }
    fn supported_configs(&self, params: &KernelParams) -> Vec<ImplConfig> {
        reference::RefRelu.supported_configs(params)
    }
    fn estimated_cost(&self, _params: &KernelParams) -> u64 {
        1
    }
    fn build(
        &self,
        params: &KernelParams,
        _tune_index: i32,
    ) -> Result<KernelData, KernelAttemptError> {
        Ok(KernelData {
            impl_name: self.name().to_string(),
            kernel: Arc::new(FailingKernel),
            estimated_cost: self.estimated_cost(params),
            tune_index: 0,
            measured_us: None,
        })
    }
}

#[tokio::test]
async fn test_execution_failure_surfaces_as_status() {
    let mut reg = ImplRegistry::new();
    reg.add_backend(BackendDesc::new(cpu(), "cpu", "cpu-test"));
    reg.register(cpu(), OpKind::Relu, Arc::new(FailingRelu));

    let mut b = GraphBuilder::new("failing");
    let x = b.add_input("x", desc(1, 4));
    let (_, e) = b.add_node("bad", OpKind::Relu, &[x], desc(1, 4));
    b.mark_output(e, "y");
    let graph = b.build().validate().unwrap();

    let mut cache = TuningCache::in_memory();
    let model = compile(
        graph,
        &SingleBackend::new(cpu()),
        &reg,
        &mut cache,
        &RuntimeConfig::default(),
        None,
    )
    .unwrap();

    let request = model.create_request();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    request
        .set_callback(move |status| {
            assert!(matches!(status, RequestStatus::Failed(_)));
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    request.start().unwrap();
    let status = request.wait(Some(Duration::from_secs(5))).await;
    match status {
        RequestStatus::Failed(message) => assert!(message.contains("bad")),
        other => panic!("expected Failed, got {other:?}"),
    }

    // Failure is observable, not sticky: the request is reusable.
    assert!(!request.is_busy());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let again = request.start();
    assert!(again.is_ok());
    let status = request.wait(Some(Duration::from_secs(5))).await;
    assert!(matches!(status, RequestStatus::Failed(_)));
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_suppresses_pending_subrequests() {
    // Two sub-requests in sequence: slow relu on cpu, then a cpu→accel
    // boundary into a second relu.
    let mut reg = ImplRegistry::new();
    reg.add_backend(BackendDesc::new(cpu(), "cpu", "cpu-test"));
    reg.add_backend(BackendDesc::new(accel(), "accel", "accel-test"));
    reg.register(cpu(), OpKind::Relu, Arc::new(SleepyRelu { millis: 150 }));
    reg.register(cpu(), OpKind::Reorder, Arc::new(reference::RefReorder));
    reference::register_all(&mut reg, accel());

    let mut b = GraphBuilder::new("cancellable");
    let x = b.add_input("x", desc(1, 4));
    let (_, e1) = b.add_node("slow", OpKind::Relu, &[x], desc(1, 4));
    let (_, e2) = b.add_node("after", OpKind::Relu, &[e1], desc(1, 4));
    b.mark_output(e2, "y");
    let graph = b.build().validate().unwrap();

    let policy = ExplicitAffinity::from_pairs(&[("after", accel())], cpu());
    let mut cache = TuningCache::in_memory();
    let model = compile(
        graph,
        &policy,
        &reg,
        &mut cache,
        &RuntimeConfig::default(),
        None,
    )
    .unwrap();
    assert_eq!(model.num_subgraphs(), 2);

    let request = model.create_request();
    request.start().unwrap();
    // Cancel while the first (sleepy) sub-request is still running.
    tokio::time::sleep(Duration::from_millis(20)).await;
    request.cancel();

    let status = request.wait(Some(Duration::from_secs(5))).await;
    assert_eq!(status, RequestStatus::Cancelled);

    // The second sub-request never ran.
    let perf = request.performance();
    assert_eq!(perf["after"].status, PerfStatus::NotRun);
}

// ── Tuning cache end-to-end ────────────────────────────────────────

#[tokio::test]
async fn test_tuning_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("tuning.cache");
    let registry = two_backend_registry();

    // First compile: online tuning with the in-process runner.
    let tuned_impl = {
        let mut cache = TuningCache::open(&cache_path).unwrap();
        let config = RuntimeConfig {
            tuning_mode: TuningMode::TuneAndCache,
            tuning_cache: Some(cache_path.clone()),
            ..Default::default()
        };
        let runner = InProcessRunner::default();
        let model = compile(
            mlp_graph(),
            &SingleBackend::new(cpu()),
            &registry,
            &mut cache,
            &config,
            Some(&runner),
        )
        .unwrap();
        assert!(!cache.is_empty(), "tuning must persist winners");

        let request = model.create_request();
        request.infer().await.unwrap();
        request.performance()["fc"].impl_name.clone()
    };

    let content = std::fs::read_to_string(&cache_path).unwrap();
    assert!(!content.is_empty());
    assert!(content.contains(&tuned_impl));

    // Second compile: tuning disabled, no runner — offline hits only.
    let mut cache = TuningCache::open(&cache_path).unwrap();
    let config = RuntimeConfig::default();
    let model = compile(
        mlp_graph(),
        &SingleBackend::new(cpu()),
        &registry,
        &mut cache,
        &config,
        None,
    )
    .unwrap();

    let request = model.create_request();
    request.infer().await.unwrap();
    assert_eq!(request.performance()["fc"].impl_name, tuned_impl);
}

// ── Graph spec ingestion ───────────────────────────────────────────

#[tokio::test]
async fn test_compile_from_json_spec() {
    let json = r#"{
        "name": "spec-model",
        "inputs": [{ "name": "x", "shape": [1, 2], "dtype": "f32" }],
        "constants": [{ "name": "w", "shape": [2, 2], "dtype": "f32", "data": [1.0, 2.0, 3.0, 4.0] }],
        "nodes": [
            { "name": "fc", "op": "mat_mul", "inputs": ["x", "w"], "shape": [1, 2] },
            { "name": "act", "op": "relu", "inputs": ["fc"], "shape": [1, 2] }
        ],
        "outputs": ["act"]
    }"#;
    let graph = GraphSpec::from_json(json).unwrap().into_graph().unwrap();

    let registry = two_backend_registry();
    let mut cache = TuningCache::in_memory();
    let model = compile(
        graph,
        &SingleBackend::new(cpu()),
        &registry,
        &mut cache,
        &RuntimeConfig::default(),
        None,
    )
    .unwrap();

    let request = model.create_request();
    request
        .set_blob("x", Tensor::from_f32(Shape::matrix(1, 2), &[1.0, -1.0]).unwrap())
        .unwrap();
    request.infer().await.unwrap();

    // [1, -1] @ [[1, 2], [3, 4]] = [-2, -2]; relu → [0, 0].
    let y = request.get_blob("act").unwrap();
    assert_eq!(y.as_f32_slice(), &[0.0, 0.0]);
}
