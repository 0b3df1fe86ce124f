// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Demonstrates heterogeneous execution: the same small network compiled
//! onto one backend and split across two, with per-node timings.
//!
//! ```bash
//! cargo run --example hetero_demo
//! ```

use graph_ir::{GraphBuilder, OpKind};
use kernel_select::{reference, BackendDesc, BackendId, ImplRegistry, TuningCache};
use partition_planner::{ExplicitAffinity, SingleBackend};
use runtime::{compile, RuntimeConfig};
use tensor_core::{DType, Shape, Tensor, TensorDesc};

const CPU: BackendId = BackendId(0);
const ACCEL: BackendId = BackendId(1);

fn registry() -> ImplRegistry {
    let mut registry = ImplRegistry::new();
    registry.add_backend(BackendDesc::new(CPU, "cpu", "demo-cpu"));
    registry.add_backend(BackendDesc::new(ACCEL, "accel", "demo-accel"));
    reference::register_all(&mut registry, CPU);
    reference::register_all(&mut registry, ACCEL);
    registry
}

fn demo_graph() -> graph_ir::Graph<graph_ir::Validated> {
    let hidden = 64;
    let desc = |cols| TensorDesc::new(Shape::matrix(1, cols), DType::F32);

    let mut b = GraphBuilder::new("demo");
    let x = b.add_input("x", desc(hidden));
    let w1 = b.add_constant(
        "w1",
        Tensor::from_f32(
            Shape::matrix(hidden, hidden),
            &vec![0.05; hidden * hidden],
        )
        .unwrap(),
    );
    let w2 = b.add_constant(
        "w2",
        Tensor::from_f32(Shape::matrix(hidden, 8), &vec![0.1; hidden * 8]).unwrap(),
    );
    let (_, h) = b.add_node("fc1", OpKind::MatMul, &[x, w1], desc(hidden));
    let (_, a) = b.add_node("act1", OpKind::Relu, &[h], desc(hidden));
    let (_, logits) = b.add_node("fc2", OpKind::MatMul, &[a, w2], desc(8));
    let (_, probs) = b.add_node("probs", OpKind::Softmax, &[logits], desc(8));
    b.mark_output(probs, "y");
    b.build().validate().unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let registry = registry();
    let config = RuntimeConfig::default();
    let input = Tensor::from_f32(Shape::matrix(1, 64), &[0.5; 64]).unwrap();

    for (label, policy) in [
        (
            "single backend (cpu)",
            Box::new(SingleBackend::new(CPU)) as Box<dyn partition_planner::BackendPolicy>,
        ),
        (
            "heterogeneous (fc2 on accel)",
            Box::new(ExplicitAffinity::from_pairs(&[("fc2", ACCEL)], CPU)),
        ),
    ] {
        let mut cache = TuningCache::in_memory();
        let model = compile(
            demo_graph(),
            policy.as_ref(),
            &registry,
            &mut cache,
            &config,
            None,
        )?;

        println!("== {label}");
        println!("{}", model.summary());

        let request = model.create_request();
        request.set_blob("x", input.clone())?;
        let status = request.infer().await?;
        println!("status: {status:?}");

        let y = request.get_blob("y")?;
        println!("y[0..4] = {:?}", &y.as_f32_slice()[..4]);
        for (_, counter) in request.performance() {
            println!("  {}", counter.report_line());
        }
        println!();
    }

    Ok(())
}
