// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The `run` subcommand: compile, execute once, report.

use kernel_select::{InProcessRunner, TuningCache, TuningMode};
use runtime::{PerfStatus, RuntimeConfig};
use std::path::PathBuf;
use tensor_core::Tensor;

pub async fn execute(
    graph_path: PathBuf,
    affinity: Option<String>,
    tune: bool,
    cache_path: Option<PathBuf>,
    inputs: Vec<String>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let graph = super::load_graph(&graph_path)?;
    let registry = super::builtin_registry();
    let policy = super::parse_policy(affinity.as_deref())?;

    let mut config = match &config_path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if tune {
        config.tuning_mode = TuningMode::TuneAndCache;
    }
    if cache_path.is_some() {
        config.tuning_cache = cache_path.clone();
    }

    let mut cache = match &config.tuning_cache {
        Some(path) => TuningCache::open(path)?,
        None => TuningCache::in_memory(),
    };
    let runner = InProcessRunner::default();
    let runner_ref = tune.then_some(&runner as &dyn kernel_select::BenchmarkRunner);

    let model = runtime::compile(
        graph,
        policy.as_ref(),
        &registry,
        &mut cache,
        &config,
        runner_ref,
    )?;
    println!("{}", model.summary());

    let request = model.create_request();
    for binding in &inputs {
        let (name, values) = binding
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("bad input '{binding}', expected name=v1,v2,..."))?;
        let values: Vec<f32> = values
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("bad value in '{binding}': {e}"))?;
        let desc = model
            .blob_desc(name)
            .ok_or_else(|| anyhow::anyhow!("unknown input '{name}'"))?
            .clone();
        request.set_blob(name, Tensor::from_f32(desc.shape.clone(), &values)?)?;
    }

    let status = request.infer().await?;
    println!("status: {status:?}");

    for name in model.output_names() {
        let blob = request.get_blob(name)?;
        println!("{name} = {:?}", blob.as_f32_slice());
    }

    println!("\nper-node performance:");
    let mut counters: Vec<_> = request.performance().into_values().collect();
    counters.sort_by_key(|c| (c.status != PerfStatus::Executed, std::cmp::Reverse(c.micros)));
    for counter in counters {
        println!("  {}", counter.report_line());
    }

    Ok(())
}
