// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CLI subcommands and shared helpers.

pub mod cache;
pub mod inspect;
pub mod run;

use kernel_select::{reference, BackendDesc, BackendId, ImplRegistry};
use partition_planner::{BackendPolicy, ExplicitAffinity, SingleBackend};
use std::collections::HashMap;
use std::path::Path;

/// The built-in CPU backend id.
pub const CPU: BackendId = BackendId(0);
/// The built-in (virtual) accelerator backend id.
pub const ACCEL: BackendId = BackendId(1);

/// Initialises tracing from the `-v` count (or `RUST_LOG` when set).
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Builds the registry of built-in backends: a `cpu` backend and a
/// second `accel` backend carrying the same reference implementations.
///
/// A real deployment registers vendor implementations here instead; the
/// CLI's accelerator exists so heterogeneous plans can be exercised
/// end-to-end on any machine.
pub fn builtin_registry() -> ImplRegistry {
    let mut registry = ImplRegistry::new();
    registry.add_backend(BackendDesc::new(CPU, "cpu", "builtin-cpu"));
    registry.add_backend(BackendDesc::new(ACCEL, "accel", "builtin-accel"));
    reference::register_all(&mut registry, CPU);
    reference::register_all(&mut registry, ACCEL);
    registry
}

/// Resolves a backend name used on the command line.
pub fn backend_by_name(name: &str) -> anyhow::Result<BackendId> {
    match name {
        "cpu" => Ok(CPU),
        "accel" => Ok(ACCEL),
        other => anyhow::bail!("unknown backend '{other}' (expected 'cpu' or 'accel')"),
    }
}

/// Parses `--affinity fc=accel,act=cpu` into a policy.
pub fn parse_policy(affinity: Option<&str>) -> anyhow::Result<Box<dyn BackendPolicy>> {
    let Some(spec) = affinity else {
        return Ok(Box::new(SingleBackend::new(CPU)));
    };

    let mut map = HashMap::new();
    for pair in spec.split(',') {
        let (node, backend) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("bad affinity '{pair}', expected node=backend"))?;
        map.insert(node.trim().to_string(), backend_by_name(backend.trim())?);
    }
    Ok(Box::new(ExplicitAffinity::new(map, CPU)))
}

/// Loads a graph spec from a JSON file and builds the validated graph.
pub fn load_graph(
    path: &Path,
) -> anyhow::Result<graph_ir::Graph<graph_ir::Validated>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", path.display()))?;
    let spec = graph_ir::GraphSpec::from_json(&json)?;
    Ok(spec.into_graph()?)
}
