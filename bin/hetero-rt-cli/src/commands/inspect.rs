// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The `inspect` subcommand: topological order and partition plan.

use std::path::PathBuf;

pub fn execute(graph_path: PathBuf, affinity: Option<String>) -> anyhow::Result<()> {
    let graph = super::load_graph(&graph_path)?;
    let registry = super::builtin_registry();
    let policy = super::parse_policy(affinity.as_deref())?;

    println!("{}", graph.summary());

    let order = graph.topo_order()?;
    println!("\ntopological order:");
    for node_id in &order {
        let node = graph.node(*node_id);
        println!("  {}", node.summary());
    }

    let (graph, plan) = partition_planner::partition(graph, policy.as_ref(), &registry)?;
    println!("\n{}", plan.summary());
    for sub in &plan.subrequests {
        let backend = registry
            .backend(sub.backend)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| sub.backend.to_string());
        let nodes: Vec<&str> = sub
            .nodes
            .iter()
            .map(|&n| graph.node(n).name.as_str())
            .collect();
        println!(
            "  sub-request {} on {backend}: {:?} (reads {:?}, writes {:?}, after {:?})",
            sub.index, nodes, sub.input_names, sub.output_names, sub.depends_on,
        );
    }
    for boundary in &plan.boundaries {
        println!(
            "  boundary '{}' produced by {} for {:?}",
            boundary.name, boundary.producer, boundary.consumers,
        );
    }

    Ok(())
}
