// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # hetero-rt
//!
//! Command-line interface for the heterogeneous inference runtime.
//!
//! ## Usage
//! ```bash
//! # Compile and run a JSON-described graph on the cpu backend
//! hetero-rt run --graph ./graph.json
//!
//! # Split across both built-in backends and tune kernels online
//! hetero-rt run --graph ./graph.json --affinity act=accel --tune --cache ./tuning.cache
//!
//! # Inspect the topological order and partition plan
//! hetero-rt inspect --graph ./graph.json --affinity act=accel
//!
//! # Dump the offline tuning cache
//! hetero-rt cache --file ./tuning.cache
//! ```
//!
//! The graph file holds the node-spec hand-off format of `graph-ir`
//! (operator types, attribute maps, tensor descriptors) — not a model
//! file format; model deserialization lives with the embedding
//! application.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hetero-rt",
    about = "Execution-graph compiler and dispatch engine for heterogeneous backends",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a graph, run one inference, and print outputs + timings.
    Run {
        /// Path to the graph spec (JSON node list).
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Per-node backend affinities, e.g. "act=accel,fc=cpu".
        #[arg(short, long)]
        affinity: Option<String>,

        /// Enable online kernel tuning (measures candidates, persists
        /// winners to the cache file).
        #[arg(long)]
        tune: bool,

        /// Tuning cache file (read offline; appended when tuning).
        #[arg(long)]
        cache: Option<std::path::PathBuf>,

        /// Input blob values, e.g. "x=1.0,2.0,3.0,4.0". Unbound inputs
        /// stay zero-filled.
        #[arg(short, long)]
        input: Vec<String>,
    },

    /// Print the topological order and the partition plan for a graph.
    Inspect {
        /// Path to the graph spec (JSON node list).
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Per-node backend affinities, e.g. "act=accel".
        #[arg(short, long)]
        affinity: Option<String>,
    },

    /// Dump the offline tuning cache.
    Cache {
        /// Path to the cache file.
        #[arg(short, long)]
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            graph,
            affinity,
            tune,
            cache,
            input,
        } => commands::run::execute(graph, affinity, tune, cache, input, cli.config).await,
        Commands::Inspect { graph, affinity } => {
            commands::inspect::execute(graph, affinity)
        }
        Commands::Cache { file } => commands::cache::execute(file),
    }
}
