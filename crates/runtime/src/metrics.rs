// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-node performance counters.
//!
//! Every compiled node gets a counter recording the selected
//! implementation and, after a run, the measured execution time. Absorbed
//! nodes are reported too, marked as such, so callers see where fusion
//! moved the work.

/// How a node participated in the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerfStatus {
    /// The node executed its own kernel.
    Executed,
    /// The node's effect was fused into another node's kernel.
    Absorbed,
    /// The node has not run yet (or the last run was cancelled first).
    NotRun,
}

/// One node's performance record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PerfCounter {
    /// Node name.
    pub node_name: String,
    /// Selected implementation (for absorbed nodes, the host's).
    pub impl_name: String,
    /// Participation in the last run.
    pub status: PerfStatus,
    /// Measured execution time of the last run in microseconds.
    pub micros: u64,
    /// Estimated cost of the selected kernel.
    pub estimated_cost: u64,
}

impl PerfCounter {
    /// Renders one aligned report line.
    pub fn report_line(&self) -> String {
        let status = match self.status {
            PerfStatus::Executed => format!("{}us", self.micros),
            PerfStatus::Absorbed => "absorbed".to_string(),
            PerfStatus::NotRun => "not run".to_string(),
        };
        format!(
            "{:<32} {:<20} {:>12}",
            self.node_name, self.impl_name, status
        )
    }
}
