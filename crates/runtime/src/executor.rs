// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sub-request execution: runs one compiled step list against the blob
//! table.

use crate::{BlobTableLock, PerfStatus, RuntimeError};
use graph_compiler::{CompiledSubgraph, ExecStep};
use kernel_select::Kernel as _;
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{Tensor, TensorView};

/// Executes every step of `sub` in order.
///
/// The blob table lock is held only to fetch and publish buffers, never
/// across kernel execution, so independent sub-requests overlap freely.
pub(crate) fn execute_subgraph(
    sub: &CompiledSubgraph,
    blobs: &BlobTableLock,
    perf: &crate::PerfTableLock,
    profiling: bool,
) -> Result<(), RuntimeError> {
    tracing::debug!(
        "executing sub-request {} ({} steps) on {}",
        sub.index,
        sub.steps.len(),
        sub.backend,
    );

    for step in &sub.steps {
        let start = Instant::now();
        execute_step(step, blobs)?;

        if profiling {
            let micros = start.elapsed().as_micros().max(1) as u64;
            let mut table = perf.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = table.get_mut(&step.node_name) {
                counter.status = PerfStatus::Executed;
                counter.micros = micros;
            }
        }
    }

    Ok(())
}

fn execute_step(step: &ExecStep, blobs: &BlobTableLock) -> Result<(), RuntimeError> {
    let missing = |edge: graph_ir::EdgeId| RuntimeError::MissingBuffer {
        node: step.node_name.clone(),
        edge: format!("{edge}"),
    };

    let produced = match step.in_place {
        Some(alias) => {
            // The aliased buffer leaves the table outright; in-place
            // descriptors are only negotiated onto single-consumer edges,
            // so the reference taken here is the last one and the buffer
            // can be mutated without a copy.
            let (aliased, extra_arcs) = {
                let mut table = blobs.lock().unwrap_or_else(|e| e.into_inner());
                let aliased = table
                    .take(step.inputs[alias])
                    .ok_or_else(|| missing(step.inputs[alias]))?;
                let extra_arcs: Vec<Arc<Tensor>> = step
                    .inputs
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != alias)
                    .map(|(_, &edge)| table.get(edge).ok_or_else(|| missing(edge)))
                    .collect::<Result<_, _>>()?;
                (aliased, extra_arcs)
            };
            let mut io = Arc::try_unwrap(aliased).unwrap_or_else(|arc| (*arc).clone());

            let extra: Vec<TensorView<'_>> = extra_arcs.iter().map(|t| t.view()).collect();
            step.kernel
                .execute_in_place(&mut io, &extra)
                .map_err(|e| RuntimeError::Execution {
                    node: step.node_name.clone(),
                    detail: e.to_string(),
                })?;
            io
        }
        None => {
            // Fetch input handles under the lock, then release it for
            // compute.
            let input_arcs: Vec<Arc<Tensor>> = {
                let table = blobs.lock().unwrap_or_else(|e| e.into_inner());
                step.inputs
                    .iter()
                    .map(|&edge| table.get(edge).ok_or_else(|| missing(edge)))
                    .collect::<Result<_, _>>()?
            };
            let views: Vec<TensorView<'_>> = input_arcs.iter().map(|t| t.view()).collect();
            let mut output = Tensor::zeros(step.output_desc.clone());
            step.kernel
                .execute(&views, &mut output)
                .map_err(|e| RuntimeError::Execution {
                    node: step.node_name.clone(),
                    detail: e.to_string(),
                })?;
            output
        }
    };

    let mut table = blobs.lock().unwrap_or_else(|e| e.into_inner());
    table.insert(step.output, Arc::new(produced));
    Ok(())
}
