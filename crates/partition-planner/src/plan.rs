// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Partition plan: the output of the planner.
//!
//! A plan is a sequence of [`SubRequestPlan`]s plus the boundary table.
//! The plan is the contract between the planner, the compiler (which
//! compiles each sub-request's nodes), and the request scheduler (which
//! sequences sub-requests by the recorded boundary dependencies).

use crate::PlannerError;
use graph_ir::{EdgeId, NodeId};
use kernel_select::BackendId;
use std::collections::{BTreeSet, HashMap};

/// One backend-homogeneous fragment of the graph.
#[derive(Debug, Clone)]
pub struct SubRequestPlan {
    /// Index of this sub-request in the plan.
    pub index: usize,
    /// The backend executing every node in this fragment.
    pub backend: BackendId,
    /// Compute nodes (including inserted copies) in execution order.
    pub nodes: Vec<NodeId>,
    /// Blob names this sub-request reads: graph inputs, constants, and
    /// boundary blobs produced elsewhere.
    pub input_names: BTreeSet<String>,
    /// Blob names this sub-request produces: graph outputs and boundary
    /// blobs consumed elsewhere.
    pub output_names: BTreeSet<String>,
    /// Indices of sub-requests that must complete before this one starts.
    pub depends_on: Vec<usize>,
}

impl SubRequestPlan {
    /// Returns the number of nodes in this fragment.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if this sub-request has no upstream dependencies.
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// A tensor crossing sub-request boundaries.
#[derive(Debug, Clone)]
pub struct BoundaryBlob {
    /// Blob name under which the edge is addressable.
    pub name: String,
    /// The crossing edge.
    pub edge: EdgeId,
    /// Index of the producing sub-request.
    pub producer: usize,
    /// Indices of the consuming sub-requests, sorted.
    pub consumers: Vec<usize>,
}

/// The complete planner output.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    /// Policy name that produced this plan.
    pub policy_name: String,
    /// Sub-requests in dependency-compatible order.
    pub subrequests: Vec<SubRequestPlan>,
    /// Boundary blobs between sub-requests.
    pub boundaries: Vec<BoundaryBlob>,
    /// Backend assignment for every node, including data sources and
    /// inserted copies.
    pub assignments: HashMap<NodeId, BackendId>,
    /// Number of copy nodes the planner materialised.
    pub num_copy_nodes: usize,
}

impl PartitionPlan {
    /// Returns the number of sub-requests.
    pub fn num_subrequests(&self) -> usize {
        self.subrequests.len()
    }

    /// Returns the total number of scheduled nodes across sub-requests.
    pub fn total_nodes(&self) -> usize {
        self.subrequests.iter().map(|s| s.num_nodes()).sum()
    }

    /// Validates the plan.
    ///
    /// Checks:
    /// - At least one sub-request, none empty.
    /// - Sub-request indices are consecutive from 0.
    /// - Dependencies only point at earlier sub-requests (the planner
    ///   emits sub-requests in topological order, so anything else is a
    ///   planner defect).
    /// - Every boundary's producer and consumers are valid indices.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.subrequests.is_empty() {
            return Err(PlannerError::NoComputeNodes);
        }

        for (expected, sub) in self.subrequests.iter().enumerate() {
            if sub.index != expected {
                return Err(PlannerError::InvalidPlan {
                    detail: format!("expected sub-request index {expected}, got {}", sub.index),
                });
            }
            if sub.nodes.is_empty() {
                return Err(PlannerError::InvalidPlan {
                    detail: format!("sub-request {} is empty", sub.index),
                });
            }
            for &dep in &sub.depends_on {
                if dep >= sub.index {
                    return Err(PlannerError::InvalidPlan {
                        detail: format!(
                            "sub-request {} depends on {} (not earlier)",
                            sub.index, dep
                        ),
                    });
                }
            }
        }

        for boundary in &self.boundaries {
            if boundary.producer >= self.subrequests.len() {
                return Err(PlannerError::InvalidPlan {
                    detail: format!(
                        "boundary '{}' produced by unknown sub-request {}",
                        boundary.name, boundary.producer
                    ),
                });
            }
            for &consumer in &boundary.consumers {
                if consumer >= self.subrequests.len() || consumer == boundary.producer {
                    return Err(PlannerError::InvalidPlan {
                        detail: format!(
                            "boundary '{}' has invalid consumer {}",
                            boundary.name, consumer
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let nodes_per_sub: Vec<usize> =
            self.subrequests.iter().map(|s| s.num_nodes()).collect();
        format!(
            "Plan '{}': {} sub-requests, {} nodes total, {} boundaries, \
             {} copies, sub-request sizes: {:?}",
            self.policy_name,
            self.num_subrequests(),
            self.total_nodes(),
            self.boundaries.len(),
            self.num_copy_nodes,
            nodes_per_sub,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(index: usize, nodes: Vec<usize>, depends_on: Vec<usize>) -> SubRequestPlan {
        SubRequestPlan {
            index,
            backend: BackendId(0),
            nodes: nodes.into_iter().map(NodeId).collect(),
            input_names: BTreeSet::new(),
            output_names: BTreeSet::new(),
            depends_on,
        }
    }

    fn sample_plan() -> PartitionPlan {
        PartitionPlan {
            policy_name: "test".into(),
            subrequests: vec![
                sub(0, vec![0, 1], vec![]),
                sub(1, vec![2], vec![0]),
                sub(2, vec![3, 4], vec![1]),
            ],
            boundaries: vec![BoundaryBlob {
                name: "fc:out".into(),
                edge: EdgeId(5),
                producer: 0,
                consumers: vec![1],
            }],
            assignments: HashMap::new(),
            num_copy_nodes: 1,
        }
    }

    #[test]
    fn test_validate_ok() {
        sample_plan().validate().unwrap();
    }

    #[test]
    fn test_counts() {
        let plan = sample_plan();
        assert_eq!(plan.num_subrequests(), 3);
        assert_eq!(plan.total_nodes(), 5);
    }

    #[test]
    fn test_validate_empty_plan() {
        let plan = PartitionPlan {
            policy_name: "empty".into(),
            subrequests: vec![],
            boundaries: vec![],
            assignments: HashMap::new(),
            num_copy_nodes: 0,
        };
        assert!(matches!(
            plan.validate(),
            Err(PlannerError::NoComputeNodes)
        ));
    }

    #[test]
    fn test_validate_bad_index() {
        let mut plan = sample_plan();
        plan.subrequests[1].index = 5;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_forward_dependency() {
        let mut plan = sample_plan();
        plan.subrequests[0].depends_on = vec![2];
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_empty_subrequest() {
        let mut plan = sample_plan();
        plan.subrequests[1].nodes.clear();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_self_consuming_boundary() {
        let mut plan = sample_plan();
        plan.boundaries[0].consumers = vec![0];
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_summary() {
        let s = sample_plan().summary();
        assert!(s.contains("3 sub-requests"));
        assert!(s.contains("5 nodes"));
        assert!(s.contains("1 boundaries"));
    }

    #[test]
    fn test_is_root() {
        let plan = sample_plan();
        assert!(plan.subrequests[0].is_root());
        assert!(!plan.subrequests[1].is_root());
    }
}
