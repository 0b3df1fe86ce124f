// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph ingestion from externally supplied node specs.
//!
//! The model loader (an external collaborator) hands the engine a node
//! list: operator types, attribute maps, and tensor descriptors. This
//! module is the serde shape of that hand-off and the translation into a
//! validated [`Graph`] — it is deliberately not a model *file* parser.
//!
//! # JSON Format
//! ```json
//! {
//!   "name": "two-layer",
//!   "inputs": [{ "name": "x", "shape": [1, 4], "dtype": "f32" }],
//!   "constants": [{ "name": "w", "shape": [4, 4], "dtype": "f32", "data": [0.0] }],
//!   "nodes": [
//!     { "name": "fc", "op": "mat_mul", "inputs": ["x", "w"], "shape": [1, 4] },
//!     { "name": "act", "op": "relu", "inputs": ["fc"], "shape": [1, 4] }
//!   ],
//!   "outputs": ["act"]
//! }
//! ```
//!
//! Each node's output edge is addressable by the node's own name.

use crate::{AttrValue, Graph, GraphBuilder, GraphError, Validated};
use std::collections::{BTreeMap, HashMap};
use tensor_core::{DType, Shape, Tensor, TensorDesc};

/// One graph input declaration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

/// One constant declaration with inline data.
///
/// `data` may hold a single value, which is broadcast to fill the shape —
/// convenient for synthetic test graphs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstantSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub data: Vec<f32>,
}

/// One operator node declaration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub op: crate::OpKind,
    /// Names of the edges consumed, in port order.
    pub inputs: Vec<String>,
    /// Output shape of this node.
    pub shape: Vec<usize>,
    /// Output dtype; defaults to `f32`.
    #[serde(default = "default_dtype")]
    pub dtype: DType,
    /// Optional operator attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

fn default_dtype() -> DType {
    DType::F32
}

/// A complete graph description as handed over by the model loader.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphSpec {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub constants: Vec<ConstantSpec>,
    pub nodes: Vec<NodeSpec>,
    pub outputs: Vec<String>,
}

impl GraphSpec {
    /// Parses a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::InvalidSpec(e.to_string()))
    }

    /// Builds and validates the graph this spec describes.
    pub fn into_graph(self) -> Result<Graph<Validated>, GraphError> {
        let mut builder = GraphBuilder::new(self.name.clone());
        let mut edges: HashMap<String, crate::EdgeId> = HashMap::new();

        for input in &self.inputs {
            let desc = TensorDesc::new(Shape::new(input.shape.clone()), input.dtype);
            let edge = builder.add_input(&input.name, desc);
            if edges.insert(input.name.clone(), edge).is_some() {
                return Err(GraphError::DuplicateName {
                    name: input.name.clone(),
                });
            }
        }

        for constant in &self.constants {
            let tensor = constant.materialize()?;
            let edge = builder.add_constant(&constant.name, tensor);
            if edges.insert(constant.name.clone(), edge).is_some() {
                return Err(GraphError::DuplicateName {
                    name: constant.name.clone(),
                });
            }
        }

        for node in &self.nodes {
            let mut input_edges = Vec::with_capacity(node.inputs.len());
            for input_name in &node.inputs {
                let edge = edges.get(input_name).copied().ok_or_else(|| {
                    GraphError::InvalidSpec(format!(
                        "node '{}' consumes unknown edge '{}'",
                        node.name, input_name
                    ))
                })?;
                input_edges.push(edge);
            }
            let desc = TensorDesc::new(Shape::new(node.shape.clone()), node.dtype);
            let (_, edge) = builder.add_node_with_attrs(
                &node.name,
                node.op,
                &input_edges,
                desc,
                node.attrs.clone(),
            );
            if edges.insert(node.name.clone(), edge).is_some() {
                return Err(GraphError::DuplicateName {
                    name: node.name.clone(),
                });
            }
        }

        for output in &self.outputs {
            let edge = edges.get(output).copied().ok_or_else(|| {
                GraphError::InvalidSpec(format!("unknown output edge '{output}'"))
            })?;
            builder.mark_output(edge, output);
        }

        builder.build().validate()
    }
}

impl ConstantSpec {
    /// Materialises the constant tensor, broadcasting a single value if
    /// needed.
    fn materialize(&self) -> Result<Tensor, GraphError> {
        if self.dtype != DType::F32 {
            return Err(GraphError::InvalidSpec(format!(
                "constant '{}': inline data only supports f32",
                self.name
            )));
        }
        let shape = Shape::new(self.shape.clone());
        let n = shape.num_elements();
        let values: Vec<f32> = if self.data.len() == 1 {
            vec![self.data[0]; n]
        } else {
            self.data.clone()
        };
        Tensor::from_f32(shape, &values).map_err(|e| {
            GraphError::InvalidSpec(format!("constant '{}': {e}", self.name))
        })
    }
}
