//! Declarative pipeline construction.
//!
//! A `NodeBlueprint` describes a node tree in JSON: each entry carries the
//! node's parameters, either a meter section or a built-in operation, and
//! its children.

use crate::error::PipelineError;
use crate::meter::MeterParams;
use crate::node::{NodeId, NodeParams, DEFAULT_NODE_NAME};
use crate::operation::OperationSpec;
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Initial state of a meter node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterBlueprint {
    pub value: Option<f64>,
    #[serde(alias = "valueMax")]
    pub value_max: Option<f64>,
}

/// One node of a declarative pipeline, with its subtree.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::{NodeBlueprint, Pack, Pipeline};
///
/// let blueprint = NodeBlueprint::from_json_str(r#"{
///     "name": "root",
///     "operation": {"type": "absorb", "amount": 5},
///     "children": [{"name": "hp", "meter": {"value_max": 50}}]
/// }"#).unwrap();
///
/// let (mut pipeline, root) = Pipeline::from_blueprint(&blueprint).unwrap();
/// pipeline.receive(root, Pack::new(12.0)).unwrap();
///
/// let hp = pipeline.node_by_name("hp").unwrap();
/// assert_eq!(pipeline.meter(hp).unwrap().value(), 43.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeBlueprint {
    #[serde(flatten)]
    pub params: NodeParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter: Option<MeterBlueprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeBlueprint>,
}

impl NodeBlueprint {
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of nodes in this subtree, itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeBlueprint::node_count).sum::<usize>()
    }

    /// Check the whole subtree for errors that would stop it from being
    /// built: a node that is both a meter and an operation, or two
    /// siblings with the same name.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.meter.is_some() && self.operation.is_some() {
            return Err(PipelineError::Blueprint(format!(
                "node {} cannot be both a meter and an operation",
                self.name()
            )));
        }
        for (i, child) in self.children.iter().enumerate() {
            if self.children[..i].iter().any(|c| c.name() == child.name()) {
                return Err(PipelineError::DuplicateChild {
                    parent: self.name().to_string(),
                    child: child.name().to_string(),
                });
            }
            child.validate()?;
        }
        Ok(())
    }

    /// The name the built node will carry.
    fn name(&self) -> &str {
        if self.params.name.is_empty() {
            DEFAULT_NODE_NAME
        } else {
            &self.params.name
        }
    }
}

impl Pipeline {
    /// Build a fresh pipeline from a blueprint. Returns the pipeline and
    /// the id of the root node.
    pub fn from_blueprint(blueprint: &NodeBlueprint) -> Result<(Pipeline, NodeId), PipelineError> {
        let mut pipeline = Pipeline::new();
        let root = pipeline.build(blueprint)?;
        debug!(nodes = pipeline.len(), "Pipeline built from blueprint");
        Ok((pipeline, root))
    }

    /// Add the nodes described by `blueprint` to this pipeline and return
    /// the id of its top node. The new subtree is not linked to existing
    /// nodes.
    ///
    /// The blueprint is validated first, so on error the pipeline is left
    /// unchanged.
    pub fn build(&mut self, blueprint: &NodeBlueprint) -> Result<NodeId, PipelineError> {
        blueprint.validate()?;
        self.build_node(blueprint)
    }

    fn build_node(&mut self, blueprint: &NodeBlueprint) -> Result<NodeId, PipelineError> {
        let id = match (&blueprint.meter, &blueprint.operation) {
            (Some(meter), _) => self.add_meter(MeterParams {
                node: blueprint.params.clone(),
                value: meter.value,
                value_max: meter.value_max,
                ..Default::default()
            }),
            (None, Some(operation)) => {
                let id = self.add_node(blueprint.params.clone());
                if let Some(node) = self.node_mut(id) {
                    node.set_operation(operation.build());
                }
                id
            }
            (None, None) => self.add_node(blueprint.params.clone()),
        };

        for child in &blueprint.children {
            let child_id = self.build_node(child)?;
            self.add_child(id, child_id)?;
        }
        Ok(id)
    }
}
