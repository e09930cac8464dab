//! Pipeline node module.
//!
//! A `PipelineNode` is one stop in the damage tree. It owns the packs it is
//! currently processing, a tag filter, its behavioral flags, and either a
//! pluggable operation or a meter. Links to children are kept as `NodeId`s
//! into the owning [`Pipeline`](crate::Pipeline), which drives processing.

use crate::meter::MeterNode;
use crate::operation::{PackOperation, Passthrough};
use crate::pack::Pack;
use crate::signal::{PackListener, Signal};
use crate::tag::{push_unique, Tag};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Identifier of a node inside a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    /// Position of the node in its pipeline, in creation order.
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0.index())
    }
}

/// Name given to nodes created without one.
pub const DEFAULT_NODE_NAME: &str = "Unnamed Node";

/// Behavioral configuration shared by every node kind.
///
/// Field names also accept the camelCase spelling when deserialized.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::NodeParams;
///
/// let params: NodeParams = serde_json::from_str(
///     r#"{"name": "armor", "tags": ["physical"], "processTopDown": true}"#,
/// ).unwrap();
/// assert_eq!(params.name, "armor");
/// assert!(params.process_top_down);
/// assert!(params.do_default_dispatch);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeParams {
    /// Name used by parents to select this node; unique among siblings.
    pub name: String,
    /// Tag filter. Empty means every pack is operated on.
    pub tags: Vec<Tag>,
    /// Child that receives packs from the default dispatch.
    #[serde(alias = "defaultChildIndex")]
    pub default_child_index: usize,
    /// Forward surviving packs to the default child after processing.
    #[serde(alias = "doDefaultDispatch")]
    pub do_default_dispatch: bool,
    /// Process as soon as a pack is received.
    #[serde(alias = "processOnReceive")]
    pub process_on_receive: bool,
    /// Visit the root pack before its sub-packs.
    #[serde(alias = "processTopDown")]
    pub process_top_down: bool,
}

impl NodeParams {
    /// Default parameters with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a filter tag (builder style).
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        push_unique(&mut self.tags, tag.into());
        self
    }
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            name: DEFAULT_NODE_NAME.to_string(),
            tags: Vec::new(),
            default_child_index: 0,
            do_default_dispatch: true,
            process_on_receive: true,
            process_top_down: false,
        }
    }
}

pub(crate) enum NodeBehavior {
    Operation(Rc<dyn PackOperation>),
    Meter(Box<MeterNode>),
}

/// A named node that filters, transforms and forwards packs.
pub struct PipelineNode {
    name: String,
    tags: Vec<Tag>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) held: Vec<Pack>,
    behavior: NodeBehavior,

    pub default_child_index: usize,
    pub do_default_dispatch: bool,
    pub process_on_receive: bool,
    pub process_top_down: bool,

    /// Fired with `(node, pack)` just before a pack is handed to another node.
    pub on_dispatch: Signal<PackListener>,
    /// Fired with `(node, pack)` when an operation leaves a pack exhausted.
    pub on_exhaust: Signal<PackListener>,
}

impl PipelineNode {
    pub(crate) fn relay(params: NodeParams, operation: Rc<dyn PackOperation>) -> Self {
        Self::with_behavior(params, NodeBehavior::Operation(operation))
    }

    pub(crate) fn metered(params: NodeParams, meter: MeterNode) -> Self {
        Self::with_behavior(params, NodeBehavior::Meter(Box::new(meter)))
    }

    fn with_behavior(params: NodeParams, behavior: NodeBehavior) -> Self {
        let mut tags = Vec::new();
        for tag in params.tags {
            push_unique(&mut tags, tag);
        }
        let name = if params.name.is_empty() {
            DEFAULT_NODE_NAME.to_string()
        } else {
            params.name
        };
        Self {
            name,
            tags,
            children: Vec::new(),
            held: Vec::new(),
            behavior,
            default_child_index: params.default_child_index,
            do_default_dispatch: params.do_default_dispatch,
            process_on_receive: params.process_on_receive,
            process_top_down: params.process_top_down,
            on_dispatch: Signal::new(),
            on_exhaust: Signal::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Add a filter tag unless already present. Returns `true` if added.
    pub fn add_tag(&mut self, tag: impl Into<Tag>) -> bool {
        push_unique(&mut self.tags, tag.into())
    }

    /// Remove a filter tag. Returns `true` if it was present.
    pub fn remove_tag(&mut self, tag: &Tag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Child ids in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The child that default dispatch targets, if it exists.
    pub fn default_child(&self) -> Option<NodeId> {
        self.children.get(self.default_child_index).copied()
    }

    /// Packs received but not yet dispatched or discarded.
    pub fn held_packs(&self) -> &[Pack] {
        &self.held
    }

    pub fn is_meter(&self) -> bool {
        matches!(self.behavior, NodeBehavior::Meter(_))
    }

    pub fn meter(&self) -> Option<&MeterNode> {
        match &self.behavior {
            NodeBehavior::Meter(meter) => Some(meter),
            NodeBehavior::Operation(_) => None,
        }
    }

    pub fn meter_mut(&mut self) -> Option<&mut MeterNode> {
        match &mut self.behavior {
            NodeBehavior::Meter(meter) => Some(meter),
            NodeBehavior::Operation(_) => None,
        }
    }

    /// Human-readable summary of what this node does to packs.
    pub fn describe_operation(&self) -> String {
        match &self.behavior {
            NodeBehavior::Operation(op) => op.description(),
            NodeBehavior::Meter(meter) => format!(
                "meter {}/{}",
                meter.meter().value(),
                meter.meter().value_max()
            ),
        }
    }

    pub(crate) fn operation(&self) -> Option<Rc<dyn PackOperation>> {
        match &self.behavior {
            NodeBehavior::Operation(op) => Some(Rc::clone(op)),
            NodeBehavior::Meter(_) => None,
        }
    }

    /// Replace the operation. Meters keep their fixed transfer logic, so
    /// this returns `false` for them.
    pub(crate) fn set_operation(&mut self, operation: Rc<dyn PackOperation>) -> bool {
        match &mut self.behavior {
            NodeBehavior::Operation(op) => {
                *op = operation;
                true
            }
            NodeBehavior::Meter(_) => false,
        }
    }
}

impl Default for PipelineNode {
    fn default() -> Self {
        Self::relay(NodeParams::default(), Rc::new(Passthrough))
    }
}

impl fmt::Debug for PipelineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineNode")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("children", &self.children)
            .field("held", &self.held.len())
            .field("operation", &self.describe_operation())
            .field("default_child_index", &self.default_child_index)
            .field("do_default_dispatch", &self.do_default_dispatch)
            .field("process_on_receive", &self.process_on_receive)
            .field("process_top_down", &self.process_top_down)
            .finish()
    }
}
