//! Pack operations module.
//!
//! An operation is what a pipeline node does to each pack matching its tag
//! filter: attenuate it, redirect it, split it. Operations run inside a
//! [`NodeContext`], which gives access to the pack tree currently being
//! processed and lets the operation dispatch packs to other nodes.

use crate::node::{NodeId, PipelineNode};
use crate::pack::{Pack, PackId};
use crate::pipeline::Pipeline;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

/// Per-pack processing strategy of a pipeline node.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::operation::{NodeContext, PackOperation};
/// use damage_pipeline::PackId;
///
/// /// Halves every pack it sees.
/// struct Halve;
///
/// impl PackOperation for Halve {
///     fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId) {
///         if let Some(pack) = ctx.pack_mut(pack) {
///             let half = pack.value() / 2.0;
///             pack.set_value(half);
///         }
///     }
///
///     fn description(&self) -> String {
///         "halve".to_string()
///     }
/// }
/// ```
pub trait PackOperation {
    /// Process one pack of the tree currently held by the node.
    fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId);

    /// Human-readable description, used in logs and `Debug` output.
    fn description(&self) -> String;
}

/// Identity operation: packs pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl PackOperation for Passthrough {
    fn operate(&self, _ctx: &mut NodeContext<'_>, _pack: PackId) {}

    fn description(&self) -> String {
        "passthrough".to_string()
    }
}

/// Multiplies each pack's value by a factor (0.75 for 25% resistance).
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl PackOperation for Scale {
    fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId) {
        if let Some(pack) = ctx.pack_mut(pack) {
            let scaled = pack.value() * self.factor;
            pack.set_value(scaled);
        }
    }

    fn description(&self) -> String {
        format!("×{:.2}", self.factor)
    }
}

/// Subtracts a flat amount from each pack (armor).
#[derive(Debug, Clone, Copy)]
pub struct Absorb {
    amount: f64,
}

impl Absorb {
    pub fn new(amount: f64) -> Self {
        Self { amount }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }
}

impl PackOperation for Absorb {
    fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId) {
        if let Some(pack) = ctx.pack_mut(pack) {
            pack.reduce(self.amount);
        }
    }

    fn description(&self) -> String {
        format!("-{:.2}", self.amount)
    }
}

/// Sends packs carrying a tag to the named child.
///
/// The pack is detached from wherever it sits in the tree, so a fire
/// sub-pack of a physical strike can be routed to a fire-resistance branch
/// while its parent continues down the default path.
#[derive(Debug, Clone)]
pub struct Route {
    tag: Tag,
    child: String,
}

impl Route {
    pub fn new(tag: impl Into<Tag>, child: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            child: child.into(),
        }
    }
}

impl PackOperation for Route {
    fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId) {
        let tagged = ctx.pack(pack).map_or(false, |p| p.has_tag(&self.tag));
        if tagged && !ctx.dispatch_to(pack, &self.child) {
            debug!(child = %self.child, "Route target missing; pack left in place");
        }
    }

    fn description(&self) -> String {
        format!("route {} -> {}", self.tag, self.child)
    }
}

/// Adapter turning a closure into a [`PackOperation`].
pub struct FnOperation<F> {
    f: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&mut NodeContext<'_>, PackId),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> PackOperation for FnOperation<F>
where
    F: Fn(&mut NodeContext<'_>, PackId),
{
    fn operate(&self, ctx: &mut NodeContext<'_>, pack: PackId) {
        (self.f)(ctx, pack)
    }

    fn description(&self) -> String {
        "custom operation".to_string()
    }
}

/// Serializable description of a built-in operation.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::operation::OperationSpec;
///
/// let spec: OperationSpec = serde_json::from_str(r#"{"type": "scale", "factor": 0.5}"#).unwrap();
/// assert_eq!(spec.build().description(), "×0.50");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationSpec {
    Passthrough,
    Scale { factor: f64 },
    Absorb { amount: f64 },
    Route { tag: Tag, child: String },
}

impl OperationSpec {
    pub fn build(&self) -> Rc<dyn PackOperation> {
        match self {
            OperationSpec::Passthrough => Rc::new(Passthrough),
            OperationSpec::Scale { factor } => Rc::new(Scale::new(*factor)),
            OperationSpec::Absorb { amount } => Rc::new(Absorb::new(*amount)),
            OperationSpec::Route { tag, child } => Rc::new(Route::new(tag.clone(), child.clone())),
        }
    }
}

/// What an operation sees while its node processes a pack tree.
///
/// The context holds the root pack currently being processed (if it is
/// still held by the node) and mutable access to the pipeline, so
/// dispatching from inside an operation runs the target node's processing
/// immediately.
pub struct NodeContext<'a> {
    pipeline: &'a mut Pipeline,
    node: NodeId,
    current: &'a mut Option<Pack>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(pipeline: &'a mut Pipeline, node: NodeId, current: &'a mut Option<Pack>) -> Self {
        Self {
            pipeline,
            node,
            current,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node(&self) -> Option<&PipelineNode> {
        self.pipeline.node(self.node)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &*self.pipeline
    }

    pub fn children(&self) -> &[NodeId] {
        self.node().map(PipelineNode::children).unwrap_or(&[])
    }

    pub fn child_by_name(&self, name: &str) -> Option<NodeId> {
        self.pipeline.child_by_name(self.node, name)
    }

    /// The root of the tree being processed, unless it has already left
    /// the node.
    pub fn root_pack(&self) -> Option<&Pack> {
        self.current.as_ref()
    }

    pub fn pack(&self, id: PackId) -> Option<&Pack> {
        self.current.as_ref().and_then(|root| root.find(id))
    }

    pub fn pack_mut(&mut self, id: PackId) -> Option<&mut Pack> {
        self.current.as_mut().and_then(|root| root.find_mut(id))
    }

    /// Detach a pack from the tree being processed.
    ///
    /// Extracting the root releases it from the node's holding list, so
    /// it will not be default-dispatched. The caller owns the returned
    /// pack and may re-attach it elsewhere with
    /// [`Pack::add_sub_pack`] or [`send`](Self::send) it on.
    pub fn extract_pack(&mut self, id: PackId) -> Option<Pack> {
        let root = self.current.as_mut()?;
        if root.id() == id {
            return self.current.take();
        }
        root.extract_sub_pack(id)
    }

    /// Detach a pack and hand it to `target`.
    ///
    /// Exhausted packs are discarded instead. Returns `false` if the pack
    /// is not part of the tree being processed.
    pub fn dispatch(&mut self, pack: PackId, target: NodeId) -> bool {
        match self.extract_pack(pack) {
            Some(pack) => {
                self.pipeline.forward(self.node, pack, Some(target));
                true
            }
            None => false,
        }
    }

    /// Dispatch to the child with the given name. Returns `false`, leaving
    /// the pack in place, if there is no such child or pack.
    pub fn dispatch_to(&mut self, pack: PackId, child: &str) -> bool {
        match self.child_by_name(child) {
            Some(target) => self.dispatch(pack, target),
            None => false,
        }
    }

    /// Dispatch to the node's default child. Without one the pack is
    /// detached and dropped.
    pub fn dispatch_default(&mut self, pack: PackId) -> bool {
        let target = self.node().and_then(PipelineNode::default_child);
        match self.extract_pack(pack) {
            Some(pack) => {
                self.pipeline.forward(self.node, pack, target);
                true
            }
            None => false,
        }
    }

    /// Hand a pack that is not part of the current tree (a clone, a newly
    /// split-off component) to `target`.
    pub fn send(&mut self, target: NodeId, pack: Pack) {
        self.pipeline.forward(self.node, pack, Some(target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(Passthrough.description(), "passthrough");
        assert_eq!(Scale::new(0.75).description(), "×0.75");
        assert_eq!(Absorb::new(5.0).description(), "-5.00");
        assert_eq!(Route::new("fire", "burn").description(), "route fire -> burn");
    }

    #[test]
    fn test_operation_spec_parsing() {
        let specs: Vec<OperationSpec> = serde_json::from_str(
            r#"[
                {"type": "passthrough"},
                {"type": "absorb", "amount": 3},
                {"type": "route", "tag": "fire", "child": "burn"}
            ]"#,
        )
        .unwrap();
        assert_eq!(specs[0], OperationSpec::Passthrough);
        assert_eq!(specs[1], OperationSpec::Absorb { amount: 3.0 });
        assert_eq!(
            specs[2],
            OperationSpec::Route {
                tag: Tag::name("fire"),
                child: "burn".to_string()
            }
        );
    }
}
