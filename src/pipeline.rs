//! Damage pipeline module.
//!
//! Provides the `Pipeline` type, the main entry point. It owns every node,
//! links them into a tree, and runs the receive → process → operate →
//! dispatch protocol that carries packs from the root down to meters.

use crate::error::PipelineError;
use crate::graph::NodeGraph;
use crate::meter::{MeterNode, MeterParams};
use crate::node::{NodeId, NodeParams, PipelineNode};
use crate::operation::{FnOperation, NodeContext, PackOperation, Passthrough};
use crate::pack::{Pack, PackId};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// A tree of pipeline nodes and meters.
///
/// Processing is synchronous: `receive` returns only once the pack, and
/// everything split off from it, has been consumed, discarded, or parked
/// in some node's holding list.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::*;
/// use damage_pipeline::operation::Scale;
///
/// let mut pipeline = Pipeline::new();
/// let armor = pipeline.add_node_with(NodeParams::named("armor"), Scale::new(0.5));
/// let hp = pipeline.add_meter(MeterParams::named("hp"));
/// pipeline.add_child(armor, hp).unwrap();
///
/// pipeline.receive(armor, Pack::new(30.0)).unwrap();
/// assert_eq!(pipeline.meter(hp).unwrap().value(), 85.0);
/// ```
#[derive(Debug, Default)]
pub struct Pipeline {
    graph: NodeGraph,
    /// Nodes whose `process` is on the call stack, outermost first.
    processing: Vec<NodeId>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            graph: NodeGraph::new(),
            processing: Vec::new(),
        }
    }

    /// Add a node that passes packs through untouched.
    pub fn add_node(&mut self, params: NodeParams) -> NodeId {
        self.add_node_with(params, Passthrough)
    }

    /// Add a node running the given operation on every matching pack.
    pub fn add_node_with(&mut self, params: NodeParams, operation: impl PackOperation + 'static) -> NodeId {
        self.graph.add(PipelineNode::relay(params, Rc::new(operation)))
    }

    /// Add a node whose operation is a closure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use damage_pipeline::*;
    ///
    /// let mut pipeline = Pipeline::new();
    /// let doubler = pipeline.add_node_fn(NodeParams::named("crit"), |ctx, pack| {
    ///     if let Some(pack) = ctx.pack_mut(pack) {
    ///         let doubled = pack.value() * 2.0;
    ///         pack.set_value(doubled);
    ///     }
    /// });
    /// let hp = pipeline.add_meter(MeterParams::named("hp"));
    /// pipeline.add_child(doubler, hp).unwrap();
    ///
    /// pipeline.receive(doubler, Pack::new(15.0)).unwrap();
    /// assert_eq!(pipeline.meter(hp).unwrap().value(), 70.0);
    /// ```
    pub fn add_node_fn<F>(&mut self, params: NodeParams, f: F) -> NodeId
    where
        F: Fn(&mut NodeContext<'_>, PackId) + 'static,
    {
        self.add_node_with(params, FnOperation::new(f))
    }

    /// Add a meter node.
    pub fn add_meter(&mut self, params: MeterParams) -> NodeId {
        let meter = MeterNode::new(params.value, params.value_max, params.hooks);
        self.graph.add(PipelineNode::metered(params.node, meter))
    }

    /// Replace a node's operation. Meters refuse: their transfer logic is
    /// fixed and customized through hooks instead.
    pub fn set_operation(
        &mut self,
        node: NodeId,
        operation: impl PackOperation + 'static,
    ) -> Result<(), PipelineError> {
        let entry = self.graph.get_mut(node).ok_or(PipelineError::UnknownNode(node))?;
        if entry.set_operation(Rc::new(operation)) {
            Ok(())
        } else {
            warn!(%node, "Meter operations cannot be replaced");
            Err(PipelineError::FixedOperation(entry.name().to_string()))
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&PipelineNode> {
        self.graph.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PipelineNode> {
        self.graph.get_mut(id)
    }

    pub fn meter(&self, id: NodeId) -> Option<&MeterNode> {
        self.graph.get(id).and_then(PipelineNode::meter)
    }

    pub fn meter_mut(&mut self, id: NodeId) -> Option<&mut MeterNode> {
        self.graph.get_mut(id).and_then(PipelineNode::meter_mut)
    }

    /// First node, in creation order, with this name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.graph.find_by_name(name)
    }

    /// All node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.ids()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// Self-parenting, duplicate sibling names, unknown ids and links that
    /// would form a cycle are refused with a diagnostic, leaving the
    /// children unchanged.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PipelineError> {
        self.graph.link(parent, child)
    }

    /// Detach a child. Returns `true` if it was a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.graph.unlink(parent, child)
    }

    pub fn clear_children(&mut self, parent: NodeId) {
        self.graph.unlink_all(parent);
    }

    /// Direct child of `parent` with this name.
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.graph.child_by_name(parent, name)
    }

    /// Deliver a pack to a node.
    ///
    /// Exhausted packs are dropped. Otherwise the pack joins the node's
    /// holding list and, if the node processes on receive, is processed
    /// right away.
    pub fn receive(&mut self, node: NodeId, mut pack: Pack) -> Result<(), PipelineError> {
        let entry = self.graph.get_mut(node).ok_or(PipelineError::UnknownNode(node))?;
        if pack.check_exhaustion() {
            trace!(%node, pack = %pack.id(), "Dropping exhausted pack on receive");
            return Ok(());
        }
        trace!(%node, pack = %pack.id(), value = pack.value(), "Pack received");
        entry.held.push(pack);
        if entry.process_on_receive {
            self.process(node);
        }
        Ok(())
    }

    /// Run the node's operation over every held pack.
    ///
    /// Held packs are taken most recent first. Each pack tree is visited
    /// bottom-up (sub-packs before their parent, root last) or, for
    /// top-down nodes, root first with the tree re-read after every step
    /// so the traversal sees packs moved by the operation. A pack still
    /// held afterwards goes to the default child when default dispatch is
    /// on; otherwise it stays held unless exhausted.
    ///
    /// While a node processes, packs dispatched back to it (or to any node
    /// further up the current dispatch chain) are dropped with a warning,
    /// so recursion depth never exceeds the number of nodes.
    pub fn process(&mut self, node: NodeId) {
        let held = match self.graph.get_mut(node) {
            Some(entry) => std::mem::take(&mut entry.held),
            None => {
                warn!(%node, "Cannot process unknown node");
                return;
            }
        };
        self.processing.push(node);

        let mut retained = Vec::new();
        for pack in held.into_iter().rev() {
            let mut current = Some(pack);
            self.traverse(node, &mut current);

            let Some(pack) = current else {
                continue;
            };
            let (do_default, target) = match self.graph.get(node) {
                Some(entry) => (entry.do_default_dispatch, entry.default_child()),
                None => (false, None),
            };
            if do_default {
                self.forward(node, pack, target);
            } else if pack.is_exhausted() {
                debug!(%node, pack = %pack.id(), "Discarding exhausted held pack");
            } else {
                retained.push(pack);
            }
        }

        if let Some(entry) = self.graph.get_mut(node) {
            retained.reverse();
            retained.append(&mut entry.held);
            entry.held = retained;
        }
        self.processing.pop();
    }

    /// Whether `node` is processing somewhere up the current call chain.
    pub fn is_processing(&self, node: NodeId) -> bool {
        self.processing.contains(&node)
    }

    fn traverse(&mut self, node: NodeId, current: &mut Option<Pack>) {
        let top_down = self.graph.get(node).map_or(false, |n| n.process_top_down);
        if top_down {
            let mut index = 0;
            loop {
                let Some(root) = current.as_ref() else {
                    break;
                };
                let mut order = root.all_pack_ids();
                order.reverse();
                let Some(&id) = order.get(index) else {
                    break;
                };
                self.apply(node, current, id);
                index += 1;
            }
        } else {
            let order = match current.as_ref() {
                Some(root) => root.all_pack_ids(),
                None => return,
            };
            for id in order {
                self.apply(node, current, id);
            }
        }
    }

    /// Operate on one pack of the current tree, then check its exhaustion.
    fn apply(&mut self, node: NodeId, current: &mut Option<Pack>, id: PackId) {
        let Some(entry) = self.graph.get(node) else {
            return;
        };
        let eligible = current
            .as_ref()
            .and_then(|root| root.find(id))
            .map_or(false, |pack| !pack.is_exhausted() && pack.has_tag_in(entry.tags()));
        if !eligible {
            return;
        }
        trace!(%node, pack = %id, "Operating");

        match entry.operation() {
            Some(operation) => {
                let mut ctx = NodeContext::new(self, node, current);
                operation.operate(&mut ctx, id);
            }
            None => {
                let pack = current.as_mut().and_then(|root| root.find_mut(id));
                let meter = self.graph.get_mut(node).and_then(PipelineNode::meter_mut);
                if let (Some(pack), Some(meter)) = (pack, meter) {
                    meter.operate(node, pack);
                }
            }
        }

        let Some(pack) = current.as_mut().and_then(|root| root.find_mut(id)) else {
            return;
        };
        if pack.check_exhaustion() {
            debug!(%node, pack = %id, "Pack exhausted");
            if let Some(entry) = self.graph.get_mut(node) {
                entry.on_exhaust.emit(node, pack);
            }
        }
    }

    /// Hand an already-detached pack from `from` to `target`.
    ///
    /// Exhausted packs, packs with no valid target, and packs sent to a
    /// node that is still processing are dropped.
    pub(crate) fn forward(&mut self, from: NodeId, mut pack: Pack, target: Option<NodeId>) {
        if pack.check_exhaustion() {
            trace!(node = %from, pack = %pack.id(), "Exhausted pack discarded at dispatch");
            return;
        }
        let Some(target) = target.filter(|&t| self.graph.contains(t)) else {
            debug!(node = %from, pack = %pack.id(), value = pack.value(), "No dispatch target; pack dropped");
            return;
        };
        if self.is_processing(target) {
            warn!(
                node = %from,
                %target,
                pack = %pack.id(),
                value = pack.value(),
                "Refusing dispatch to a node that is still processing; pack dropped"
            );
            return;
        }
        if let Some(entry) = self.graph.get_mut(from) {
            entry.on_dispatch.emit(from, &pack);
        }
        debug!(node = %from, %target, pack = %pack.id(), value = pack.value(), "Dispatching pack");
        if let Err(err) = self.receive(target, pack) {
            warn!(%target, "{}", err);
        }
    }

    /// Detach a pack from the trees held by `node`, searching held roots
    /// first, then their sub-packs.
    pub fn extract_pack(&mut self, node: NodeId, pack: PackId) -> Option<Pack> {
        let entry = self.graph.get_mut(node)?;
        if let Some(index) = entry.held.iter().position(|p| p.id() == pack) {
            return Some(entry.held.remove(index));
        }
        entry.held.iter_mut().find_map(|root| root.extract_sub_pack(pack))
    }

    /// Move a pack held by `node` (or part of a held tree) to `target`.
    ///
    /// Useful with nodes that do not process on receive. Returns `false`
    /// if `node` does not hold the pack.
    pub fn dispatch(&mut self, node: NodeId, pack: PackId, target: NodeId) -> bool {
        match self.extract_pack(node, pack) {
            Some(pack) => {
                self.forward(node, pack, Some(target));
                true
            }
            None => false,
        }
    }

    /// Move a pack held by `node` to its default child.
    pub fn dispatch_default(&mut self, node: NodeId, pack: PackId) -> bool {
        let target = self.graph.get(node).and_then(PipelineNode::default_child);
        match self.extract_pack(node, pack) {
            Some(pack) => {
                self.forward(node, pack, target);
                true
            }
            None => false,
        }
    }
}
