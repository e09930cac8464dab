//! Node graph module.
//!
//! Provides `NodeGraph`, the arena that owns every pipeline node. Nodes are
//! stored in a petgraph `DiGraph` whose edges mirror parent → child links.
//! The edges exist so a link that would close a loop can be refused with
//! the offending path, keeping the node structure a DAG and processing
//! recursion finite.

use crate::error::PipelineError;
use crate::node::{NodeId, PipelineNode};
use petgraph::algo::{astar, has_path_connecting};
use petgraph::graph::DiGraph;
use tracing::warn;

/// Arena of pipeline nodes plus their parent → child links.
#[derive(Debug, Default)]
pub struct NodeGraph {
    graph: DiGraph<PipelineNode, ()>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    /// Add an unlinked node and return its id.
    pub fn add(&mut self, node: PipelineNode) -> NodeId {
        NodeId(self.graph.add_node(node))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.node_weight(id.0).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&PipelineNode> {
        self.graph.node_weight(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut PipelineNode> {
        self.graph.node_weight_mut(id.0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All node ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId)
    }

    /// First node (in creation order) with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].name() == name)
            .map(NodeId)
    }

    /// First direct child of `parent` with the given name.
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?
            .children()
            .iter()
            .copied()
            .find(|&child| self.get(child).map_or(false, |n| n.name() == name))
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Refuses, leaving the graph unchanged, when:
    /// - either id is unknown,
    /// - `child` is `parent`,
    /// - `parent` already has a child with the same name,
    /// - `child` can already reach `parent` (the link would close a cycle).
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), PipelineError> {
        let result = self.check_link(parent, child);
        match result {
            Ok(()) => {
                self.graph.add_edge(parent.0, child.0, ());
                if let Some(node) = self.get_mut(parent) {
                    node.children.push(child);
                }
                Ok(())
            }
            Err(err) => {
                warn!(%parent, %child, "{}", err);
                Err(err)
            }
        }
    }

    fn check_link(&self, parent: NodeId, child: NodeId) -> Result<(), PipelineError> {
        let parent_node = self.get(parent).ok_or(PipelineError::UnknownNode(parent))?;
        let child_node = self.get(child).ok_or(PipelineError::UnknownNode(child))?;

        if parent == child {
            return Err(PipelineError::SelfParent(parent_node.name().to_string()));
        }
        if self.child_by_name(parent, child_node.name()).is_some() {
            return Err(PipelineError::DuplicateChild {
                parent: parent_node.name().to_string(),
                child: child_node.name().to_string(),
            });
        }
        if has_path_connecting(&self.graph, child.0, parent.0, None) {
            return Err(PipelineError::Cycle {
                path: self.cycle_path(parent, child),
            });
        }
        Ok(())
    }

    /// Names along `parent -> child -> ... -> parent` for a refused link.
    fn cycle_path(&self, parent: NodeId, child: NodeId) -> Vec<String> {
        let mut path = vec![self.graph[parent.0].name().to_string()];
        if let Some((_, route)) = astar(&self.graph, child.0, |n| n == parent.0, |_| 1, |_| 0) {
            path.extend(route.into_iter().map(|idx| self.graph[idx].name().to_string()));
        }
        path
    }

    /// Detach `child` from `parent`. Returns `true` if it was a child.
    pub fn unlink(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.get_mut(parent) else {
            return false;
        };
        let Some(index) = node.children.iter().position(|&c| c == child) else {
            return false;
        };
        node.children.remove(index);
        if let Some(edge) = self.graph.find_edge(parent.0, child.0) {
            self.graph.remove_edge(edge);
        }
        true
    }

    /// Detach every child of `parent`.
    pub fn unlink_all(&mut self, parent: NodeId) {
        let children = match self.get_mut(parent) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            if let Some(edge) = self.graph.find_edge(parent.0, child.0) {
                self.graph.remove_edge(edge);
            }
        }
    }
}
