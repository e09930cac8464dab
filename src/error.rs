//! Error types for pipeline construction.
//!
//! Packs and nodes sanitize bad input rather than failing, so errors only
//! surface from operations that refuse to change the tree (linking nodes,
//! building a pipeline from a blueprint). They are reported both as a
//! returned `PipelineError` and as a `tracing` diagnostic.

use crate::node::NodeId;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[String]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.join(" -> ")
}

/// Errors reported by pipeline operations.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::PipelineError;
///
/// let err = PipelineError::SelfParent("armor".to_string());
/// assert_eq!(err.to_string(), "Could not add child: armor cannot be its own parent");
/// ```
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A node was added as its own child.
    #[error("Could not add child: {0} cannot be its own parent")]
    SelfParent(String),

    /// A child with the same name is already attached to the parent.
    #[error("Could not add child: name {child} already in use under {parent}")]
    DuplicateChild { parent: String, child: String },

    /// Linking the child would make the node tree cyclic.
    ///
    /// The path starts at the would-be parent and follows the proposed
    /// link back to it, e.g. `[C, A, B, C]`.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<String> },

    /// The node id does not belong to this pipeline.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Meters keep their transfer logic; only relay operations can be
    /// replaced.
    #[error("Cannot replace the operation of meter {0}")]
    FixedOperation(String),

    /// A pack mode name was not ADD, SET or SUBTRACT.
    #[error("Unknown pack mode: {0}")]
    UnknownMode(String),

    /// A blueprint described an inconsistent pipeline.
    #[error("Invalid blueprint: {0}")]
    Blueprint(String),

    /// A blueprint could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::DuplicateChild {
            parent: "root".to_string(),
            child: "hp".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("root"));
        assert!(display.contains("hp"));
    }

    #[test]
    fn test_cycle_error_display() {
        let err = PipelineError::Cycle {
            path: vec!["A".into(), "B".into(), "C".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected: A -> B -> C -> A");
    }

    #[test]
    fn test_empty_cycle_display() {
        let err = PipelineError::Cycle { path: Vec::new() };
        assert!(err.to_string().contains("(empty cycle)"));
    }
}
