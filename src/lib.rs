//! # damage-pipeline - Composable Damage Routing for Games
//!
//! A library for moving damage (or healing) through a tree of processing
//! nodes before it lands on bounded resources such as shields or health:
//! - **Packs** carry a value, a mode and tags, and may nest sub-packs for
//!   multi-component hits
//! - **Pipeline nodes** filter packs by tag, transform them, and forward
//!   them to children
//! - **Meters** absorb packs into a clamped value and report thresholds
//! - **Signals** notify listeners of dispatch, exhaustion and meter events
//!
//! ## Core Concepts
//!
//! ### Damage Flow
//!
//! ```text
//! [Pack] → receive → process → operate → dispatch → [child] ... → [Meter]
//! ```
//!
//! 1. A node **receives** a pack into its holding list
//! 2. **Processing** visits every pack in the held tree that passes the tag filter
//! 3. The node's **operation** changes, splits or routes each pack
//! 4. Surviving packs are **dispatched** to the default child
//!
//! A pack whose value reaches zero is exhausted and stops flowing.
//!
//! ## Example
//!
//! ```rust
//! use damage_pipeline::*;
//! use damage_pipeline::operation::Scale;
//!
//! let mut pipeline = Pipeline::new();
//! let resist = pipeline.add_node_with(NodeParams::named("resist"), Scale::new(0.75));
//! let shield = pipeline.add_meter(MeterParams::named("shield").with_value(10.0));
//! let hp = pipeline.add_meter(MeterParams::named("hp"));
//! pipeline.add_child(resist, shield).unwrap();
//! pipeline.add_child(shield, hp).unwrap();
//!
//! // 40 * 0.75 = 30: the shield takes 10, the remaining 20 reaches health.
//! pipeline.receive(resist, Pack::new(40.0)).unwrap();
//! assert_eq!(pipeline.meter(shield).unwrap().value(), 0.0);
//! assert_eq!(pipeline.meter(hp).unwrap().value(), 80.0);
//! ```
//!
//! ## Modules
//!
//! - [`pack`] - Damage packs and their modes
//! - [`tag`] - Tags used for filtering
//! - [`node`] - Pipeline node state and parameters
//! - [`operation`] - Per-pack operations and their context
//! - [`meter`] - Meter state, transfer and threshold events
//! - [`pipeline`] - The pipeline and its processing protocol
//! - [`graph`] - Node arena and cycle detection
//! - [`blueprint`] - Declarative construction from JSON
//! - [`signal`] - Listener lists
//! - [`error`] - Error types

pub mod blueprint;
pub mod error;
pub mod graph;
pub mod meter;
pub mod node;
pub mod operation;
pub mod pack;
pub mod pipeline;
pub mod signal;
pub mod tag;

// Re-export main types for convenience
pub use error::PipelineError;
pub use node::{NodeId, NodeParams, PipelineNode};
pub use pack::{Owner, Pack, PackId, PackMode, PackParams};
pub use pipeline::Pipeline;
pub use tag::Tag;

// Re-export meter types
pub use meter::{Meter, MeterHook, MeterHooks, MeterNode, MeterParams};

// Re-export operations
pub use operation::{
    Absorb, FnOperation, NodeContext, OperationSpec, PackOperation, Passthrough, Route, Scale,
};

pub use blueprint::{MeterBlueprint, NodeBlueprint};
pub use signal::{MeterListener, PackListener, Signal, Subscription};
