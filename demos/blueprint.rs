//! Blueprint example: Building a pipeline from JSON
//!
//! This example shows:
//! - Describing nodes, meters and operations declaratively
//! - How invalid blueprints are reported

use damage_pipeline::*;
use tracing_subscriber::EnvFilter;

const BLUEPRINT: &str = r#"{
    "name": "player",
    "operation": {"type": "route", "tag": "poison", "child": "toxin"},
    "children": [
        {
            "name": "plate",
            "tags": ["physical"],
            "operation": {"type": "absorb", "amount": 3},
            "children": [{"name": "hp", "meter": {"value_max": 120}}]
        },
        {
            "name": "toxin",
            "operation": {"type": "scale", "factor": 2.0},
            "children": [{"name": "poison hp", "meter": {"value_max": 120}}]
        }
    ]
}"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Building from blueprint ===\n");
    let (mut pipeline, root) = match NodeBlueprint::from_json_str(BLUEPRINT)
        .and_then(|blueprint| Pipeline::from_blueprint(&blueprint))
    {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Failed to build pipeline: {}", e);
            return;
        }
    };

    for id in pipeline.node_ids() {
        if let Some(node) = pipeline.node(id) {
            println!("{:<10} {}", node.name(), node.describe_operation());
        }
    }

    let strike = Pack::new(10.0)
        .with_tag("physical")
        .with_sub_pack(Pack::new(4.0).with_tag("poison"));
    if let Err(e) = pipeline.receive(root, strike) {
        eprintln!("Receive failed: {}", e);
    }

    println!();
    for name in ["hp", "poison hp"] {
        if let Some(meter) = pipeline.node_by_name(name).and_then(|id| pipeline.meter(id)) {
            println!("{}: {:.1}", name, meter.value());
        }
    }

    println!("\n=== Invalid blueprint ===\n");
    let invalid = r#"{"name": "a", "children": [{"name": "x"}, {"name": "x"}]}"#;
    match NodeBlueprint::from_json_str(invalid).and_then(|b| Pipeline::from_blueprint(&b)) {
        Ok(_) => println!("Unexpectedly built"),
        Err(e) => println!("Rejected: {}", e),
    }
}
