//! Basic example: A hit passing through resistances into shield and health
//!
//! This example demonstrates:
//! - Building a node tree by hand
//! - Routing a tagged sub-pack to its own branch
//! - Listening to meter threshold signals

use damage_pipeline::operation::{Absorb, Route, Scale};
use damage_pipeline::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), PipelineError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,damage_pipeline=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut pipeline = Pipeline::new();

    // root -> [armor -> shield -> hp, fire resist -> hp]
    let root = pipeline.add_node_with(NodeParams::named("root"), Route::new("fire", "fire resist"));
    let armor = pipeline.add_node_with(NodeParams::named("armor"), Absorb::new(4.0));
    let fire = pipeline.add_node_with(NodeParams::named("fire resist"), Scale::new(0.5));
    let shield = pipeline.add_meter(MeterParams::named("shield").with_value(15.0).with_value_max(30.0));
    let hp = pipeline.add_meter(MeterParams::named("hp"));

    pipeline.add_child(root, armor)?;
    pipeline.add_child(root, fire)?;
    pipeline.add_child(armor, shield)?;
    pipeline.add_child(shield, hp)?;
    pipeline.add_child(fire, hp)?;

    if let Some(meter) = pipeline.meter_mut(shield) {
        meter
            .on_break
            .connect(|_, _| println!("  ! shield broken"));
    }
    if let Some(meter) = pipeline.meter_mut(hp) {
        meter
            .on_zero
            .connect(|_, _| println!("  ! target defeated"));
    }

    let hits = [
        Pack::new(20.0).with_sub_pack(Pack::new(10.0).with_tag("fire")),
        Pack::new(30.0),
        Pack::new(25.0).with_mode(PackMode::Add),
        Pack::new(200.0),
    ];

    for hit in hits {
        println!("\nHit: {:?}", hit);
        pipeline.receive(root, hit)?;
        for id in [shield, hp] {
            if let (Some(node), Some(meter)) = (pipeline.node(id), pipeline.meter(id)) {
                println!(
                    "  {}: {:.1}/{:.1}",
                    node.name(),
                    meter.value(),
                    meter.meter().value_max()
                );
            }
        }
    }

    Ok(())
}
