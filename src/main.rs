//! Wayfarer - Entry Point
//!
//! Runs the engine against the built-in simulated world in one of a few
//! demo scenarios. Useful for watching the perception, motion, and
//! recovery layers work together without a live world session.

use clap::{Parser, ValueEnum};
use glam::IVec3;
use std::sync::Arc;
use tracing::info;

use wayfarer::actions::{execute, ActionRequest, MoveTarget};
use wayfarer::core::config::AgentConfig;
use wayfarer::core::error::Result;
use wayfarer::memory::LandmarkStore;
use wayfarer::perception::Snapshot;
use wayfarer::recovery::run_recovery;
use wayfarer::session::AgentContext;
use wayfarer::world::events::Notifier;
use wayfarer::world::link::WorldLink;
use wayfarer::world::sim::SimWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Walk to a point and back
    Walk,
    /// Mine a tree and collect the drops
    Mine,
    /// Escape a sealed stone pocket
    Escape,
    /// Capture and print a perception snapshot
    Survey,
}

#[derive(Debug, Parser)]
#[command(name = "wayfarer", about = "Embodied motion and recovery engine demo")]
struct Args {
    /// Scenario to run against the simulated world
    #[arg(long, value_enum, default_value = "walk")]
    scenario: Scenario,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Landmark memory file
    #[arg(long, default_value = "landmarks.json")]
    landmarks: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfarer=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AgentConfig::from_path(path)?,
        None => AgentConfig::default(),
    };
    config
        .validate()
        .map_err(wayfarer::core::error::AgentError::InvalidRequest)?;

    let world = Arc::new(SimWorld::flat(63, 32));
    let landmarks = Arc::new(LandmarkStore::load(&args.landmarks)?);
    let (notifier, mut notifications) = Notifier::channel();
    let link: Arc<dyn WorldLink> = world.clone();
    let ctx = AgentContext::configured(link, config, landmarks, notifier);
    ctx.spawn_background();

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            info!(?notification, "notification");
        }
    });

    match args.scenario {
        Scenario::Walk => {
            let outcome = execute(
                &ctx,
                ActionRequest::Move {
                    target: MoveTarget::Block(IVec3::new(10, 64, 10)),
                },
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Scenario::Mine => {
            for y in 64..=68 {
                world.set_block(IVec3::new(4, y, 2), "oak_log");
            }
            let outcome = execute(
                &ctx,
                ActionRequest::Mine {
                    block: "oak_log".into(),
                },
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Scenario::Escape => {
            seal_agent_in_pocket(&world);
            world.give("dirt", 8);
            let report = run_recovery(&ctx).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Scenario::Survey => {
            let snapshot = Snapshot::capture(world.as_ref(), &ctx.config);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    ctx.shutdown();
    Ok(())
}

/// Box the agent into a one-cell stone pocket
fn seal_agent_in_pocket(world: &SimWorld) {
    let feet = IVec3::new(0, 64, 0);
    for dx in -1..=1i32 {
        for dz in -1..=1i32 {
            for dy in -1..=2i32 {
                let cell = feet + IVec3::new(dx, dy, dz);
                if dx == 0 && dz == 0 && (0..=1).contains(&dy) {
                    continue;
                }
                world.set_block(cell, "stone");
            }
        }
    }
}
