//! Recovery engine tests against the simulated world

use glam::{IVec3, Vec3};
use std::sync::Arc;
use wayfarer::core::config::AgentConfig;
use wayfarer::recovery::{run_recovery, RecoveryPhase, StrategyKind};
use wayfarer::session::AgentContext;
use wayfarer::world::link::WorldLink;
use wayfarer::world::sim::SimWorld;

fn context_for(world: Arc<SimWorld>) -> Arc<AgentContext> {
    let link: Arc<dyn WorldLink> = world.clone();
    let ctx = AgentContext::new(link, AgentConfig::default());
    ctx.spawn_background();
    ctx
}

/// Seal the agent inside a one-cell pocket made of the given block
fn seal_pocket(world: &SimWorld, feet: IVec3, material: &str) {
    for dx in -1..=1i32 {
        for dz in -1..=1i32 {
            for dy in -1..=2i32 {
                if dx == 0 && dz == 0 && (0..=1).contains(&dy) {
                    continue;
                }
                world.set_block(feet + IVec3::new(dx, dy, dz), material);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_bedrock_pocket_exhausts_attempt_budget() {
    let world = Arc::new(SimWorld::flat(63, 16));
    let feet = IVec3::new(0, 64, 0);
    seal_pocket(&world, feet, "bedrock");
    let ctx = context_for(world.clone());

    let report = run_recovery(&ctx).await;

    assert!(!report.recovered);
    assert_eq!(report.phase, RecoveryPhase::Exhausted);
    assert_eq!(report.attempts, ctx.config.max_recovery_attempts);
    // Terminal until an external reset
    let second = run_recovery(&ctx).await;
    assert!(!second.recovered);
    assert_eq!(second.phase, RecoveryPhase::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_jump_spam_without_progress_is_failure() {
    let world = Arc::new(SimWorld::flat(63, 16));
    let feet = IVec3::new(0, 64, 0);
    seal_pocket(&world, feet, "bedrock");
    let ctx = context_for(world.clone());

    let outcome = StrategyKind::JumpSpam.attempt(&ctx).await;

    // Controls were driven, but measured movement decides the verdict
    assert!(!outcome.success);
    assert!(outcome.displacement < 1.0);
    assert!(outcome.height_gain < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_pillar_gains_height_in_open_shaft() {
    let world = Arc::new(SimWorld::new());
    // Stone floor under a bedrock-walled shaft open to the sky
    let feet = IVec3::new(0, 41, 0);
    world.set_block(feet + IVec3::new(0, -1, 0), "stone");
    for dy in 0..=8i32 {
        for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            world.set_block(feet + IVec3::new(dx, dy, dz), "bedrock");
        }
    }
    world.set_agent_position(Vec3::new(0.5, 41.0, 0.5));
    world.give("dirt", 5);
    let ctx = context_for(world.clone());

    let outcome = StrategyKind::Pillar.attempt(&ctx).await;

    let y = WorldLink::agent(world.as_ref()).position.y;
    assert!(outcome.success, "no measured height gain, y={y}");
    assert!(y >= 42.0);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_in_stone_pocket_breaks_out() {
    let world = Arc::new(SimWorld::flat(63, 16));
    let feet = IVec3::new(0, 64, 0);
    seal_pocket(&world, feet, "stone");
    let ctx = context_for(world.clone());

    let report = run_recovery(&ctx).await;

    assert!(report.recovered, "phase: {:?}", report.phase);
    assert_eq!(report.phase, RecoveryPhase::Normal);
    let position = WorldLink::agent(world.as_ref()).position;
    let moved = Vec3::new(position.x - 0.5, 0.0, position.z - 0.5).length();
    assert!(
        moved >= ctx.config.min_progress || position.y - 64.0 >= 1.0,
        "no verified progress after recovery, at {position:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_strategy_attempt_runs_on_spawned_task() {
    let world = Arc::new(SimWorld::flat(63, 16));
    let ctx = context_for(world.clone());

    // Spawning requires the attempt future to be Send, the same bound the
    // background reflex task puts on every strategy
    let runner = ctx.clone();
    let outcome = tokio::spawn(async move { StrategyKind::JumpSpam.attempt(&runner).await })
        .await
        .unwrap();
    assert_eq!(outcome.strategy, "jump_spam");
}

#[tokio::test(start_paused = true)]
async fn test_liquid_escape_leaves_water_column() {
    let world = Arc::new(SimWorld::flat(63, 16));
    // Two-deep water well under the agent
    for y in 62..=64 {
        world.clear_block(IVec3::new(0, y, 0));
        world.set_block(IVec3::new(0, y, 0), "water");
    }
    world.set_block(IVec3::new(0, 61, 0), "stone");
    world.set_agent_position(Vec3::new(0.5, 62.0, 0.5));
    let ctx = context_for(world.clone());

    assert!(StrategyKind::LiquidEscape.applies(&ctx));
    StrategyKind::LiquidEscape.attempt(&ctx).await;

    let feet = WorldLink::agent(world.as_ref()).position;
    let feet_block = world.block_at(IVec3::new(
        feet.x.floor() as i32,
        feet.y.floor() as i32,
        feet.z.floor() as i32,
    ));
    assert_ne!(feet_block.as_deref(), Some("water"));
}
