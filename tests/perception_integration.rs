//! Perception pipeline tests against the simulated world

use glam::{IVec3, Vec3};
use wayfarer::core::config::AgentConfig;
use wayfarer::core::types::EntityKind;
use wayfarer::perception::{perceivable, EscapePath, Snapshot};
use wayfarer::world::link::WorldLink;
use wayfarer::world::sim::SimWorld;

/// Agent sealed in a small stone pocket underground
fn cave_world() -> SimWorld {
    let world = SimWorld::new();
    let center = IVec3::new(0, 40, 0);
    for dy in -1..=5 {
        for dz in -2..=2 {
            for dx in -2..=2 {
                world.set_block(center + IVec3::new(dx, dy, dz), "stone");
            }
        }
    }
    world.clear_block(center);
    world.clear_block(center + IVec3::new(0, 1, 0));
    world.set_agent_position(Vec3::new(0.5, 40.0, 0.5));
    world
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_is_deterministic() {
    let world = cave_world();
    let config = AgentConfig::default();
    world.set_block(IVec3::new(2, 41, 0), "iron_ore");
    world.spawn_entity("zombie", EntityKind::Hostile, Vec3::new(0.5, 41.0, 1.5));

    let first = Snapshot::capture(&world, &config);
    let second = Snapshot::capture(&world, &config);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reflects_world_change() {
    let world = cave_world();
    let config = AgentConfig::default();

    let before = Snapshot::capture(&world, &config);
    world.set_block(IVec3::new(0, 41, 1), "iron_ore");
    let after = Snapshot::capture(&world, &config);
    assert_ne!(before, after);
}

#[tokio::test(start_paused = true)]
async fn test_target_behind_agent_not_perceivable() {
    let world = SimWorld::flat(63, 16);
    let config = AgentConfig::default();
    let agent = world.agent();

    // Agent faces +Z at spawn; -Z is behind
    let behind = Vec3::new(0.5, 64.5, -4.5);
    assert!(!perceivable(&world, &config, &agent, behind, false));
    let ahead = Vec3::new(0.5, 64.5, 4.5);
    assert!(perceivable(&world, &config, &agent, ahead, false));
}

#[tokio::test(start_paused = true)]
async fn test_memory_exception_only_beyond_memory_range() {
    let world = SimWorld::flat(63, 16);
    let config = AgentConfig::default();
    let agent = world.agent();

    // Wall between the agent and everything ahead
    for x in -3..=3 {
        for y in 64..=68 {
            world.set_block(IVec3::new(x, y, 2), "stone");
        }
    }

    // Occluded target inside memory range stays hidden even with memory
    let near = Vec3::new(0.5, 64.5, 6.5);
    assert!(!perceivable(&world, &config, &agent, near, true));
    assert!(!perceivable(&world, &config, &agent, near, false));

    // Beyond memory range the memory exception bypasses FOV and LOS
    let far = Vec3::new(0.5, 64.5, 40.5);
    assert!(perceivable(&world, &config, &agent, far, true));
    assert!(!perceivable(&world, &config, &agent, far, false));
}

#[tokio::test(start_paused = true)]
async fn test_escape_ray_blocked_when_solid_in_jump_reach() {
    let world = cave_world();
    let config = AgentConfig::default();
    // Head at y=41: open directly above, solid at offsets 2 and 3
    world.clear_block(IVec3::new(0, 42, 0));
    world.set_block(IVec3::new(0, 43, 0), "stone");
    world.set_block(IVec3::new(0, 44, 0), "stone");

    let snapshot = Snapshot::capture(&world, &config);
    assert!(snapshot.summary.is_underground);
    assert_eq!(snapshot.summary.escape_path, Some(EscapePath::Blocked));
}

#[tokio::test(start_paused = true)]
async fn test_grid_marks_unloaded_cells_unknown() {
    let world = SimWorld::flat(63, 16);
    let config = AgentConfig::default();
    world.mark_unloaded(IVec3::new(1, 64, 0));

    let snapshot = Snapshot::capture(&world, &config);
    assert!(snapshot.grid.cell(1, 0, 0).is_none());
    assert!(snapshot.grid.cell(0, -1, 0).is_some());
}
