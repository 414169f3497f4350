//! FOV cone and line-of-sight filtering
//!
//! A point is perceivable when its horizontal bearing is inside the view
//! cone and a fixed-step ray from the eye reaches it without hitting an
//! opaque block. Targets beyond the memory range bypass both tests; that
//! exception exists for remembered functional blocks and must never be
//! used for hostile entities.

use glam::Vec3;

use crate::core::config::AgentConfig;
use crate::core::types::{angle_delta, horizontal_distance, yaw_toward, BlockAligned, EYE_HEIGHT};
use crate::world::block;
use crate::world::link::{AgentState, WorldLink};

/// Is the target inside the horizontal view cone?
pub fn in_fov(agent: &AgentState, target: Vec3, half_angle_deg: f32) -> bool {
    // Targets essentially on top of the agent have no meaningful bearing
    if horizontal_distance(agent.position, target) < 0.5 {
        return true;
    }
    let bearing = yaw_toward(agent.position, target);
    let delta = angle_delta(bearing, agent.yaw).abs();
    delta <= half_angle_deg.to_radians()
}

/// Fixed-step ray march from the eye to the target
///
/// Blocked if any sample resolves to a block outside the transparent set.
/// Unloaded cells cannot confirm sight and block the ray.
pub fn line_of_sight(world: &dyn WorldLink, eye: Vec3, target: Vec3, step: f32) -> bool {
    let delta = target - eye;
    let length = delta.length();
    if length < step {
        return true;
    }
    let dir = delta / length;
    let target_block = target.block();

    let mut travelled = step;
    while travelled < length {
        let sample = eye + dir * travelled;
        let cell = sample.block();
        if cell != target_block {
            match world.block_at(cell) {
                Some(name) => {
                    if !block::is_transparent(&name) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        travelled += step;
    }
    true
}

/// Full perceivability test
///
/// `allow_memory` enables the long-range bypass for remembered functional
/// blocks; callers classifying hostile entities must pass `false`.
pub fn perceivable(
    world: &dyn WorldLink,
    config: &AgentConfig,
    agent: &AgentState,
    target: Vec3,
    allow_memory: bool,
) -> bool {
    let eye = agent.position + Vec3::new(0.0, EYE_HEIGHT, 0.0);
    let distance = eye.distance(target);

    if allow_memory && distance > config.memory_range {
        return true;
    }

    in_fov(agent, target, config.fov_half_angle_deg)
        && line_of_sight(world, eye, target, config.los_step)
}
