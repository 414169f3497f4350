//! Symbolic direction resolution
//!
//! Maps named directions to a target yaw and walks a fixed distance that
//! way. When the primary heading is blocked, alternate headings at +-45
//! and +-90 degrees are tried before a manual walk-with-jump fallback.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::motion::controller::{walk_to, WalkOptions};
use crate::motion::{MotionOutcome, TerminationReason};
use crate::session::AgentContext;
use crate::world::link::ControlState;

/// Directions the decision layer can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedDirection {
    North,
    South,
    East,
    West,
    Forward,
    Back,
    Left,
    Right,
}

impl NamedDirection {
    /// Resolve to a target yaw, relative directions against the current yaw
    ///
    /// Yaw 0 faces +Z, which is south in compass terms.
    pub fn resolve_yaw(&self, current_yaw: f32) -> f32 {
        use std::f32::consts::{FRAC_PI_2, PI};
        match self {
            NamedDirection::South => 0.0,
            NamedDirection::West => FRAC_PI_2,
            NamedDirection::North => PI,
            NamedDirection::East => -FRAC_PI_2,
            NamedDirection::Forward => current_yaw,
            NamedDirection::Back => current_yaw + PI,
            NamedDirection::Left => current_yaw + FRAC_PI_2,
            NamedDirection::Right => current_yaw - FRAC_PI_2,
        }
    }
}

/// Alternate heading offsets tried when the primary is blocked, radians
const HEADING_OFFSETS: [f32; 5] = [
    0.0,
    std::f32::consts::FRAC_PI_4,
    -std::f32::consts::FRAC_PI_4,
    std::f32::consts::FRAC_PI_2,
    -std::f32::consts::FRAC_PI_2,
];

/// Walk a fixed distance in a named direction
///
/// Tries the primary heading, then the alternates, then a manual
/// walk-with-jump burst before reporting total failure.
pub async fn move_direction(
    ctx: &AgentContext,
    direction: NamedDirection,
    distance: f32,
) -> MotionOutcome {
    let world = ctx.world.as_ref();
    let base_yaw = direction.resolve_yaw(world.agent().yaw);
    // Short budget per heading so failed candidates abort quickly
    let options = WalkOptions {
        arrive_radius: ctx.config.arrive_radius,
        timeout: Duration::from_millis((distance as u64 + 1) * 1_000),
    };

    for (index, offset) in HEADING_OFFSETS.iter().enumerate() {
        let yaw = base_yaw + offset;
        let origin = world.agent().position;
        let target = origin + Vec3::new(-yaw.sin(), 0.0, yaw.cos()) * distance;
        let outcome = walk_to(ctx, target, &options).await;
        if outcome.reached {
            return outcome;
        }
        if outcome.reason == TerminationReason::Disconnected {
            return outcome;
        }
        debug!(heading = index, ?direction, "heading blocked, trying next");
    }

    // Last resort: shove forward with jumps and measure what we get
    let origin = world.agent().position;
    ctx.look.aim(base_yaw, 0.0, crate::motion::look::LookProfile::Fast);
    world.set_control(ControlState {
        forward: true,
        jump: true,
        sneak: false,
    });
    sleep(Duration::from_millis((distance as u64 + 1) * 700)).await;
    world.set_control(ControlState::default());

    let moved = world.agent().position.distance(origin);
    let remaining = (distance - moved).max(0.0);
    let outcome = if moved >= distance * 0.5 {
        MotionOutcome::success(moved, remaining)
    } else {
        MotionOutcome::failed(TerminationReason::Stuck, moved, remaining)
    };
    ctx.record_move(&outcome);
    outcome
}
