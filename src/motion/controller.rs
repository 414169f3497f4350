//! Walk and pathfinding control loops
//!
//! The direct walk drives latched controls toward a nearby point with
//! periodic stuck sampling; delegated pathfinding hands a goal to a
//! `Navigator` and polls it on a fixed tick, aborting on bad paths and
//! stalls. Controls are always released on the way out, whatever the
//! termination reason.

use glam::{IVec3, Vec3};
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::core::types::{block_center, pitch_toward, yaw_toward, BlockAligned, EYE_HEIGHT};
use crate::motion::look::LookProfile;
use crate::motion::navigator::Navigator;
use crate::motion::{MotionOutcome, TerminationReason};
use crate::perception::scan::facing_cardinal;
use crate::session::AgentContext;
use crate::world::block;
use crate::world::link::ControlState;

/// Options for a direct walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub arrive_radius: f32,
    pub timeout: Duration,
}

impl WalkOptions {
    pub fn from_config(ctx: &AgentContext) -> Self {
        Self {
            arrive_radius: ctx.config.arrive_radius,
            timeout: Duration::from_millis(ctx.config.walk_timeout_ms),
        }
    }
}

const FORWARD: ControlState = ControlState {
    forward: true,
    jump: false,
    sneak: false,
};

const FORWARD_JUMP: ControlState = ControlState {
    forward: true,
    jump: true,
    sneak: false,
};

/// Direct short-range walk toward a point
///
/// Returns immediately when already within the arrival radius. Samples
/// displacement every `stuck_sample_ms`; on negligible movement it tries
/// to clear an instant-break obstacle in the path or jumps, a bounded
/// number of times, before giving up.
pub async fn walk_to(ctx: &AgentContext, target: Vec3, options: &WalkOptions) -> MotionOutcome {
    let world = ctx.world.as_ref();
    let start = world.agent().position;
    let initial_distance = start.distance(target);
    if initial_distance <= options.arrive_radius {
        return MotionOutcome::success(0.0, initial_distance);
    }
    // A reflex in progress owns the controls; do not even start
    if ctx.is_emergency() {
        return MotionOutcome::failed(TerminationReason::Stuck, 0.0, initial_distance);
    }

    let deadline = Instant::now() + options.timeout;
    ctx.look.set_idle_suppressed(true);
    ctx.look.face(start, target, LookProfile::Fast);
    world.set_control(FORWARD);

    let mut last_sample = start;
    let mut clear_attempts = 0u32;

    let outcome = loop {
        sleep(Duration::from_millis(ctx.config.stuck_sample_ms)).await;

        if !world.connected() {
            break failed(ctx, start, target, TerminationReason::Disconnected);
        }
        if ctx.is_emergency() {
            break failed(ctx, start, target, TerminationReason::Stuck);
        }

        let agent = world.agent();
        let remaining = agent.position.distance(target);
        if remaining <= options.arrive_radius {
            break MotionOutcome::success(start.distance(agent.position), remaining);
        }

        ctx.look.face(agent.position, target, LookProfile::Fast);

        let moved = agent.position.distance(last_sample);
        last_sample = agent.position;
        if moved < ctx.config.stuck_epsilon {
            if clear_attempts >= ctx.config.max_clear_attempts {
                break failed(ctx, start, target, TerminationReason::Stuck);
            }
            clear_attempts += 1;
            if !clear_instant_obstacle(ctx, agent.position, agent.yaw) {
                // Nothing breakable ahead; a timed jump may clear a step
                world.set_control(FORWARD_JUMP);
            }
            debug!(attempt = clear_attempts, "walk stalled, clearing path");
        } else {
            world.set_control(FORWARD);
        }

        if Instant::now() >= deadline {
            break failed(ctx, start, target, TerminationReason::Timeout);
        }
    };

    world.set_control(ControlState::default());
    ctx.look.set_idle_suppressed(false);
    ctx.record_move(&outcome);
    outcome
}

/// Delegated pathfinding toward a block goal
///
/// Polls the navigator on a fixed tick. Aborts with `BadPath` when the
/// remaining distance exceeds the initial distance plus the configured
/// margin; a stall first triggers bounded obstacle-break-and-resume cycles
/// before reporting `Stuck`.
pub async fn navigate_to(
    ctx: &AgentContext,
    navigator: &dyn Navigator,
    goal: IVec3,
    timeout: Duration,
) -> MotionOutcome {
    let world = ctx.world.as_ref();
    let start = world.agent().position;
    let goal_center = block_center(goal);
    let initial_distance = start.distance(goal_center);
    if initial_distance <= ctx.config.arrive_radius {
        return MotionOutcome::success(0.0, initial_distance);
    }
    if ctx.is_emergency() {
        return MotionOutcome::failed(TerminationReason::Stuck, 0.0, initial_distance);
    }

    ctx.look.set_idle_suppressed(true);
    if navigator.set_goal(world, goal).is_err() {
        ctx.look.set_idle_suppressed(false);
        let outcome = MotionOutcome::failed(TerminationReason::BadPath, 0.0, initial_distance);
        ctx.record_move(&outcome);
        return outcome;
    }

    let deadline = Instant::now() + timeout;
    let mut best_remaining = initial_distance;
    let mut last_progress_at = Instant::now();
    let mut break_cycles = 0u32;

    let outcome = loop {
        sleep(Duration::from_millis(ctx.config.path_poll_ms)).await;

        if !world.connected() {
            break failed(ctx, start, goal_center, TerminationReason::Disconnected);
        }
        if ctx.is_emergency() {
            break failed(ctx, start, goal_center, TerminationReason::Stuck);
        }

        // The camera is steered here, through the look controller, so the
        // look loop and the navigator never write competing orientations
        if let Some(point) = navigator.advance(world) {
            let agent = world.agent();
            let eye = agent.position + Vec3::new(0.0, EYE_HEIGHT, 0.0);
            ctx.look
                .snap(yaw_toward(agent.position, point), pitch_toward(eye, point));
        }
        let status = navigator.status(world);

        if status.finished || status.remaining_distance <= ctx.config.arrive_radius {
            let agent = world.agent();
            break MotionOutcome::success(
                start.distance(agent.position),
                status.remaining_distance,
            );
        }
        if status.no_path {
            break failed(ctx, start, goal_center, TerminationReason::BadPath);
        }
        // Bad-path abort fires before any timeout can
        if status.remaining_distance > initial_distance + ctx.config.bad_path_margin {
            debug!(
                remaining = status.remaining_distance,
                initial = initial_distance,
                "path diverging, aborting"
            );
            break failed(ctx, start, goal_center, TerminationReason::BadPath);
        }

        let now = Instant::now();
        if status.remaining_distance < best_remaining - 0.25 {
            best_remaining = status.remaining_distance;
            last_progress_at = now;
        } else if now.duration_since(last_progress_at)
            >= Duration::from_millis(ctx.config.stall_timeout_ms)
        {
            if break_cycles >= ctx.config.max_break_resume_cycles {
                break failed(ctx, start, goal_center, TerminationReason::Stuck);
            }
            break_cycles += 1;
            debug!(cycle = break_cycles, "path stalled, breaking obstacle");
            break_obstacle_ahead(ctx).await;
            last_progress_at = Instant::now();
        }

        if now >= deadline {
            break failed(ctx, start, goal_center, TerminationReason::Timeout);
        }
    };

    navigator.clear_goal(world);
    world.set_control(ControlState::default());
    ctx.look.set_idle_suppressed(false);
    ctx.record_move(&outcome);
    outcome
}

fn failed(ctx: &AgentContext, start: Vec3, target: Vec3, reason: TerminationReason) -> MotionOutcome {
    let position = ctx.world.agent().position;
    MotionOutcome::failed(reason, start.distance(position), position.distance(target))
}

/// Dig an instant-break obstacle in the path at feet or head height
///
/// Returns true if something was dug.
fn clear_instant_obstacle(ctx: &AgentContext, position: Vec3, yaw: f32) -> bool {
    let world = ctx.world.as_ref();
    let ahead = position.block() + facing_cardinal(yaw);
    let mut dug = false;
    for dy in 0..=1 {
        let cell = ahead + IVec3::new(0, dy, 0);
        if let Some(name) = world.block_at(cell) {
            if block::is_instant_break(&name) && world.start_dig(cell).is_ok() {
                dug = true;
            }
        }
    }
    dug
}

/// Break whatever is directly ahead at feet and head height, then wait
/// briefly for the cells to open
async fn break_obstacle_ahead(ctx: &AgentContext) {
    let world = ctx.world.as_ref();
    let agent = world.agent();
    let ahead = agent.position.block() + facing_cardinal(agent.yaw);
    let cells = [ahead, ahead + IVec3::new(0, 1, 0)];
    for cell in cells {
        if let Some(name) = world.block_at(cell) {
            if block::is_solid(&name) {
                let _ = world.start_dig(cell);
            }
        }
    }
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let open = cells.iter().all(|cell| {
            world
                .block_at(*cell)
                .map(|name| !block::is_solid(&name))
                .unwrap_or(false)
        });
        if open {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
}
