//! Physical recovery strategies
//!
//! Each strategy is a bounded physical maneuver. Success is judged only
//! by measured net displacement or height gain after the attempt, never
//! by whether individual sub-steps reported success.

use glam::{IVec3, Vec3};
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::core::types::{block_center, horizontal_distance, BlockAligned};
use crate::motion::controller::{walk_to, WalkOptions};
use crate::motion::navigator::walkable;
use crate::session::AgentContext;
use crate::world::block;
use crate::world::link::ControlState;

/// Strategies in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Swim up and toward the nearest walkable shore
    LiquidEscape,
    /// Dig open a horizontal exit and step through it
    HorizontalClear,
    /// Jump-and-place a column beneath the agent
    Pillar,
    /// Carve an ascending stair out of the surrounding terrain
    Staircase,
    /// Randomized jump bursts as a last resort
    JumpSpam,
}

pub const STRATEGY_ORDER: [StrategyKind; 5] = [
    StrategyKind::LiquidEscape,
    StrategyKind::HorizontalClear,
    StrategyKind::Pillar,
    StrategyKind::Staircase,
    StrategyKind::JumpSpam,
];

/// Measured result of one strategy attempt
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub strategy: &'static str,
    pub success: bool,
    pub displacement: f32,
    pub height_gain: f32,
}

const FORWARD_JUMP: ControlState = ControlState {
    forward: true,
    jump: true,
    sneak: false,
};

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::LiquidEscape => "liquid_escape",
            StrategyKind::HorizontalClear => "horizontal_clear",
            StrategyKind::Pillar => "pillar",
            StrategyKind::Staircase => "staircase",
            StrategyKind::JumpSpam => "jump_spam",
        }
    }

    /// Whether this strategy can do anything in the current situation
    pub fn applies(&self, ctx: &AgentContext) -> bool {
        let world = ctx.world.as_ref();
        match self {
            StrategyKind::LiquidEscape => {
                let feet = world.agent().position.block();
                world
                    .block_at(feet)
                    .map(|name| block::is_liquid(&name))
                    .unwrap_or(false)
            }
            StrategyKind::Pillar => world.placeable_count() > 0,
            _ => true,
        }
    }

    /// Run the maneuver within the strategy time budget and measure it
    pub async fn attempt(&self, ctx: &AgentContext) -> RecoveryOutcome {
        let world = ctx.world.as_ref();
        let start = world.agent().position;
        let deadline = Instant::now() + Duration::from_millis(ctx.config.strategy_budget_ms);

        match self {
            StrategyKind::LiquidEscape => liquid_escape(ctx, deadline).await,
            StrategyKind::HorizontalClear => horizontal_clear(ctx, deadline).await,
            StrategyKind::Pillar => pillar(ctx, deadline).await,
            StrategyKind::Staircase => staircase(ctx, deadline).await,
            StrategyKind::JumpSpam => jump_spam(ctx, deadline).await,
        }

        world.set_control(ControlState::default());
        let end = world.agent().position;
        let displacement = horizontal_distance(start, end);
        let height_gain = end.y - start.y;
        let success = displacement >= ctx.config.min_progress || height_gain >= 1.0;
        debug!(
            strategy = self.name(),
            displacement, height_gain, success, "strategy attempt measured"
        );
        RecoveryOutcome {
            strategy: self.name(),
            success,
            displacement,
            height_gain,
        }
    }
}

/// Swim upward while turning, then head for the nearest walkable shore cell
async fn liquid_escape(ctx: &AgentContext, deadline: Instant) {
    let world = ctx.world.as_ref();
    let mut yaw = world.agent().yaw;

    while Instant::now() < deadline {
        if !world.connected() {
            return;
        }
        let agent = world.agent();
        let feet = agent.position.block();
        let in_liquid = world
            .block_at(feet)
            .map(|name| block::is_liquid(&name))
            .unwrap_or(false);
        if !in_liquid {
            // Out of the liquid; push onto the nearest walkable shore cell
            if let Some(shore) = nearest_shore(ctx, feet) {
                let options = WalkOptions {
                    arrive_radius: ctx.config.arrive_radius,
                    timeout: Duration::from_secs(3),
                };
                walk_to(ctx, block_center(shore) + Vec3::new(0.0, 1.0, 0.0), &options).await;
            }
            return;
        }

        yaw += FRAC_PI_4;
        ctx.look
            .aim(yaw, -0.4, crate::motion::look::LookProfile::Fast);
        world.set_control(FORWARD_JUMP);
        sleep(Duration::from_millis(400)).await;
    }
}

/// Nearest walkable cell within a small ring around the agent
fn nearest_shore(ctx: &AgentContext, feet: IVec3) -> Option<IVec3> {
    let world = ctx.world.as_ref();
    let mut best: Option<(i32, IVec3)> = None;
    for dx in -3..=3i32 {
        for dz in -3..=3i32 {
            if dx == 0 && dz == 0 {
                continue;
            }
            for dy in -1..=1i32 {
                let cell = feet + IVec3::new(dx, dy, dz);
                if walkable(world, cell - IVec3::new(0, 1, 0)) {
                    let score = dx * dx + dz * dz + dy.abs();
                    if best.map(|(s, _)| score < s).unwrap_or(true) {
                        best = Some((score, cell - IVec3::new(0, 1, 0)));
                    }
                }
            }
        }
    }
    best.map(|(_, cell)| cell)
}

/// Dig through each cardinal wall in turn and step through the first gap
async fn horizontal_clear(ctx: &AgentContext, deadline: Instant) {
    let world = ctx.world.as_ref();
    const CARDINALS: [IVec3; 4] = [
        IVec3::new(0, 0, 1),
        IVec3::new(1, 0, 0),
        IVec3::new(0, 0, -1),
        IVec3::new(-1, 0, 0),
    ];

    for direction in CARDINALS {
        if Instant::now() >= deadline || !world.connected() {
            return;
        }
        let feet = world.agent().position.block();
        let mut cleared = true;
        for depth in 1..=ctx.config.clear_probe_depth as i32 {
            for dy in 0..=1 {
                let cell = feet + direction * depth + IVec3::new(0, dy, 0);
                if !dig_and_wait(ctx, cell, Duration::from_secs(2)).await {
                    cleared = false;
                }
            }
            if !cleared {
                break;
            }
        }
        if !cleared {
            continue;
        }
        let target = block_center(feet + direction * ctx.config.clear_probe_depth as i32);
        let options = WalkOptions {
            arrive_radius: ctx.config.arrive_radius,
            timeout: Duration::from_secs(3),
        };
        let outcome = walk_to(ctx, target, &options).await;
        if outcome.reached {
            return;
        }
    }
}

/// Dig one cell if solid and wait for it to open; true when the cell is open
async fn dig_and_wait(ctx: &AgentContext, cell: IVec3, budget: Duration) -> bool {
    let world = ctx.world.as_ref();
    match world.block_at(cell) {
        None => return false,
        Some(name) if !block::is_solid(&name) => return true,
        Some(_) => {
            if world.start_dig(cell).is_err() {
                return false;
            }
        }
    }
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline {
        sleep(Duration::from_millis(100)).await;
        if let Some(name) = world.block_at(cell) {
            if !block::is_solid(&name) {
                return true;
            }
        }
    }
    false
}

/// Jump-and-place a support column to gain height
async fn pillar(ctx: &AgentContext, deadline: Instant) {
    let world = ctx.world.as_ref();
    let start_y = world.agent().position.y;
    let mut stalled_cycles = 0u32;

    ctx.look.aim(
        world.agent().yaw,
        FRAC_PI_2 * 0.9,
        crate::motion::look::LookProfile::Fast,
    );

    for _ in 0..ctx.config.pillar_target_height {
        if Instant::now() >= deadline || !world.connected() {
            break;
        }
        if world.placeable_count() == 0 {
            break;
        }
        let agent = world.agent();
        let head_clear = world
            .block_at(agent.position.block() + IVec3::new(0, 2, 0))
            .map(|name| !block::is_solid(&name))
            .unwrap_or(false);
        if !head_clear && !dig_and_wait(
            ctx,
            agent.position.block() + IVec3::new(0, 2, 0),
            Duration::from_secs(2),
        )
        .await
        {
            break;
        }

        let base = agent.position.block();
        let before_y = agent.position.y;
        world.set_control(ControlState {
            forward: false,
            jump: true,
            sneak: false,
        });
        sleep(Duration::from_millis(150)).await;
        let _ = world.place_block(base);
        world.set_control(ControlState::default());
        sleep(Duration::from_millis(350)).await;

        if world.agent().position.y - before_y < 0.5 {
            stalled_cycles += 1;
            if stalled_cycles >= 2 {
                break;
            }
        } else {
            stalled_cycles = 0;
        }
    }
    debug!(gained = world.agent().position.y - start_y, "pillar finished");
}

/// Carve and climb an ascending stair toward the most open heading
async fn staircase(ctx: &AgentContext, deadline: Instant) {
    let world = ctx.world.as_ref();
    let direction = most_open_cardinal(ctx);

    for _ in 0..5 {
        if Instant::now() >= deadline || !world.connected() {
            return;
        }
        let feet = world.agent().position.block();
        let step = feet + direction;
        // Open the two cells above the next tread
        let opened = dig_and_wait(ctx, step + IVec3::new(0, 1, 0), Duration::from_secs(2)).await
            && dig_and_wait(ctx, step + IVec3::new(0, 2, 0), Duration::from_secs(2)).await;
        if !opened {
            return;
        }
        let tread_solid = world
            .block_at(step)
            .map(|name| block::is_solid(&name))
            .unwrap_or(false);
        if !tread_solid {
            let _ = world.place_block(step);
        }

        let before = world.agent().position;
        ctx.look.face(
            before,
            block_center(step + IVec3::new(0, 1, 0)),
            crate::motion::look::LookProfile::Fast,
        );
        world.set_control(FORWARD_JUMP);
        sleep(Duration::from_millis(800)).await;
        world.set_control(ControlState::default());

        if world.agent().position.y - before.y < 0.5 {
            return;
        }
    }
}

/// Heading with the most open cells at head height within three blocks
fn most_open_cardinal(ctx: &AgentContext) -> IVec3 {
    let world = ctx.world.as_ref();
    let head = ctx.world.agent().position.block() + IVec3::new(0, 1, 0);
    const CARDINALS: [IVec3; 4] = [
        IVec3::new(0, 0, 1),
        IVec3::new(1, 0, 0),
        IVec3::new(0, 0, -1),
        IVec3::new(-1, 0, 0),
    ];
    let mut best = CARDINALS[0];
    let mut best_open = -1i32;
    for direction in CARDINALS {
        let mut open = 0i32;
        for depth in 1..=3 {
            match world.block_at(head + direction * depth) {
                Some(name) if !block::is_solid(&name) => open += 1,
                _ => break,
            }
        }
        if open > best_open {
            best_open = open;
            best = direction;
        }
    }
    best
}

/// Randomized jump bursts; sometimes geometry yields to brute force
async fn jump_spam(ctx: &AgentContext, deadline: Instant) {
    let world = ctx.world.as_ref();

    for _ in 0..8 {
        if Instant::now() >= deadline || !world.connected() {
            return;
        }
        // ThreadRng is not Send; draw and drop it before the sleeps below
        let yaw = rand::thread_rng().gen_range(-PI..PI);
        ctx.look
            .aim(yaw, 0.0, crate::motion::look::LookProfile::Fast);
        world.set_control(FORWARD_JUMP);
        sleep(Duration::from_millis(400)).await;
        world.set_control(ControlState::default());
        sleep(Duration::from_millis(100)).await;
    }
}
