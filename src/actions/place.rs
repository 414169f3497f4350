//! Block placement
//!
//! Placement verifies support before committing: the target cell must be
//! open with solid ground beneath it. Functional blocks get remembered as
//! landmarks so the agent can find its way back to them.

use glam::IVec3;
use tokio::time::Duration;
use tracing::debug;

use crate::actions::{ActionOutcome, MeasuredDelta};
use crate::core::error::{AgentError, Result};
use crate::core::types::{block_center, BlockAligned};
use crate::motion::controller::{walk_to, WalkOptions};
use crate::motion::look::LookProfile;
use crate::perception::scan::facing_cardinal;
use crate::session::AgentContext;
use crate::world::block;
use crate::world::events::Notification;

pub async fn run(
    ctx: &AgentContext,
    block_name: &str,
    position: Option<IVec3>,
) -> Result<ActionOutcome> {
    let world = ctx.world.as_ref();
    let start = world.agent().position;

    if world.inventory_count(block_name) == 0 {
        return Err(AgentError::CapabilityMissing(format!(
            "no {block_name} in inventory"
        )));
    }

    let cell = match position {
        Some(cell) => cell,
        None => auto_placement_cell(ctx).ok_or_else(|| {
            AgentError::Blocked("no supported open cell nearby to place into".into())
        })?,
    };
    if !supported(ctx, cell) {
        return Err(AgentError::Blocked(format!(
            "cell {cell} is occupied or has no support beneath it"
        )));
    }

    let center = block_center(cell);
    if start.distance(center) > ctx.config.reach {
        let options = WalkOptions {
            arrive_radius: ctx.config.reach - 0.5,
            timeout: Duration::from_millis(ctx.config.walk_timeout_ms),
        };
        walk_to(ctx, center, &options).await;
        if world.agent().position.distance(center) > ctx.config.reach {
            return Err(AgentError::Unreachable(format!(
                "cell {cell} is out of reach"
            )));
        }
    }

    ctx.look
        .face(world.agent().position, center, LookProfile::Fast);
    world.place_block(cell)?;

    let placed = world
        .block_at(cell)
        .map(|name| block::is_solid(&name))
        .unwrap_or(false);
    if !placed {
        return Err(AgentError::Blocked(format!(
            "placement at {cell} did not take"
        )));
    }

    if block::is_functional(block_name) {
        ctx.landmarks.record(block_name, cell);
        debug!(name = block_name, ?cell, "functional block remembered");
    }
    ctx.notifier.emit(Notification::BlockPlaced {
        name: block_name.to_string(),
        position: cell,
    });

    Ok(ActionOutcome::ok(
        format!("placed {block_name} at {cell}"),
        MeasuredDelta {
            moved: start.distance(world.agent().position),
            inventory: Vec::new(),
        },
    ))
}

/// Open cell with support directly ahead of the agent, feet level first
fn auto_placement_cell(ctx: &AgentContext) -> Option<IVec3> {
    let world = ctx.world.as_ref();
    let agent = world.agent();
    let feet = agent.position.block();
    let ahead = facing_cardinal(agent.yaw);

    let candidates = [
        feet + ahead,
        feet + ahead * 2,
        feet + ahead + IVec3::new(0, 1, 0),
    ];
    candidates.into_iter().find(|cell| supported(ctx, *cell))
}

/// Open cell with a solid block beneath it
fn supported(ctx: &AgentContext, cell: IVec3) -> bool {
    let world = ctx.world.as_ref();
    let open = world
        .block_at(cell)
        .map(|name| !block::is_solid(&name) && !block::is_liquid(&name))
        .unwrap_or(false);
    let support = world
        .block_at(cell + IVec3::new(0, -1, 0))
        .map(|name| block::is_solid(&name))
        .unwrap_or(false);
    // Standing inside the target cell also rules it out
    let agent_cells = {
        let feet = world.agent().position.block();
        [feet, feet + IVec3::new(0, 1, 0)]
    };
    open && support && !agent_cells.contains(&cell)
}
