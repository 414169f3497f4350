//! Melee engagement
//!
//! Closes to attack reach and swings on a fixed cadence until the target
//! disappears from the entity list or the engagement budget runs out.

use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::actions::{ActionOutcome, MeasuredDelta};
use crate::core::error::{AgentError, Result};
use crate::core::types::Entity;
use crate::motion::controller::{walk_to, WalkOptions};
use crate::motion::look::LookProfile;
use crate::perception::fov::perceivable;
use crate::session::AgentContext;

/// Total engagement budget
const ENGAGE_BUDGET: Duration = Duration::from_secs(15);

/// Swing cadence
const SWING_INTERVAL: Duration = Duration::from_millis(600);

pub async fn run(ctx: &AgentContext, name: &str) -> Result<ActionOutcome> {
    let world = ctx.world.as_ref();
    let start = world.agent().position;

    let Some(target) = nearest_perceivable(ctx, name) else {
        return Err(AgentError::Unreachable(format!(
            "no perceivable {name} to attack"
        )));
    };
    debug!(name, id = ?target.id, "engaging");

    let deadline = Instant::now() + ENGAGE_BUDGET;
    loop {
        if !world.connected() {
            return Err(AgentError::Disconnected);
        }
        let agent = world.agent();
        let Some(current) = world
            .entities()
            .into_iter()
            .find(|entity| entity.id == target.id)
        else {
            // Gone from the entity list means down
            return Ok(ActionOutcome::ok(
                format!("defeated {name}"),
                MeasuredDelta {
                    moved: start.distance(agent.position),
                    inventory: Vec::new(),
                },
            ));
        };

        let distance = agent.position.distance(current.position);
        if distance > ctx.config.attack_reach {
            let options = WalkOptions {
                arrive_radius: ctx.config.attack_reach - 0.5,
                timeout: Duration::from_secs(3),
            };
            walk_to(ctx, current.position, &options).await;
        } else {
            ctx.look
                .face(agent.position, current.position, LookProfile::Fast);
            let _ = world.attack(current.id);
            sleep(SWING_INTERVAL).await;
        }

        if Instant::now() >= deadline {
            return Err(AgentError::Timeout {
                elapsed_ms: ENGAGE_BUDGET.as_millis() as u64,
                progress: format!("{name} still standing at {distance:.1}"),
            });
        }
    }
}

/// Nearest entity with this name that passes the strict perceivability test
fn nearest_perceivable(ctx: &AgentContext, name: &str) -> Option<Entity> {
    let world = ctx.world.as_ref();
    let agent = world.agent();
    world
        .entities()
        .into_iter()
        .filter(|entity| entity.name == name)
        .filter(|entity| perceivable(world, &ctx.config, &agent, entity.position, false))
        .min_by(|a, b| {
            let da = a.position.distance(agent.position);
            let db = b.position.distance(agent.position);
            da.total_cmp(&db)
        })
}
