//! Reflex monitor
//!
//! Subscribes to the world event bus and reacts to damage. The reflex
//! bypasses the action gate: it raises the session emergency flag so
//! cooperative motion loops yield, waits one sampling interval for them
//! to release the controls, then runs a source-specific escape.

use glam::Vec3;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, Duration, Instant};
use tracing::{info, warn};

use crate::core::types::horizontal_distance;
use crate::health::{classify, DamageSource, HealthAlert, HealthTracker};
use crate::motion::controller::{walk_to, WalkOptions};
use crate::recovery::StrategyKind;
use crate::session::AgentContext;
use crate::world::block;
use crate::world::events::{Notification, WorldEvent};
use crate::world::link::ControlState;

/// Run the monitor until the link closes or the session shuts down
pub async fn run(ctx: Arc<AgentContext>) {
    let mut events = ctx.world.subscribe();
    let mut tracker = HealthTracker::new(
        ctx.config.max_health_events,
        Duration::from_millis(ctx.config.damage_window_ms),
    );
    let mut last_reflex: Option<Instant> = None;

    loop {
        if ctx.is_shutdown() {
            return;
        }
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "health monitor lagged behind the event bus");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        match event {
            WorldEvent::HealthChanged { previous, current } => {
                let damage = previous - current;
                if damage <= 0.0 {
                    continue;
                }
                let now = Instant::now();
                tracker.record(damage, now);
                let windowed = tracker.windowed_damage(now);
                let source = classify(ctx.world.as_ref());

                let should_fire = source.is_environmental()
                    || current < ctx.config.critical_health
                    || windowed > ctx.config.damage_rate_threshold;
                let cooled_down = last_reflex
                    .map(|at| {
                        now.duration_since(at)
                            >= Duration::from_millis(ctx.config.reflex_cooldown_ms)
                    })
                    .unwrap_or(true);
                let reflex_fired = should_fire && cooled_down;

                let alert = HealthAlert {
                    health: current,
                    damage,
                    source: source.clone(),
                    windowed_damage: windowed,
                    reflex_fired,
                };
                warn!(
                    health = alert.health,
                    damage = alert.damage,
                    windowed = alert.windowed_damage,
                    source = ?alert.source,
                    reflex = alert.reflex_fired,
                    "damage taken"
                );

                if reflex_fired {
                    last_reflex = Some(now);
                    reflex_escape(&ctx, &source).await;
                }
            }
            WorldEvent::Death => {
                warn!("agent died");
                ctx.notifier.emit(Notification::Death);
            }
            WorldEvent::Disconnected => return,
            _ => {}
        }
    }
}

/// Preempt whatever is running and escape the damage source
async fn reflex_escape(ctx: &AgentContext, source: &DamageSource) {
    info!(?source, "reflex escape");
    ctx.raise_emergency();
    // One stuck-sampling interval is enough for any motion loop to
    // observe the flag and release the controls.
    sleep(Duration::from_millis(ctx.config.stuck_sample_ms + 100)).await;
    ctx.clear_emergency();

    ctx.look.set_idle_suppressed(true);
    match source {
        DamageSource::Drowning => {
            StrategyKind::LiquidEscape.attempt(ctx).await;
        }
        DamageSource::Suffocation => {
            StrategyKind::HorizontalClear.attempt(ctx).await;
        }
        DamageSource::Lava | DamageSource::Fire => flee_hazard(ctx).await,
        DamageSource::Attack(_) | DamageSource::Unknown => flee_threat(ctx).await,
    }
    ctx.look.set_idle_suppressed(false);
    ctx.world.set_control(ControlState::default());
}

/// Step off burning ground toward the first nearby cell that is not a hazard
async fn flee_hazard(ctx: &AgentContext) {
    use crate::core::types::{block_center, BlockAligned};
    use glam::IVec3;

    let world = ctx.world.as_ref();
    let feet = world.agent().position.block();
    const CARDINALS: [IVec3; 4] = [
        IVec3::new(0, 0, 1),
        IVec3::new(1, 0, 0),
        IVec3::new(0, 0, -1),
        IVec3::new(-1, 0, 0),
    ];

    for direction in CARDINALS {
        for distance in 2..=4 {
            let cell = feet + direction * distance;
            let safe = world
                .block_at(cell)
                .map(|name| name != "lava" && name != "fire" && !block::is_solid(&name))
                .unwrap_or(false);
            let floor = world
                .block_at(cell - IVec3::new(0, 1, 0))
                .map(|name| block::is_solid(&name))
                .unwrap_or(false);
            if safe && floor {
                let options = WalkOptions {
                    arrive_radius: ctx.config.arrive_radius,
                    timeout: Duration::from_secs(4),
                };
                let outcome = walk_to(ctx, block_center(cell), &options).await;
                if outcome.reached {
                    return;
                }
            }
        }
    }
}

/// Sprint directly away from the nearest hostile
async fn flee_threat(ctx: &AgentContext) {
    use crate::core::types::EntityKind;

    let world = ctx.world.as_ref();
    let agent = world.agent();
    let hostile = world
        .entities()
        .into_iter()
        .filter(|entity| entity.kind == EntityKind::Hostile)
        .min_by(|a, b| {
            let da = a.position.distance(agent.position);
            let db = b.position.distance(agent.position);
            da.total_cmp(&db)
        });

    let away = match hostile {
        Some(entity) => {
            let delta = agent.position - entity.position;
            if horizontal_distance(agent.position, entity.position) < 0.1 {
                Vec3::new(1.0, 0.0, 0.0)
            } else {
                Vec3::new(delta.x, 0.0, delta.z).normalize()
            }
        }
        // No visible attacker; any direction is as good as another
        None => Vec3::new(-agent.yaw.sin(), 0.0, agent.yaw.cos()),
    };

    let target = agent.position + away * 8.0;
    let options = WalkOptions {
        arrive_radius: 1.0,
        timeout: Duration::from_secs(5),
    };
    walk_to(ctx, target, &options).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AgentConfig;
    use crate::core::types::BlockAligned;
    use crate::world::sim::SimWorld;
    use glam::IVec3;
    use std::sync::Arc;

    fn context_with(world: Arc<SimWorld>) -> Arc<AgentContext> {
        let link: Arc<dyn crate::world::link::WorldLink> = world;
        AgentContext::new(link, AgentConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_escapes_fire() {
        let world = Arc::new(SimWorld::flat(63, 16));
        let ctx = context_with(world.clone());
        ctx.spawn_background();
        tokio::task::yield_now().await;

        let feet = IVec3::new(0, 64, 0);
        world.set_block(feet, "fire");
        world.set_on_fire(true);
        world.damage_agent(1.0);

        sleep(Duration::from_secs(8)).await;
        world.set_on_fire(false);
        let position = crate::world::link::WorldLink::agent(world.as_ref()).position;
        assert!(
            position.block() != feet,
            "agent should have stepped off the burning cell, still at {position:?}"
        );
        ctx.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_ignores_light_damage_at_full_health() {
        let world = Arc::new(SimWorld::flat(63, 16));
        let ctx = context_with(world.clone());
        ctx.spawn_background();
        tokio::task::yield_now().await;

        let start = crate::world::link::WorldLink::agent(world.as_ref()).position;
        // Light single hit, no environmental source, health stays high
        world.damage_agent(1.0);
        sleep(Duration::from_secs(3)).await;

        let position = crate::world::link::WorldLink::agent(world.as_ref()).position;
        assert!(
            position.distance(start) < 0.5,
            "no reflex expected for one light hit"
        );
        ctx.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_health_triggers_flee() {
        let world = Arc::new(SimWorld::flat(63, 16));
        world.spawn_entity(
            "zombie",
            crate::core::types::EntityKind::Hostile,
            Vec3::new(2.5, 64.0, 0.5),
        );
        let ctx = context_with(world.clone());
        ctx.spawn_background();
        tokio::task::yield_now().await;

        world.set_health(5.0);
        world.damage_agent(1.0);
        sleep(Duration::from_secs(8)).await;

        let position = crate::world::link::WorldLink::agent(world.as_ref()).position;
        assert!(
            horizontal_distance(position, Vec3::new(2.5, 64.0, 0.5)) > 2.0,
            "agent should have put distance between itself and the zombie"
        );
        ctx.shutdown();
    }
}
