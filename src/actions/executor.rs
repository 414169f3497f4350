//! Single-flight action executor
//!
//! At most one physical action runs at a time. A request arriving while
//! the gate is held is rejected as busy before any side effect happens;
//! only the look interpolation loop and the reflex monitor may act
//! concurrently with the holder.

use glam::Vec3;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::actions::{ActionOutcome, ActionRequest, MeasuredDelta, MoveTarget};
use crate::core::error::{AgentError, Result};
use crate::motion::controller::{navigate_to, walk_to, WalkOptions};
use crate::motion::direction::move_direction;
use crate::motion::navigator::{GridNavigator, NavigatorOptions};
use crate::motion::{MotionOutcome, TerminationReason};
use crate::recovery::run_recovery;
use crate::session::AgentContext;

/// Execute one action request
///
/// The busy rejection happens before any world mutation. Errors marked
/// retryable get exactly one bounded local retry before surfacing.
pub async fn execute(ctx: &AgentContext, request: ActionRequest) -> ActionOutcome {
    let Ok(_guard) = ctx.gate.try_lock() else {
        debug!(kind = request.kind(), "action rejected, executor busy");
        return ActionOutcome::busy();
    };

    info!(kind = request.kind(), "action started");
    let start = ctx.world.agent().position;

    let mut result = dispatch(ctx, request.clone()).await;
    if let Err(error) = &result {
        if error.is_retryable() {
            debug!(kind = request.kind(), %error, "retrying action once");
            result = dispatch(ctx, request).await;
        }
    }

    match result {
        Ok(outcome) => {
            info!(success = outcome.success, message = %outcome.message, "action finished");
            outcome
        }
        Err(error) => {
            info!(%error, "action failed");
            let end = ctx.world.agent().position;
            ActionOutcome::failed(
                &error,
                MeasuredDelta {
                    moved: start.distance(end),
                    inventory: Vec::new(),
                },
            )
        }
    }
}

async fn dispatch(ctx: &AgentContext, request: ActionRequest) -> Result<ActionOutcome> {
    match request {
        ActionRequest::Move { target } => run_move(ctx, target).await,
        ActionRequest::Mine { block } => crate::actions::mine::run(ctx, &block).await,
        ActionRequest::Place { block, position } => {
            crate::actions::place::run(ctx, &block, position).await
        }
        ActionRequest::Attack { name } => crate::actions::attack::run(ctx, &name).await,
        ActionRequest::Recover => {
            let report = run_recovery(ctx).await;
            let message = if report.recovered {
                format!("recovered after {} attempts", report.attempts)
            } else {
                format!("recovery exhausted after {} attempts", report.attempts)
            };
            Ok(ActionOutcome {
                success: report.recovered,
                message,
                delta: MeasuredDelta::default(),
                collected: false,
                failure: None,
            })
        }
        ActionRequest::Wait { duration_ms } => {
            sleep(Duration::from_millis(duration_ms)).await;
            Ok(ActionOutcome::ok(
                format!("waited {duration_ms}ms"),
                MeasuredDelta::default(),
            ))
        }
    }
}

async fn run_move(ctx: &AgentContext, target: MoveTarget) -> Result<ActionOutcome> {
    let outcome = match target {
        MoveTarget::Position(position) => {
            walk_to(ctx, position, &WalkOptions::from_config(ctx)).await
        }
        MoveTarget::Block(goal) => {
            let navigator = navigator_for(ctx);
            navigate_to(
                ctx,
                &navigator,
                goal,
                Duration::from_millis(ctx.config.navigate_timeout_ms),
            )
            .await
        }
        MoveTarget::Direction {
            direction,
            distance,
        } => move_direction(ctx, direction, distance).await,
        MoveTarget::Landmark(name) => {
            let from = ctx.world.agent().position;
            let Some(goal) = ctx.landmarks.nearest(&name, from) else {
                return Err(AgentError::InvalidRequest(format!(
                    "no remembered landmark named {name}"
                )));
            };
            let navigator = navigator_for(ctx);
            navigate_to(
                ctx,
                &navigator,
                goal,
                Duration::from_millis(ctx.config.navigate_timeout_ms),
            )
            .await
        }
    };
    Ok(motion_to_action(ctx.world.agent().position, outcome))
}

pub(crate) fn navigator_for(ctx: &AgentContext) -> GridNavigator {
    GridNavigator::new(NavigatorOptions {
        surface_y: ctx.config.surface_y as i32,
        ..Default::default()
    })
}

fn motion_to_action(end: Vec3, outcome: MotionOutcome) -> ActionOutcome {
    let delta = MeasuredDelta {
        moved: outcome.distance_moved,
        inventory: Vec::new(),
    };
    if outcome.reached {
        return ActionOutcome::ok(
            format!("arrived at {:.1} {:.1} {:.1}", end.x, end.y, end.z),
            delta,
        );
    }
    let error = match outcome.reason {
        TerminationReason::Timeout => AgentError::Timeout {
            elapsed_ms: 0,
            progress: format!(
                "moved {:.1}, {:.1} remaining",
                outcome.distance_moved, outcome.remaining_distance
            ),
        },
        TerminationReason::Disconnected => AgentError::Disconnected,
        TerminationReason::BadPath => {
            AgentError::Unreachable(format!("{:.1} remaining", outcome.remaining_distance))
        }
        TerminationReason::Stuck | TerminationReason::Success => {
            AgentError::Blocked(format!("{:.1} remaining", outcome.remaining_distance))
        }
    };
    ActionOutcome::failed(&error, delta)
}
