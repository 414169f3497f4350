//! Stuck detection and physical recovery
//!
//! The detector turns per-move outcomes into an explicit phase machine;
//! the engine cycles an ordered set of physical strategies, bounded by a
//! session-wide attempt budget, and resets the machine only when a
//! strategy produced verified net movement.

pub mod detector;
pub mod strategies;

pub use detector::{next_phase, RecoveryPhase, StuckFlags, StuckState};
pub use strategies::{RecoveryOutcome, StrategyKind, STRATEGY_ORDER};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::session::AgentContext;

/// Summary of one recovery run
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub recovered: bool,
    pub attempts: u32,
    pub phase: RecoveryPhase,
    #[serde(skip)]
    pub outcomes: Vec<RecoveryOutcome>,
}

/// Cycle strategies until one proves net progress or the budget runs out
///
/// Every attempt counts against the session budget whether or not the
/// strategy applied cleanly; exhaustion is terminal until an external
/// reset.
pub async fn run_recovery(ctx: &AgentContext) -> RecoveryReport {
    ctx.stuck.lock().unwrap().force_stuck();
    ctx.look.set_idle_suppressed(true);

    let mut outcomes = Vec::new();
    let mut recovered = false;
    let mut attempts_used = 0u32;

    'cycle: loop {
        for strategy in STRATEGY_ORDER {
            if !strategy.applies(ctx) {
                continue;
            }
            let attempt = {
                let mut stuck = ctx.stuck.lock().unwrap();
                if !stuck.can_attempt(&ctx.config) {
                    stuck.mark_exhausted();
                    warn!(
                        attempts = stuck.recovery_attempts,
                        "recovery budget exhausted"
                    );
                    break 'cycle;
                }
                stuck.begin_attempt()
            };
            attempts_used = attempt;
            info!(attempt, strategy = strategy.name(), "attempting recovery");

            let outcome = strategy.attempt(ctx).await;
            let success = outcome.success;
            outcomes.push(outcome);
            if success {
                ctx.stuck.lock().unwrap().mark_recovered(Instant::now());
                info!(attempt, strategy = strategy.name(), "recovery succeeded");
                recovered = true;
                break 'cycle;
            }
        }
        // Full pass with no verified progress; keep cycling while the
        // budget allows, otherwise mark exhaustion on the next check.
        let mut stuck = ctx.stuck.lock().unwrap();
        if !stuck.can_attempt(&ctx.config) {
            stuck.mark_exhausted();
            warn!(
                attempts = stuck.recovery_attempts,
                "recovery budget exhausted"
            );
            break;
        }
    }

    ctx.look.set_idle_suppressed(false);
    let phase = ctx.stuck.lock().unwrap().phase();
    RecoveryReport {
        recovered,
        attempts: attempts_used,
        phase,
        outcomes,
    }
}
