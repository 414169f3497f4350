//! Session context and background services
//!
//! `AgentContext` bundles the world link, configuration, and the shared
//! session state every subsystem needs: the stuck detector, the single
//! action gate, the look controller, landmark memory, and the emergency
//! flag the reflex layer raises to preempt cooperative motion loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::core::config::AgentConfig;
use crate::memory::landmarks::LandmarkStore;
use crate::motion::look::LookController;
use crate::motion::MotionOutcome;
use crate::recovery::StuckState;
use crate::world::events::Notifier;
use crate::world::link::WorldLink;

/// Cadence of the look interpolation loop
const LOOK_TICK: Duration = Duration::from_millis(50);

/// Shared per-session state
pub struct AgentContext {
    pub world: Arc<dyn WorldLink>,
    pub config: AgentConfig,
    pub stuck: Mutex<StuckState>,
    /// Single-flight action gate; `try_lock` failure means busy
    pub gate: tokio::sync::Mutex<()>,
    pub look: LookController,
    pub landmarks: Arc<LandmarkStore>,
    pub notifier: Notifier,
    emergency: AtomicBool,
    shutdown: AtomicBool,
}

impl AgentContext {
    pub fn new(world: Arc<dyn WorldLink>, config: AgentConfig) -> Arc<Self> {
        Self::configured(
            world,
            config,
            Arc::new(LandmarkStore::in_memory()),
            Notifier::sink(),
        )
    }

    /// Build a context with an explicit landmark store and notification sink
    pub fn configured(
        world: Arc<dyn WorldLink>,
        config: AgentConfig,
        landmarks: Arc<LandmarkStore>,
        notifier: Notifier,
    ) -> Arc<Self> {
        Arc::new(Self {
            world,
            config,
            stuck: Mutex::new(StuckState::new(Instant::now())),
            gate: tokio::sync::Mutex::new(()),
            look: LookController::new(),
            landmarks,
            notifier,
            emergency: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        })
    }

    /// True while a reflex escape is preempting cooperative motion
    pub fn is_emergency(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    pub fn raise_emergency(&self) {
        self.emergency.store(true, Ordering::SeqCst);
    }

    pub fn clear_emergency(&self) {
        self.emergency.store(false, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop background loops and flush persistent state
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Err(error) = self.landmarks.flush() {
            debug!(%error, "landmark flush at shutdown failed");
        }
        info!("session shut down");
    }

    /// Feed one motion outcome to the stuck detector
    pub fn record_move(&self, outcome: &MotionOutcome) {
        let now = Instant::now();
        let position = self.world.agent().position;
        let moved = outcome.reached || outcome.distance_moved >= self.config.min_progress;
        let mut stuck = self.stuck.lock().unwrap();
        stuck.record_move(position, moved, now);
        stuck.evaluate(&self.config, now);
    }

    /// Spawn the session's background services
    ///
    /// The look loop is the only task allowed to touch the world
    /// concurrently with an in-flight action; the flush loop persists
    /// landmark memory on a debounce.
    pub fn spawn_background(self: &Arc<Self>) {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            while !ctx.is_shutdown() && ctx.world.connected() {
                ctx.look
                    .step(ctx.world.as_ref(), &ctx.config, LOOK_TICK.as_secs_f32());
                sleep(LOOK_TICK).await;
            }
        });

        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let debounce = Duration::from_millis(ctx.config.landmark_flush_debounce_ms);
            while !ctx.is_shutdown() && ctx.world.connected() {
                sleep(debounce).await;
                if let Err(error) = ctx.landmarks.flush_if_dirty() {
                    debug!(%error, "landmark flush failed");
                }
            }
        });

        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            crate::health::monitor::run(ctx).await;
        });
    }
}
