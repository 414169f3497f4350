//! Stuck detection state machine
//!
//! Session-lifetime state fed by every move outcome. Transitions are pure
//! functions over elapsed time, displacement, and the consecutive-failure
//! count; the recovery engine moves the machine through Recovering and
//! back to Normal only on verified net progress.

use glam::Vec3;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

use crate::core::config::AgentConfig;
use crate::core::types::horizontal_distance;

/// Bounded position-history ring length
pub const POSITION_HISTORY_LEN: usize = 10;

/// States of the stuck/recovery machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryPhase {
    Normal,
    Stuck,
    Recovering,
    Exhausted,
}

/// Pure transition function for the detection edge
///
/// Only the Normal -> Stuck edge is decided here; entering Recovering,
/// Normal (recovered), or Exhausted is driven by the recovery engine
/// because those transitions depend on strategy results.
pub fn next_phase(
    phase: RecoveryPhase,
    since_success: Duration,
    net_displacement: f32,
    consecutive_blocked: u32,
    config: &AgentConfig,
) -> RecoveryPhase {
    match phase {
        RecoveryPhase::Normal => {
            let blocked_out = consecutive_blocked >= config.blocked_moves_threshold;
            let stalled = since_success >= Duration::from_millis(config.stall_window_ms)
                && net_displacement < config.min_progress;
            if blocked_out || stalled {
                RecoveryPhase::Stuck
            } else {
                RecoveryPhase::Normal
            }
        }
        other => other,
    }
}

/// Outbound stuck/recovery flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StuckFlags {
    pub phase: RecoveryPhase,
    pub consecutive_blocked_moves: u32,
    pub recovery_attempts: u32,
}

/// Session-lifetime stuck state
#[derive(Debug)]
pub struct StuckState {
    pub consecutive_blocked_moves: u32,
    pub recovery_attempts: u32,
    phase: RecoveryPhase,
    pub last_successful_move: Instant,
    history: VecDeque<Vec3>,
}

impl StuckState {
    pub fn new(now: Instant) -> Self {
        Self {
            consecutive_blocked_moves: 0,
            recovery_attempts: 0,
            phase: RecoveryPhase::Normal,
            last_successful_move: now,
            history: VecDeque::with_capacity(POSITION_HISTORY_LEN),
        }
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    pub fn in_recovery(&self) -> bool {
        self.phase == RecoveryPhase::Recovering
    }

    pub fn flags(&self) -> StuckFlags {
        StuckFlags {
            phase: self.phase,
            consecutive_blocked_moves: self.consecutive_blocked_moves,
            recovery_attempts: self.recovery_attempts,
        }
    }

    /// Record one motion outcome
    pub fn record_move(&mut self, position: Vec3, moved: bool, now: Instant) {
        self.history.push_back(position);
        while self.history.len() > POSITION_HISTORY_LEN {
            self.history.pop_front();
        }
        if moved {
            self.consecutive_blocked_moves = 0;
            self.last_successful_move = now;
        } else {
            self.consecutive_blocked_moves += 1;
        }
    }

    /// Net horizontal displacement across the history window
    pub fn net_displacement(&self) -> f32 {
        match (self.history.front(), self.history.back()) {
            (Some(first), Some(last)) => horizontal_distance(*first, *last),
            _ => 0.0,
        }
    }

    /// Re-evaluate the detection edge
    pub fn evaluate(&mut self, config: &AgentConfig, now: Instant) -> RecoveryPhase {
        self.phase = next_phase(
            self.phase,
            now.duration_since(self.last_successful_move),
            self.net_displacement(),
            self.consecutive_blocked_moves,
            config,
        );
        self.phase
    }

    /// Force the Stuck phase, for explicit recovery requests
    pub fn force_stuck(&mut self) {
        if self.phase == RecoveryPhase::Normal {
            self.phase = RecoveryPhase::Stuck;
        }
    }

    /// Whether another recovery attempt is permitted
    pub fn can_attempt(&self, config: &AgentConfig) -> bool {
        self.recovery_attempts < config.max_recovery_attempts
    }

    /// Enter Recovering and count the attempt
    pub fn begin_attempt(&mut self) -> u32 {
        self.phase = RecoveryPhase::Recovering;
        self.recovery_attempts += 1;
        self.recovery_attempts
    }

    /// Reset after a strategy proved net progress
    ///
    /// This is the only way the counters reset; an attempted but
    /// ineffective strategy never clears them.
    pub fn mark_recovered(&mut self, now: Instant) {
        self.consecutive_blocked_moves = 0;
        self.recovery_attempts = 0;
        self.phase = RecoveryPhase::Normal;
        self.last_successful_move = now;
        self.history.clear();
    }

    pub fn mark_exhausted(&mut self) {
        self.phase = RecoveryPhase::Exhausted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> AgentConfig {
        AgentConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_blocked_moves_trigger_stuck() {
        let config = config();
        let now = Instant::now();
        let mut state = StuckState::new(now);
        let position = Vec3::new(0.5, 64.0, 0.5);

        for _ in 0..config.blocked_moves_threshold {
            state.record_move(position, false, now);
        }
        assert_eq!(state.evaluate(&config, now), RecoveryPhase::Stuck);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_move_resets_blocked_count() {
        let config = config();
        let now = Instant::now();
        let mut state = StuckState::new(now);
        let position = Vec3::new(0.5, 64.0, 0.5);

        state.record_move(position, false, now);
        state.record_move(position, false, now);
        state.record_move(Vec3::new(5.5, 64.0, 0.5), true, now);
        assert_eq!(state.consecutive_blocked_moves, 0);
        assert_eq!(state.evaluate(&config, now), RecoveryPhase::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_without_displacement_triggers_stuck() {
        let config = config();
        let now = Instant::now();
        let mut state = StuckState::new(now);
        let position = Vec3::new(0.5, 64.0, 0.5);
        state.record_move(position, true, now);

        let later = now + Duration::from_millis(config.stall_window_ms + 1);
        state.record_move(position + Vec3::new(0.1, 0.0, 0.0), false, later);
        assert_eq!(state.evaluate(&config, later), RecoveryPhase::Stuck);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded() {
        let now = Instant::now();
        let mut state = StuckState::new(now);
        for i in 0..50 {
            state.record_move(Vec3::new(i as f32, 64.0, 0.5), true, now);
        }
        assert!(state.net_displacement() <= 9.0 + f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_bounded_before_exhausted() {
        let config = config();
        let now = Instant::now();
        let mut state = StuckState::new(now);
        state.force_stuck();

        let mut attempts = 0;
        while state.can_attempt(&config) {
            attempts = state.begin_attempt();
        }
        state.mark_exhausted();
        assert_eq!(attempts, config.max_recovery_attempts);
        assert_eq!(state.phase(), RecoveryPhase::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_resets_everything() {
        let config = config();
        let now = Instant::now();
        let mut state = StuckState::new(now);
        let position = Vec3::new(0.5, 64.0, 0.5);
        for _ in 0..5 {
            state.record_move(position, false, now);
        }
        state.force_stuck();
        state.begin_attempt();
        state.mark_recovered(now);

        assert_eq!(state.phase(), RecoveryPhase::Normal);
        assert_eq!(state.recovery_attempts, 0);
        assert_eq!(state.consecutive_blocked_moves, 0);
        assert!(state.can_attempt(&config));
    }

    proptest! {
        /// The detection edge never leaves the Normal/Stuck pair, and once
        /// out of Normal the pure transition is the identity.
        #[test]
        fn prop_next_phase_closed(
            since_ms in 0u64..120_000,
            net in 0.0f32..64.0,
            blocked in 0u32..32,
        ) {
            let config = AgentConfig::default();
            let from_normal = next_phase(
                RecoveryPhase::Normal,
                Duration::from_millis(since_ms),
                net,
                blocked,
                &config,
            );
            prop_assert!(matches!(from_normal, RecoveryPhase::Normal | RecoveryPhase::Stuck));

            for phase in [RecoveryPhase::Stuck, RecoveryPhase::Recovering, RecoveryPhase::Exhausted] {
                let next = next_phase(phase, Duration::from_millis(since_ms), net, blocked, &config);
                prop_assert_eq!(next, phase);
            }
        }

        /// Attempts gated by can_attempt never exceed the configured bound.
        #[test]
        fn prop_attempts_never_exceed_bound(max in 1u32..16) {
            let config = AgentConfig { max_recovery_attempts: max, ..Default::default() };
            let now = Instant::now();
            let mut state = StuckState::new(now);
            state.force_stuck();
            for _ in 0..max * 3 {
                if !state.can_attempt(&config) {
                    state.mark_exhausted();
                    break;
                }
                state.begin_attempt();
                prop_assert!(state.recovery_attempts <= max);
            }
            prop_assert_eq!(state.recovery_attempts, max);
        }
    }
}
