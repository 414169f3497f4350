//! Look smoothing
//!
//! Yaw and pitch interpolate continuously toward a target orientation at
//! one of two rate profiles: fast while navigating, slow while idle. The
//! loop runs independently of any single motion call and is the only
//! subsystem allowed to act concurrently with an in-flight action.

use glam::Vec3;
use std::sync::Mutex;

use crate::core::config::AgentConfig;
use crate::core::types::{angle_delta, pitch_toward, yaw_toward, EntityKind, EYE_HEIGHT};
use crate::world::link::WorldLink;

/// Idle glances only target creatures this close, blocks
const IDLE_GLANCE_RANGE: f32 = 8.0;

/// Interpolation rate profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookProfile {
    Fast,
    Slow,
}

struct LookState {
    target_yaw: f32,
    target_pitch: f32,
    current_yaw: f32,
    current_pitch: f32,
    profile: LookProfile,
    /// Navigation and recovery set this to keep ambient idle looks from
    /// fighting for the camera
    idle_suppressed: bool,
    initialized: bool,
}

/// Shared handle to the look interpolation state
pub struct LookController {
    state: Mutex<LookState>,
}

impl LookController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LookState {
                target_yaw: 0.0,
                target_pitch: 0.0,
                current_yaw: 0.0,
                current_pitch: 0.0,
                profile: LookProfile::Slow,
                idle_suppressed: false,
                initialized: false,
            }),
        }
    }

    /// Aim the camera from one position toward another
    pub fn face(&self, from: Vec3, to: Vec3, profile: LookProfile) {
        let eye = from + Vec3::new(0.0, EYE_HEIGHT, 0.0);
        let mut state = self.state.lock().unwrap();
        state.target_yaw = yaw_toward(from, to);
        state.target_pitch = pitch_toward(eye, to);
        state.profile = profile;
    }

    /// Set explicit yaw/pitch targets
    pub fn aim(&self, yaw: f32, pitch: f32, profile: LookProfile) {
        let mut state = self.state.lock().unwrap();
        state.target_yaw = yaw;
        state.target_pitch = pitch;
        state.profile = profile;
    }

    /// Jump straight to an orientation, skipping interpolation
    ///
    /// Used by the path poll loop, which already re-steers every tick;
    /// the camera is the loop's to command, so no second writer touches
    /// `set_look` directly.
    pub fn snap(&self, yaw: f32, pitch: f32) {
        let mut state = self.state.lock().unwrap();
        state.target_yaw = yaw;
        state.target_pitch = pitch;
        state.current_yaw = yaw;
        state.current_pitch = pitch;
        state.initialized = true;
    }

    pub fn set_idle_suppressed(&self, suppressed: bool) {
        self.state.lock().unwrap().idle_suppressed = suppressed;
    }

    pub fn idle_suppressed(&self) -> bool {
        self.state.lock().unwrap().idle_suppressed
    }

    /// One interpolation step; applies the result to the world
    pub fn step(&self, world: &dyn WorldLink, config: &AgentConfig, dt: f32) {
        if !self.idle_suppressed() {
            self.idle_glance(world);
        }
        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            let agent = world.agent();
            state.current_yaw = agent.yaw;
            state.current_pitch = agent.pitch;
            state.target_yaw = agent.yaw;
            state.target_pitch = agent.pitch;
            state.initialized = true;
        }
        let rate = match state.profile {
            LookProfile::Fast => config.look_fast_rate,
            LookProfile::Slow => config.look_slow_rate,
        };
        let max_step = rate * dt;
        state.current_yaw = approach(state.current_yaw, state.target_yaw, max_step);
        state.current_pitch = approach(state.current_pitch, state.target_pitch, max_step);
        world.set_look(state.current_yaw, state.current_pitch);
    }

    /// Ambient glance at the nearest creature while nothing is navigating
    fn idle_glance(&self, world: &dyn WorldLink) {
        let agent = world.agent();
        let nearest = world
            .entities()
            .into_iter()
            .filter(|entity| entity.kind != EntityKind::Item)
            .map(|entity| (entity.position.distance(agent.position), entity))
            .filter(|(distance, _)| *distance <= IDLE_GLANCE_RANGE)
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, entity)) = nearest {
            self.face(agent.position, entity.position, LookProfile::Slow);
        }
    }
}

impl Default for LookController {
    fn default() -> Self {
        Self::new()
    }
}

/// Move an angle toward a target by at most `max_step`, shortest way round
fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = angle_delta(target, current);
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step * delta.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sim::SimWorld;

    #[test]
    fn test_approach_clamps_step() {
        let next = approach(0.0, 1.0, 0.1);
        assert!((next - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_approach_takes_short_way_around() {
        let next = approach(3.0, -3.0, 0.1);
        // Wrapping through PI is shorter than going back through zero
        assert!(next > 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_converges_on_target() {
        let world = SimWorld::flat(63, 16);
        let config = AgentConfig::default();
        let look = LookController::new();
        look.aim(1.0, 0.2, LookProfile::Fast);
        for _ in 0..40 {
            look.step(&world, &config, 0.05);
        }
        let agent = crate::world::link::WorldLink::agent(&world);
        assert!((agent.yaw - 1.0).abs() < 1e-3);
        assert!((agent.pitch - 0.2).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snap_holds_across_steps() {
        let world = SimWorld::flat(63, 16);
        let config = AgentConfig::default();
        let look = LookController::new();
        look.snap(-1.2, 0.3);
        for _ in 0..5 {
            look.step(&world, &config, 0.05);
        }
        let agent = crate::world::link::WorldLink::agent(&world);
        assert_eq!(agent.yaw, -1.2);
        assert_eq!(agent.pitch, 0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_glance_turns_toward_nearby_creature() {
        use glam::Vec3;

        let world = SimWorld::flat(63, 16);
        world.spawn_entity(
            "cow",
            EntityKind::Passive,
            Vec3::new(-3.5, 64.5, 0.5),
        );
        let config = AgentConfig::default();
        let look = LookController::new();
        for _ in 0..40 {
            look.step(&world, &config, 0.05);
        }
        let agent = crate::world::link::WorldLink::agent(&world);
        assert!((agent.yaw - std::f32::consts::FRAC_PI_2).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppression_disables_idle_glance() {
        use glam::Vec3;

        let world = SimWorld::flat(63, 16);
        world.spawn_entity(
            "cow",
            EntityKind::Passive,
            Vec3::new(-3.5, 64.5, 0.5),
        );
        let config = AgentConfig::default();
        let look = LookController::new();
        look.set_idle_suppressed(true);
        for _ in 0..40 {
            look.step(&world, &config, 0.05);
        }
        let agent = crate::world::link::WorldLink::agent(&world);
        assert!(agent.yaw.abs() < 1e-6);
    }
}
