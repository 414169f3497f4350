//! Health tracking and damage classification
//!
//! Damage deltas from the event bus are attributed to a source by
//! inspecting the blocks around the agent and nearby hostiles, in a fixed
//! priority order. A rolling window over recent damage drives the
//! sustained-damage reflex trigger.

pub mod monitor;

use glam::IVec3;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

use crate::core::types::{BlockAligned, EntityKind};
use crate::world::block;
use crate::world::link::WorldLink;

/// Range within which a hostile gets the blame for unexplained damage
const ATTACK_ATTRIBUTION_RANGE: f32 = 6.0;

/// Classified cause of a damage event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DamageSource {
    Drowning,
    Lava,
    Fire,
    Suffocation,
    Attack(String),
    Unknown,
}

impl DamageSource {
    /// Environmental sources trigger the reflex regardless of health level
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            DamageSource::Drowning | DamageSource::Lava | DamageSource::Fire | DamageSource::Suffocation
        )
    }
}

/// Attribute a damage event to a source
///
/// Checks run in priority order: a drowning agent standing in lava next
/// to a zombie is drowning first.
pub fn classify(world: &dyn WorldLink) -> DamageSource {
    let agent = world.agent();
    let feet = agent.position.block();
    let head = feet + IVec3::new(0, 1, 0);
    let block_name = |cell: IVec3| world.block_at(cell).unwrap_or_default();

    let head_name = block_name(head);
    let feet_name = block_name(feet);

    if head_name == "water" {
        return DamageSource::Drowning;
    }
    if head_name == "lava" || feet_name == "lava" {
        return DamageSource::Lava;
    }
    if agent.on_fire || head_name == "fire" || feet_name == "fire" {
        return DamageSource::Fire;
    }
    if block::is_solid(&head_name) {
        return DamageSource::Suffocation;
    }

    let nearest_hostile = world
        .entities()
        .into_iter()
        .filter(|entity| entity.kind == EntityKind::Hostile)
        .map(|entity| (entity.position.distance(agent.position), entity.name))
        .filter(|(distance, _)| *distance <= ATTACK_ATTRIBUTION_RANGE)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    match nearest_hostile {
        Some((_, name)) => DamageSource::Attack(name),
        None => DamageSource::Unknown,
    }
}

/// One recorded damage event
#[derive(Debug, Clone, Copy)]
struct DamageEvent {
    at: Instant,
    amount: f32,
}

/// Rolling damage window
pub struct HealthTracker {
    events: VecDeque<DamageEvent>,
    window: Duration,
    max_events: usize,
}

impl HealthTracker {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            window,
            max_events,
        }
    }

    pub fn record(&mut self, amount: f32, now: Instant) {
        self.events.push_back(DamageEvent { at: now, amount });
        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        self.prune(now);
    }

    /// Total damage taken inside the window
    pub fn windowed_damage(&mut self, now: Instant) -> f32 {
        self.prune(now);
        self.events.iter().map(|event| event.amount).sum()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.events.front() {
            if now.duration_since(front.at) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Outbound summary of a damage event and the monitor's reaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAlert {
    pub health: f32,
    pub damage: f32,
    pub source: DamageSource,
    pub windowed_damage: f32,
    pub reflex_fired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sim::SimWorld;
    use glam::Vec3;

    #[tokio::test(start_paused = true)]
    async fn test_drowning_outranks_everything() {
        let world = SimWorld::flat(63, 8);
        let feet = IVec3::new(0, 64, 0);
        world.set_block(feet, "lava");
        world.set_block(feet + IVec3::new(0, 1, 0), "water");
        world.spawn_entity("zombie", EntityKind::Hostile, Vec3::new(2.5, 64.0, 0.5));
        assert_eq!(classify(&world), DamageSource::Drowning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suffocation_when_head_buried() {
        let world = SimWorld::flat(63, 8);
        world.set_block(IVec3::new(0, 65, 0), "stone");
        assert_eq!(classify(&world), DamageSource::Suffocation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nearby_hostile_blamed_for_unexplained_damage() {
        let world = SimWorld::flat(63, 8);
        world.spawn_entity("skeleton", EntityKind::Hostile, Vec3::new(3.5, 64.0, 0.5));
        assert_eq!(classify(&world), DamageSource::Attack("skeleton".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distant_hostile_not_blamed() {
        let world = SimWorld::flat(63, 8);
        world.spawn_entity("skeleton", EntityKind::Hostile, Vec3::new(20.5, 64.0, 0.5));
        assert_eq!(classify(&world), DamageSource::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_window_expires() {
        let mut tracker = HealthTracker::new(32, Duration::from_secs(5));
        let start = Instant::now();
        tracker.record(3.0, start);
        tracker.record(2.0, start + Duration::from_secs(1));
        assert_eq!(tracker.windowed_damage(start + Duration::from_secs(2)), 5.0);
        assert_eq!(tracker.windowed_damage(start + Duration::from_secs(7)), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_event_count_bounded() {
        let mut tracker = HealthTracker::new(4, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..20 {
            tracker.record(1.0, start);
        }
        assert_eq!(tracker.windowed_damage(start), 4.0);
    }
}
