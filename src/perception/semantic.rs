//! Semantic summary rules
//!
//! Distills raw block and entity queries into the flags the decision layer
//! consumes: underground/cave state, escape-path classification, bucketed
//! threats, nearby resources, and the brightest horizontal direction.

use glam::IVec3;
use serde::Serialize;

use crate::core::config::AgentConfig;
use crate::core::types::{
    block_center, BlockAligned, BlockObservation, EntityKind, Threat, ThreatLevel, EYE_HEIGHT,
};
use crate::perception::fov::perceivable;
use crate::world::block;
use crate::world::link::{AgentState, WorldLink};

/// How many blocks above the head the escape ray samples
const ESCAPE_RAY_DEPTH: i32 = 8;
/// Sky is checked this many cells above the head
const SKY_PROBE_OFFSET: i32 = 3;
/// Resources reported, nearest first
const MAX_RESOURCES: usize = 5;

/// Classification of the vertical escape ray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscapePath {
    /// Open all the way up within the sampled depth
    Clear,
    /// Solid within the first two cells above the head
    Blocked,
    /// First two cells open but solid above jumping reach
    NeedsBuilding,
}

/// Best horizontal heading by sky-light
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrightestDirection {
    pub yaw: f32,
    pub sky_light: u8,
    pub distance: f32,
    /// Set when no liquid-free candidate existed and this one crosses liquid
    pub dangerous: bool,
}

/// Per-tick semantic summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticSummary {
    pub is_underground: bool,
    pub can_see_sky: bool,
    pub in_cave: bool,
    pub in_water: bool,
    pub escape_path: Option<EscapePath>,
    pub threats: Vec<Threat>,
    pub nearest_resources: Vec<BlockObservation>,
    pub brightest_direction: Option<BrightestDirection>,
}

impl SemanticSummary {
    pub fn build(world: &dyn WorldLink, config: &AgentConfig, agent: &AgentState) -> Self {
        let feet = agent.position.block();
        let head = feet + IVec3::new(0, 1, 0);

        let is_underground = agent.position.y + EYE_HEIGHT < config.surface_y;
        let can_see_sky = world
            .sky_light(head + IVec3::new(0, SKY_PROBE_OFFSET, 0))
            .map(|light| light == config.max_sky_light)
            .unwrap_or(false);
        let in_cave = cave_check(world, head);
        let in_water = world
            .block_at(feet)
            .map(|name| name == "water")
            .unwrap_or(false);

        let escape_path = if is_underground && !can_see_sky {
            Some(classify_escape_ray(world, head))
        } else {
            None
        };

        Self {
            is_underground,
            can_see_sky,
            in_cave,
            in_water,
            escape_path,
            threats: collect_threats(world, config, agent),
            nearest_resources: collect_resources(world, config, agent),
            brightest_direction: brightest_direction(world, config, agent),
        }
    }
}

/// At least 4 of the 6 face neighbors are stone-family
fn cave_check(world: &dyn WorldLink, head: IVec3) -> bool {
    const NEIGHBORS: [IVec3; 6] = [
        IVec3::new(1, 0, 0),
        IVec3::new(-1, 0, 0),
        IVec3::new(0, 1, 0),
        IVec3::new(0, -1, 0),
        IVec3::new(0, 0, 1),
        IVec3::new(0, 0, -1),
    ];
    let stone = NEIGHBORS
        .iter()
        .filter_map(|offset| world.block_at(head + *offset))
        .filter(|name| block::is_stone_family(name))
        .count();
    stone >= 4
}

/// Classify the vertical ray above the head
///
/// Offsets 1 and 2 are within jumping reach; a solid block there means the
/// path is blocked outright. Open there but solid further up means the
/// agent needs to build to get out.
fn classify_escape_ray(world: &dyn WorldLink, head: IVec3) -> EscapePath {
    let mut first_two_open = true;
    let mut solid_above = false;
    for offset in 1..=ESCAPE_RAY_DEPTH {
        let cell = head + IVec3::new(0, offset, 0);
        let solid = world
            .block_at(cell)
            .map(|name| block::is_solid(&name))
            .unwrap_or(false);
        if solid {
            if offset <= 2 {
                first_two_open = false;
            } else {
                solid_above = true;
            }
        }
    }
    if !first_two_open {
        EscapePath::Blocked
    } else if solid_above {
        EscapePath::NeedsBuilding
    } else {
        EscapePath::Clear
    }
}

/// FOV/LOS-filtered hostile entities bucketed by distance
///
/// The memory exception never applies here.
fn collect_threats(world: &dyn WorldLink, config: &AgentConfig, agent: &AgentState) -> Vec<Threat> {
    let mut threats: Vec<Threat> = world
        .entities()
        .into_iter()
        .filter(|entity| entity.kind == EntityKind::Hostile)
        .filter(|entity| perceivable(world, config, agent, entity.position, false))
        .map(|entity| {
            let distance = entity.position.distance(agent.position);
            Threat {
                entity,
                distance,
                level: ThreatLevel::from_distance(distance),
            }
        })
        .collect();
    threats.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    threats
}

/// Visible ore and wood blocks, nearest first
fn collect_resources(
    world: &dyn WorldLink,
    config: &AgentConfig,
    agent: &AgentState,
) -> Vec<BlockObservation> {
    let origin = agent.position.block();
    let radius = config.resource_search_radius;
    let mut found = Vec::new();
    for dy in -radius..=radius {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let position = origin + IVec3::new(dx, dy, dz);
                let Some(name) = world.block_at(position) else {
                    continue;
                };
                if !block::is_resource(&name) {
                    continue;
                }
                let center = block_center(position);
                if !perceivable(world, config, agent, center, false) {
                    continue;
                }
                found.push(BlockObservation {
                    name,
                    position,
                    distance: center.distance(agent.position),
                });
            }
        }
    }
    found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    found.truncate(MAX_RESOURCES);
    found
}

const SWEEP_HEADINGS: [IVec3; 8] = [
    IVec3::new(0, 0, 1),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, -1),
    IVec3::new(0, 0, -1),
    IVec3::new(-1, 0, -1),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, 0, 1),
];

struct SweepCandidate {
    yaw: f32,
    sky_light: u8,
    distance: f32,
    crosses_liquid: bool,
}

/// 8-way horizontal sweep tracking the brightest sampled cell
///
/// Prefers a heading whose sampled span crosses no liquid; only if every
/// candidate is wet does it return one flagged dangerous.
fn brightest_direction(
    world: &dyn WorldLink,
    config: &AgentConfig,
    agent: &AgentState,
) -> Option<BrightestDirection> {
    let head = agent.position.block() + IVec3::new(0, 1, 0);
    let mut candidates = Vec::new();

    for heading in SWEEP_HEADINGS {
        let mut best: Option<(u8, f32)> = None;
        let mut crosses_liquid = false;
        for step in 1..=config.brightest_sweep_cells {
            let cell = head + heading * step;
            for probe in [cell, cell + IVec3::new(0, -1, 0)] {
                if let Some(name) = world.block_at(probe) {
                    if block::is_liquid(&name) {
                        crosses_liquid = true;
                    }
                }
            }
            let Some(light) = world.sky_light(cell) else {
                continue;
            };
            let distance = block_center(cell).distance(agent.position);
            if best.map(|(l, _)| light > l).unwrap_or(true) {
                best = Some((light, distance));
            }
        }
        if let Some((sky_light, distance)) = best {
            let target = block_center(head + heading * 4);
            candidates.push(SweepCandidate {
                yaw: crate::core::types::yaw_toward(agent.position, target),
                sky_light,
                distance,
                crosses_liquid,
            });
        }
    }

    let pick = |mut list: Vec<SweepCandidate>, dangerous: bool| {
        list.sort_by(|a, b| {
            b.sky_light
                .cmp(&a.sky_light)
                .then(a.distance.total_cmp(&b.distance))
        });
        list.into_iter().next().map(|c| BrightestDirection {
            yaw: c.yaw,
            sky_light: c.sky_light,
            distance: c.distance,
            dangerous,
        })
    };

    let (safe, unsafe_candidates): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| !c.crosses_liquid);
    if !safe.is_empty() {
        pick(safe, false)
    } else {
        pick(unsafe_candidates, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::link::WorldLink;
    use crate::world::sim::SimWorld;
    use glam::Vec3;

    /// Agent sealed in a small stone pocket underground
    fn cave_world() -> SimWorld {
        let world = SimWorld::new();
        let center = IVec3::new(0, 40, 0);
        for dy in -1..=5 {
            for dz in -2..=2 {
                for dx in -2..=2 {
                    world.set_block(center + IVec3::new(dx, dy, dz), "stone");
                }
            }
        }
        // Hollow out a 1x2 pocket
        world.clear_block(center);
        world.clear_block(center + IVec3::new(0, 1, 0));
        world.set_agent_position(Vec3::new(0.5, 40.0, 0.5));
        world
    }

    #[tokio::test(start_paused = true)]
    async fn test_underground_cave_flags() {
        let world = cave_world();
        let config = AgentConfig::default();
        let agent = world.agent();
        let summary = SemanticSummary::build(&world, &config, &agent);
        assert!(summary.is_underground);
        assert!(!summary.can_see_sky);
        assert!(summary.in_cave);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surface_agent_sees_sky() {
        let world = SimWorld::flat(63, 16);
        let config = AgentConfig::default();
        let agent = world.agent();
        let summary = SemanticSummary::build(&world, &config, &agent);
        assert!(!summary.is_underground);
        assert!(summary.can_see_sky);
        assert_eq!(summary.escape_path, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_ray_blocked_within_jump_reach() {
        let world = cave_world();
        let config = AgentConfig::default();
        // Head at y=41: offset 1 air, offsets 2 and 3 solid
        world.clear_block(IVec3::new(0, 42, 0));
        world.set_block(IVec3::new(0, 43, 0), "stone");
        world.set_block(IVec3::new(0, 44, 0), "stone");
        let agent = world.agent();
        let summary = SemanticSummary::build(&world, &config, &agent);
        assert_eq!(summary.escape_path, Some(EscapePath::Blocked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_ray_needs_building() {
        let world = cave_world();
        let config = AgentConfig::default();
        // First two cells above the head open, ceiling further up
        world.clear_block(IVec3::new(0, 42, 0));
        world.clear_block(IVec3::new(0, 43, 0));
        world.set_block(IVec3::new(0, 45, 0), "stone");
        let agent = world.agent();
        let summary = SemanticSummary::build(&world, &config, &agent);
        assert_eq!(summary.escape_path, Some(EscapePath::NeedsBuilding));
    }

    #[tokio::test(start_paused = true)]
    async fn test_threats_bucketed_and_hidden_excluded() {
        let world = SimWorld::flat(63, 16);
        let config = AgentConfig::default();
        world.spawn_entity("zombie", EntityKind::Hostile, Vec3::new(0.5, 64.0, 4.5));
        world.spawn_entity("skeleton", EntityKind::Hostile, Vec3::new(0.5, 64.0, 15.5));
        // One hostile behind the agent: out of FOV
        world.spawn_entity("creeper", EntityKind::Hostile, Vec3::new(0.5, 64.0, -6.5));
        let agent = world.agent();
        let summary = SemanticSummary::build(&world, &config, &agent);

        assert_eq!(summary.threats.len(), 2);
        assert_eq!(summary.threats[0].level, ThreatLevel::Critical);
        assert_eq!(summary.threats[1].level, ThreatLevel::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn test_brightest_direction_avoids_liquid() {
        let world = SimWorld::flat(63, 16);
        let config = AgentConfig::default();
        // Water channel directly ahead (+Z)
        for z in 1..=8 {
            world.set_block(IVec3::new(0, 64, z), "water");
        }
        let agent = world.agent();
        let brightest = brightest_direction(&world, &config, &agent).unwrap();
        assert!(!brightest.dangerous);
        // Picked heading must not be the wet +Z channel
        let delta = crate::core::types::angle_delta(brightest.yaw, 0.0).abs();
        assert!(delta > 0.3);
    }
}
