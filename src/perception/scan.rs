//! Directional ray scans
//!
//! Six rays from the agent (front, back, left, right relative to the facing
//! cardinal, plus up and down), each collecting up to `depth` consecutive
//! observations. A ray stops at the first unloaded cell; what it has seen
//! so far is kept.

use glam::IVec3;
use serde::Serialize;

use crate::core::types::{BlockAligned, BlockObservation};
use crate::world::link::{AgentState, WorldLink};

/// Six lists of consecutive observations along each ray
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionalScan {
    pub front: Vec<BlockObservation>,
    pub back: Vec<BlockObservation>,
    pub left: Vec<BlockObservation>,
    pub right: Vec<BlockObservation>,
    pub up: Vec<BlockObservation>,
    pub down: Vec<BlockObservation>,
}

impl DirectionalScan {
    pub fn build(world: &dyn WorldLink, agent: &AgentState, depth: usize) -> Self {
        let head = agent.position.block() + IVec3::new(0, 1, 0);
        let feet = agent.position.block();
        let front = facing_cardinal(agent.yaw);
        let right = IVec3::new(-front.z, 0, front.x);

        Self {
            front: ray(world, agent, head, front, depth),
            back: ray(world, agent, head, -front, depth),
            left: ray(world, agent, head, -right, depth),
            right: ray(world, agent, head, right, depth),
            up: ray(world, agent, head, IVec3::new(0, 1, 0), depth),
            down: ray(world, agent, feet, IVec3::new(0, -1, 0), depth),
        }
    }
}

/// Dominant horizontal cardinal for a yaw angle
///
/// Yaw 0 faces +Z; quadrants are split at 45 degrees.
pub fn facing_cardinal(yaw: f32) -> IVec3 {
    let x = -yaw.sin();
    let z = yaw.cos();
    if x.abs() > z.abs() {
        IVec3::new(x.signum() as i32, 0, 0)
    } else {
        IVec3::new(0, 0, z.signum() as i32)
    }
}

fn ray(
    world: &dyn WorldLink,
    agent: &AgentState,
    start: IVec3,
    step: IVec3,
    depth: usize,
) -> Vec<BlockObservation> {
    let mut observations = Vec::with_capacity(depth);
    for i in 1..=depth as i32 {
        let position = start + step * i;
        match world.block_at(position) {
            Some(name) => observations.push(BlockObservation {
                name,
                position,
                distance: crate::core::types::block_center(position).distance(agent.position),
            }),
            None => break,
        }
    }
    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sim::SimWorld;
    use glam::Vec3;

    #[tokio::test(start_paused = true)]
    async fn test_facing_cardinal_quadrants() {
        assert_eq!(facing_cardinal(0.0), IVec3::new(0, 0, 1));
        assert_eq!(facing_cardinal(std::f32::consts::PI), IVec3::new(0, 0, -1));
        assert_eq!(
            facing_cardinal(std::f32::consts::FRAC_PI_2),
            IVec3::new(-1, 0, 0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_front_ray_sees_wall() {
        let world = SimWorld::flat(63, 16);
        world.set_block(IVec3::new(0, 65, 3), "stone");
        let agent = crate::world::link::WorldLink::agent(&world);
        let scan = DirectionalScan::build(&world, &agent, 5);

        assert_eq!(scan.front.len(), 5);
        let wall = scan
            .front
            .iter()
            .find(|o| o.position == IVec3::new(0, 65, 3))
            .unwrap();
        assert_eq!(wall.name, "stone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ray_stops_at_unloaded_cell() {
        let world = SimWorld::flat(63, 16);
        world.mark_unloaded(IVec3::new(0, 65, 3));
        let agent = crate::world::link::WorldLink::agent(&world);
        let scan = DirectionalScan::build(&world, &agent, 5);
        assert_eq!(scan.front.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_ray_starts_at_feet() {
        let world = SimWorld::flat(63, 16);
        world.set_agent_position(Vec3::new(0.5, 64.0, 0.5));
        let agent = crate::world::link::WorldLink::agent(&world);
        let scan = DirectionalScan::build(&world, &agent, 5);
        assert_eq!(scan.down[0].position, IVec3::new(0, 63, 0));
        assert_eq!(scan.down[0].name, "stone");
    }
}
