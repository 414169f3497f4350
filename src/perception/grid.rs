//! 3x3x3 block neighborhood
//!
//! Three horizontal layers around the agent: below the feet, at the feet,
//! and at head level. Unloaded cells stay `None` and are excluded from all
//! aggregates.

use glam::{IVec3, Vec3};
use serde::Serialize;

use crate::core::types::BlockObservation;
use crate::world::link::WorldLink;

/// Vertical layer index within the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GridLayer {
    Below = 0,
    Feet = 1,
    Head = 2,
}

const LAYER_DY: [i32; 3] = [-1, 0, 1];

/// Immutable 3x3x3 snapshot of the blocks around the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialGrid {
    /// `cells[layer][dz * 3 + dx]` with dx, dz in 0..3 mapping to -1..=1
    cells: [[Option<BlockObservation>; 9]; 3],
}

impl SpatialGrid {
    /// Sample the 27 cells around `origin`
    pub fn build(world: &dyn WorldLink, origin: IVec3, agent_position: Vec3) -> Self {
        let mut cells: [[Option<BlockObservation>; 9]; 3] = Default::default();
        for (layer, dy) in LAYER_DY.iter().enumerate() {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    let position = origin + IVec3::new(dx, *dy, dz);
                    let observation = world.block_at(position).map(|name| BlockObservation {
                        name,
                        position,
                        distance: center(position).distance(agent_position),
                    });
                    cells[layer][index(dx, dz)] = observation;
                }
            }
        }
        Self { cells }
    }

    /// Cell at a relative offset; dx, dy, dz each in -1..=1
    pub fn cell(&self, dx: i32, dy: i32, dz: i32) -> Option<&BlockObservation> {
        debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz));
        self.cells[(dy + 1) as usize][index(dx, dz)].as_ref()
    }

    /// All loaded cells in one layer
    pub fn layer(&self, layer: GridLayer) -> impl Iterator<Item = &BlockObservation> {
        self.cells[layer as usize].iter().filter_map(|c| c.as_ref())
    }

    /// All loaded cells across the grid
    pub fn known_cells(&self) -> impl Iterator<Item = &BlockObservation> {
        self.cells.iter().flatten().filter_map(|c| c.as_ref())
    }
}

fn index(dx: i32, dz: i32) -> usize {
    ((dz + 1) * 3 + (dx + 1)) as usize
}

fn center(block: IVec3) -> Vec3 {
    Vec3::new(block.x as f32 + 0.5, block.y as f32, block.z as f32 + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sim::SimWorld;

    #[tokio::test(start_paused = true)]
    async fn test_grid_samples_27_cells() {
        let world = SimWorld::flat(63, 16);
        let agent = crate::world::link::WorldLink::agent(&world);
        let grid = SpatialGrid::build(&world, glam::IVec3::new(0, 64, 0), agent.position);
        assert_eq!(grid.known_cells().count(), 27);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_layer_sees_floor() {
        let world = SimWorld::flat(63, 16);
        let agent = crate::world::link::WorldLink::agent(&world);
        let grid = SpatialGrid::build(&world, glam::IVec3::new(0, 64, 0), agent.position);
        let below = grid.cell(0, -1, 0).unwrap();
        assert_eq!(below.name, "stone");
        assert_eq!(below.position, IVec3::new(0, 63, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloaded_cell_is_none() {
        let world = SimWorld::flat(63, 16);
        world.mark_unloaded(IVec3::new(1, 64, 0));
        let agent = crate::world::link::WorldLink::agent(&world);
        let grid = SpatialGrid::build(&world, glam::IVec3::new(0, 64, 0), agent.position);
        assert!(grid.cell(1, 0, 0).is_none());
        assert_eq!(grid.known_cells().count(), 26);
    }
}
