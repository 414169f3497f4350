//! Spatial perception
//!
//! Builds an immutable per-tick snapshot of the agent's surroundings: a
//! 3x3x3 block grid, six directional ray scans, and a semantic summary.
//! Pure function of world state; two builds with no intervening world
//! change produce identical snapshots.

pub mod fov;
pub mod grid;
pub mod scan;
pub mod semantic;

use serde::Serialize;

use crate::core::config::AgentConfig;
use crate::core::types::BlockAligned;
use crate::world::link::{AgentState, WorldLink};

pub use fov::perceivable;
pub use grid::SpatialGrid;
pub use scan::DirectionalScan;
pub use semantic::{BrightestDirection, EscapePath, SemanticSummary};

/// Immutable perception snapshot for one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub agent: AgentState,
    pub grid: SpatialGrid,
    pub scan: DirectionalScan,
    pub summary: SemanticSummary,
}

impl Snapshot {
    /// Capture the agent's surroundings
    pub fn capture(world: &dyn WorldLink, config: &AgentConfig) -> Self {
        let agent = world.agent();
        let origin = agent.position.block();
        Self {
            agent,
            grid: SpatialGrid::build(world, origin, agent.position),
            scan: DirectionalScan::build(world, &agent, config.scan_depth),
            summary: SemanticSummary::build(world, config, &agent),
        }
    }
}
