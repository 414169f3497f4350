//! World link trait
//!
//! The seam between the engine and a live world session. Queries are
//! synchronous snapshots; control outputs latch until overwritten. All
//! waiting (dig completion, movement) happens in the engine by polling,
//! so implementations stay simple.

use glam::IVec3;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::error::Result;
use crate::core::types::{Entity, EntityId};
use crate::world::block::Tool;
use crate::world::events::WorldEvent;

/// Instantaneous agent pose and status
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Feet position
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
    pub on_ground: bool,
    pub on_fire: bool,
}

/// Latched movement controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub forward: bool,
    pub jump: bool,
    pub sneak: bool,
}

/// Connection to a live voxel-world session
pub trait WorldLink: Send + Sync {
    /// Whether the session link is alive
    fn connected(&self) -> bool;

    /// Current agent pose and status
    fn agent(&self) -> AgentState;

    /// Block name at a cell; `None` when the chunk is not loaded
    fn block_at(&self, position: IVec3) -> Option<String>;

    /// Sky-light level at a cell; `None` when the chunk is not loaded
    fn sky_light(&self, position: IVec3) -> Option<u8>;

    /// All currently known entities
    fn entities(&self) -> Vec<Entity>;

    /// Count of an item in the agent's inventory
    fn inventory_count(&self, item: &str) -> u32;

    /// Total placeable blocks in the inventory
    fn placeable_count(&self) -> u32;

    /// Currently held tool, if any
    fn held_tool(&self) -> Option<Tool>;

    /// Set the camera orientation (radians)
    fn set_look(&self, yaw: f32, pitch: f32);

    /// Latch the movement controls
    fn set_control(&self, control: ControlState);

    /// Begin digging a block; completion is observed via `block_at`
    fn start_dig(&self, position: IVec3) -> Result<()>;

    /// Place a block from inventory at a cell
    fn place_block(&self, position: IVec3) -> Result<()>;

    /// Swing at an entity
    fn attack(&self, target: EntityId) -> Result<()>;

    /// Subscribe to the world event bus
    fn subscribe(&self) -> broadcast::Receiver<WorldEvent>;
}
