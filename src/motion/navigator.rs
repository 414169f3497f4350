//! Grid navigation
//!
//! A* over the voxel grid with a tunable dig cost that scales with depth.
//! Sprint and parkour moves are deliberately absent from the move set; the
//! resulting paths are slower but smooth to follow.

use glam::{IVec3, Vec3};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use ahash::AHashMap;

use crate::core::error::{AgentError, Result};
use crate::core::types::{block_center, BlockAligned};
use crate::world::block;
use crate::world::link::{ControlState, WorldLink};

/// Progress report from a navigator poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorStatus {
    pub remaining_distance: f32,
    pub finished: bool,
    pub no_path: bool,
}

/// A pathfinding delegate
///
/// The engine polls `status` on a fixed tick and calls `advance` between
/// polls to steer controls toward the next waypoint. `advance` returns
/// the point currently steered toward so the engine can orient the
/// camera; navigators never touch `set_look` themselves. Cancellation is
/// cooperative via `clear_goal`.
pub trait Navigator: Send + Sync {
    fn set_goal(&self, world: &dyn WorldLink, goal: IVec3) -> Result<()>;
    fn clear_goal(&self, world: &dyn WorldLink);
    fn advance(&self, world: &dyn WorldLink) -> Option<Vec3>;
    fn status(&self, world: &dyn WorldLink) -> NavigatorStatus;
}

/// Tuning for the built-in grid navigator
#[derive(Debug, Clone)]
pub struct NavigatorOptions {
    /// Base cost of moving one cell
    pub move_cost: f32,
    /// Extra cost for a move that requires digging, at the surface
    pub dig_cost_base: f32,
    /// Additional dig cost per block of depth below the surface threshold
    pub dig_cost_per_depth: f32,
    /// Y treated as the surface for dig-cost scaling
    pub surface_y: i32,
    /// Whether dig moves are allowed at all
    pub allow_dig: bool,
    /// Expansion bound before the search reports no path
    pub max_expansions: usize,
}

impl Default for NavigatorOptions {
    fn default() -> Self {
        Self {
            move_cost: 1.0,
            dig_cost_base: 4.0,
            dig_cost_per_depth: 0.15,
            surface_y: 60,
            allow_dig: true,
            max_expansions: 4_096,
        }
    }
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    cell: IVec3,
    f_cost: f32,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct NavState {
    path: Vec<IVec3>,
    goal: Option<IVec3>,
    next_index: usize,
}

/// Built-in A* navigator over the voxel grid
pub struct GridNavigator {
    options: NavigatorOptions,
    state: Mutex<NavState>,
}

impl GridNavigator {
    pub fn new(options: NavigatorOptions) -> Self {
        Self {
            options,
            state: Mutex::new(NavState {
                path: Vec::new(),
                goal: None,
                next_index: 0,
            }),
        }
    }
}

impl Default for GridNavigator {
    fn default() -> Self {
        Self::new(NavigatorOptions::default())
    }
}

impl Navigator for GridNavigator {
    fn set_goal(&self, world: &dyn WorldLink, goal: IVec3) -> Result<()> {
        let start = world.agent().position.block();
        let path = find_path(world, &self.options, start, goal)
            .ok_or_else(|| AgentError::Unreachable(format!("no path to {goal}")))?;
        let mut state = self.state.lock().unwrap();
        state.path = path;
        state.goal = Some(goal);
        state.next_index = 1.min(state.path.len());
        Ok(())
    }

    fn clear_goal(&self, world: &dyn WorldLink) {
        let mut state = self.state.lock().unwrap();
        state.path.clear();
        state.goal = None;
        state.next_index = 0;
        world.set_control(ControlState::default());
    }

    fn advance(&self, world: &dyn WorldLink) -> Option<Vec3> {
        let agent = world.agent();
        let mut state = self.state.lock().unwrap();
        state.goal?;

        // Skip waypoints already reached
        while state.next_index < state.path.len() {
            let waypoint = block_center(state.path[state.next_index]);
            if agent.position.distance(waypoint) < 0.8 {
                state.next_index += 1;
            } else {
                break;
            }
        }
        let Some(&next) = state.path.get(state.next_index) else {
            world.set_control(ControlState::default());
            return None;
        };

        // Dig through waypoints that are still solid
        for cell in [next, next + IVec3::new(0, 1, 0)] {
            if let Some(name) = world.block_at(cell) {
                if block::is_solid(&name) {
                    let _ = world.start_dig(cell);
                }
            }
        }

        world.set_control(ControlState {
            forward: true,
            jump: next.y > agent.position.block().y,
            sneak: false,
        });
        Some(block_center(next))
    }

    fn status(&self, world: &dyn WorldLink) -> NavigatorStatus {
        let agent = world.agent();
        let state = self.state.lock().unwrap();
        let Some(goal) = state.goal else {
            return NavigatorStatus {
                remaining_distance: 0.0,
                finished: true,
                no_path: false,
            };
        };
        let remaining = agent.position.distance(block_center(goal));
        NavigatorStatus {
            remaining_distance: remaining,
            finished: remaining < 1.5,
            no_path: state.path.is_empty(),
        }
    }
}

/// Can the agent occupy this cell (feet here, head above, support below)?
pub fn walkable(world: &dyn WorldLink, cell: IVec3) -> bool {
    let feet = world.block_at(cell);
    let head = world.block_at(cell + IVec3::new(0, 1, 0));
    let floor = world.block_at(cell + IVec3::new(0, -1, 0));
    match (feet, head, floor) {
        (Some(feet), Some(head), Some(floor)) => {
            !block::is_solid(&feet) && !block::is_solid(&head) && block::is_solid(&floor)
        }
        // Unknown cells are never assumed walkable
        _ => false,
    }
}

/// Cost of entering a cell, including dig cost for solid cells
fn entry_cost(world: &dyn WorldLink, options: &NavigatorOptions, cell: IVec3) -> Option<f32> {
    let mut cost = options.move_cost;
    for probe in [cell, cell + IVec3::new(0, 1, 0)] {
        let name = world.block_at(probe)?;
        if block::is_solid(&name) {
            if !options.allow_dig || name == "bedrock" {
                return None;
            }
            let depth = (options.surface_y - probe.y).max(0) as f32;
            cost += options.dig_cost_base + options.dig_cost_per_depth * depth;
        }
    }
    // Entering a cell still needs solid footing
    let floor = world.block_at(cell + IVec3::new(0, -1, 0))?;
    if !block::is_solid(&floor) {
        return None;
    }
    Some(cost)
}

fn heuristic(a: IVec3, b: IVec3) -> f32 {
    a.as_vec3().distance(b.as_vec3())
}

/// Find a path using A*
///
/// Returns `None` if no path exists within the expansion bound.
pub fn find_path(
    world: &dyn WorldLink,
    options: &NavigatorOptions,
    start: IVec3,
    goal: IVec3,
) -> Option<Vec<IVec3>> {
    if start == goal {
        return Some(vec![start]);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<IVec3, IVec3> = AHashMap::new();
    let mut g_scores: AHashMap<IVec3, f32> = AHashMap::new();

    g_scores.insert(start, 0.0);
    open_set.push(PathNode {
        cell: start,
        f_cost: heuristic(start, goal),
    });

    let mut expansions = 0;
    while let Some(current) = open_set.pop() {
        if current.cell == goal {
            return Some(reconstruct_path(&came_from, current.cell));
        }
        expansions += 1;
        if expansions > options.max_expansions {
            return None;
        }

        let current_g = *g_scores.get(&current.cell).unwrap_or(&f32::INFINITY);

        for neighbor in neighbors(current.cell) {
            let Some(cost) = entry_cost(world, options, neighbor) else {
                continue;
            };
            // Vertical moves cost a little more than flat ones
            let step_cost = cost + (neighbor.y - current.cell.y).abs() as f32 * 0.5;

            let tentative_g = current_g + step_cost;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);
            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.cell);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    cell: neighbor,
                    f_cost: tentative_g + heuristic(neighbor, goal),
                });
            }
        }
    }

    None
}

/// Reachable neighbor cells: flat steps, one-block step-ups, and drops of
/// up to three blocks
fn neighbors(cell: IVec3) -> Vec<IVec3> {
    const HORIZONTAL: [IVec3; 4] = [
        IVec3::new(1, 0, 0),
        IVec3::new(-1, 0, 0),
        IVec3::new(0, 0, 1),
        IVec3::new(0, 0, -1),
    ];
    let mut result = Vec::with_capacity(20);
    for step in HORIZONTAL {
        for dy in [0, 1, -1, -2, -3] {
            result.push(cell + step + IVec3::new(0, dy, 0));
        }
    }
    result
}

fn reconstruct_path(came_from: &AHashMap<IVec3, IVec3>, mut current: IVec3) -> Vec<IVec3> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
