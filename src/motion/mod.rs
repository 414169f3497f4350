//! Motion control
//!
//! Translates motion intents (named direction, coordinate, or block target)
//! into control signals: a direct short-range walk loop, delegated grid
//! pathfinding with a poll loop, continuous look smoothing, and symbolic
//! direction resolution with alternate-heading fallbacks.

pub mod controller;
pub mod direction;
pub mod look;
pub mod navigator;

use serde::Serialize;

pub use controller::{navigate_to, walk_to, WalkOptions};
pub use direction::{move_direction, NamedDirection};
pub use look::{LookController, LookProfile};
pub use navigator::{GridNavigator, Navigator, NavigatorStatus};

/// Why a motion call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationReason {
    Success,
    Timeout,
    BadPath,
    Stuck,
    Disconnected,
}

/// Result contract for every motion call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionOutcome {
    pub reached: bool,
    pub distance_moved: f32,
    pub remaining_distance: f32,
    pub reason: TerminationReason,
}

impl MotionOutcome {
    pub fn success(distance_moved: f32, remaining_distance: f32) -> Self {
        Self {
            reached: true,
            distance_moved,
            remaining_distance,
            reason: TerminationReason::Success,
        }
    }

    pub fn failed(reason: TerminationReason, distance_moved: f32, remaining_distance: f32) -> Self {
        Self {
            reached: false,
            distance_moved,
            remaining_distance,
            reason,
        }
    }
}
