//! Physical action surface
//!
//! Requests from the decision layer are dispatched through a single-flight
//! executor. Every outcome reports measured reality: how far the agent
//! actually moved and what actually entered the inventory, not what the
//! sub-steps claimed.

pub mod attack;
pub mod executor;
pub mod mine;
pub mod place;

pub use executor::execute;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::AgentError;
use crate::motion::direction::NamedDirection;

/// Where a move request should end up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveTarget {
    /// Exact point, short-range direct walk
    Position(Vec3),
    /// Block goal routed through the navigator
    Block(IVec3),
    /// Fixed distance in a named direction
    Direction {
        direction: NamedDirection,
        distance: f32,
    },
    /// Nearest remembered landmark with this name
    Landmark(String),
}

/// A physical action request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionRequest {
    Move {
        target: MoveTarget,
    },
    /// Mine the nearest perceivable block with this name
    Mine {
        block: String,
    },
    /// Place a block, auto-selecting a support cell when none is given
    Place {
        block: String,
        position: Option<IVec3>,
    },
    /// Attack the nearest perceivable entity with this name
    Attack {
        name: String,
    },
    Recover,
    Wait {
        duration_ms: u64,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionRequest::Move { .. } => "move",
            ActionRequest::Mine { .. } => "mine",
            ActionRequest::Place { .. } => "place",
            ActionRequest::Attack { .. } => "attack",
            ActionRequest::Recover => "recover",
            ActionRequest::Wait { .. } => "wait",
        }
    }
}

/// Failure classes surfaced to the decision layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    CapabilityMissing,
    Unreachable,
    Blocked,
    Timeout,
    Busy,
    Disconnected,
    InvalidRequest,
    Internal,
}

impl From<&AgentError> for FailureKind {
    fn from(error: &AgentError) -> Self {
        match error {
            AgentError::CapabilityMissing(_) => FailureKind::CapabilityMissing,
            AgentError::Unreachable(_) => FailureKind::Unreachable,
            AgentError::Blocked(_) => FailureKind::Blocked,
            AgentError::Timeout { .. } => FailureKind::Timeout,
            AgentError::Busy => FailureKind::Busy,
            AgentError::Disconnected => FailureKind::Disconnected,
            AgentError::InvalidRequest(_) => FailureKind::InvalidRequest,
            AgentError::Io(_) | AgentError::Serde(_) => FailureKind::Internal,
        }
    }
}

/// Measured state change across an action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasuredDelta {
    /// Distance actually covered
    pub moved: f32,
    /// Items gained, by name
    pub inventory: Vec<(String, u32)>,
}

/// Result of one physical action
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub delta: MeasuredDelta,
    /// Whether the action yielded items, separate from `success`
    pub collected: bool,
    pub failure: Option<FailureKind>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>, delta: MeasuredDelta) -> Self {
        let collected = !delta.inventory.is_empty();
        Self {
            success: true,
            message: message.into(),
            delta,
            collected,
            failure: None,
        }
    }

    pub fn failed(error: &AgentError, delta: MeasuredDelta) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            delta,
            collected: false,
            failure: Some(FailureKind::from(error)),
        }
    }

    pub fn busy() -> Self {
        Self::failed(&AgentError::Busy, MeasuredDelta::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            FailureKind::from(&AgentError::CapabilityMissing("pickaxe".into())),
            FailureKind::CapabilityMissing
        );
        assert_eq!(FailureKind::from(&AgentError::Busy), FailureKind::Busy);
    }

    #[test]
    fn test_outcome_collected_tracks_delta() {
        let with_items = ActionOutcome::ok(
            "mined oak_log",
            MeasuredDelta {
                moved: 2.0,
                inventory: vec![("oak_log".into(), 1)],
            },
        );
        assert!(with_items.collected);

        let without = ActionOutcome::ok("broke block, nothing collected", MeasuredDelta::default());
        assert!(!without.collected);
    }
}
