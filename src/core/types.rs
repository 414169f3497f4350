//! Core type definitions used throughout the codebase

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eye offset above the feet position (blocks)
pub const EYE_HEIGHT: f32 = 1.62;

/// Unique identifier for world entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Broad entity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Hostile,
    Passive,
    Player,
    Item,
}

/// An entity observed in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub position: Vec3,
}

/// A single observed block cell
///
/// Distance is measured from the agent's feet at observation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockObservation {
    pub name: String,
    pub position: IVec3,
    pub distance: f32,
}

/// Block-aligned coordinates derived from a floating world position
pub trait BlockAligned {
    fn block(&self) -> IVec3;
}

impl BlockAligned for Vec3 {
    fn block(&self) -> IVec3 {
        IVec3::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Center of a block cell in floating coordinates
pub fn block_center(block: IVec3) -> Vec3 {
    Vec3::new(
        block.x as f32 + 0.5,
        block.y as f32,
        block.z as f32 + 0.5,
    )
}

/// Horizontal (XZ-plane) distance between two positions
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Unit facing vector from yaw/pitch (radians)
///
/// Yaw 0 faces +Z, increasing yaw turns toward -X. Pitch is positive
/// looking down.
pub fn facing_vector(yaw: f32, pitch: f32) -> Vec3 {
    let cos_pitch = pitch.cos();
    Vec3::new(-yaw.sin() * cos_pitch, -pitch.sin(), yaw.cos() * cos_pitch)
}

/// Yaw (radians) facing from one position toward another
pub fn yaw_toward(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    f32::atan2(-dx, dz)
}

/// Pitch (radians) facing from one eye position toward a target
pub fn pitch_toward(eye: Vec3, to: Vec3) -> f32 {
    let horizontal = horizontal_distance(eye, to);
    f32::atan2(eye.y - to.y, horizontal)
}

/// Smallest signed difference between two angles (radians), in [-PI, PI]
pub fn angle_delta(a: f32, b: f32) -> f32 {
    let mut d = (a - b) % std::f32::consts::TAU;
    if d > std::f32::consts::PI {
        d -= std::f32::consts::TAU;
    } else if d < -std::f32::consts::PI {
        d += std::f32::consts::TAU;
    }
    d
}

/// Threat proximity buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl ThreatLevel {
    /// Bucket a distance into a threat level
    pub fn from_distance(distance: f32) -> Self {
        if distance < 5.0 {
            ThreatLevel::Critical
        } else if distance < 10.0 {
            ThreatLevel::High
        } else if distance < 20.0 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }
}

/// A perceived hostile entity with its proximity bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub entity: Entity,
    pub distance: f32,
    pub level: ThreatLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_aligned_floors_negatives() {
        let pos = Vec3::new(-0.3, 64.7, 12.1);
        assert_eq!(pos.block(), IVec3::new(-1, 64, 12));
    }

    #[test]
    fn test_yaw_toward_cardinal_targets() {
        let origin = Vec3::ZERO;
        // +Z is yaw 0
        let yaw = yaw_toward(origin, Vec3::new(0.0, 0.0, 5.0));
        assert!(yaw.abs() < 1e-5);
        // -X is yaw PI/2
        let yaw = yaw_toward(origin, Vec3::new(-5.0, 0.0, 0.0));
        assert!((yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_facing_vector_matches_yaw_toward() {
        let yaw = yaw_toward(Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0));
        let dir = facing_vector(yaw, 0.0);
        let expected = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!((dir - expected).length() < 1e-4);
    }

    #[test]
    fn test_angle_delta_wraps() {
        let d = angle_delta(3.0, -3.0);
        assert!(d < 0.0);
        assert!(d.abs() < 1.0);
    }

    #[test]
    fn test_threat_level_buckets() {
        assert_eq!(ThreatLevel::from_distance(2.0), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_distance(7.0), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_distance(15.0), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_distance(40.0), ThreatLevel::Low);
    }
}
