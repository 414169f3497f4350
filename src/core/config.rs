//! Agent configuration with documented constants
//!
//! All tuning values are collected here with explanations of their purpose
//! and how they interact. The config travels inside the session context;
//! there is deliberately no ambient global accessor.

use serde::Deserialize;
use std::path::Path;

use crate::core::error::Result;

/// Configuration for the motion and recovery engine
///
/// These values have been tuned against the simulated world scenarios.
/// Changing them shifts how eagerly the agent declares itself stuck and
/// how patient motion loops are.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // === PERCEPTION ===
    /// Half-angle of the perceivable cone, degrees
    ///
    /// Targets whose horizontal bearing deviates from the facing direction
    /// by more than this are not perceivable (unless the memory exception
    /// applies).
    pub fov_half_angle_deg: f32,

    /// Ray-march step for line-of-sight tests, blocks
    ///
    /// Smaller steps catch thin occluders at higher cost. 0.5 samples every
    /// cell at least once for targets within normal ranges.
    pub los_step: f32,

    /// Beyond this range, FOV/LOS tests are bypassed for remembered
    /// functional blocks (never for hostile entities)
    pub memory_range: f32,

    /// Samples per directional scan ray
    pub scan_depth: usize,

    /// Eye level below this Y counts as underground
    pub surface_y: f32,

    /// Sky-light value meaning full sky exposure
    pub max_sky_light: u8,

    /// Horizontal cells sampled per heading in the brightest-direction sweep
    pub brightest_sweep_cells: i32,

    /// Radius of the nearest-resource search cube, blocks
    pub resource_search_radius: i32,

    // === MOTION ===
    /// Within this distance of a walk target, the agent has arrived
    pub arrive_radius: f32,

    /// Interval between stuck samples in the direct-walk loop, ms
    pub stuck_sample_ms: u64,

    /// Displacement below this per sample interval counts as no movement
    pub stuck_epsilon: f32,

    /// Obstacle-clearing attempts before a direct walk gives up
    pub max_clear_attempts: u32,

    /// Default direct-walk timeout, ms
    pub walk_timeout_ms: u64,

    /// Delegated pathfinding poll tick, ms
    pub path_poll_ms: u64,

    /// Abort pathfinding when remaining distance exceeds the initial
    /// distance by this margin (the bad-path abort)
    pub bad_path_margin: f32,

    /// No-progress window before a pathfinding stall is declared, ms
    pub stall_timeout_ms: u64,

    /// Automatic obstacle-break-and-resume cycles per pathfinding call
    pub max_break_resume_cycles: u32,

    /// Default delegated-pathfinding timeout, ms
    pub navigate_timeout_ms: u64,

    /// Look interpolation rate while navigating, radians/second
    pub look_fast_rate: f32,

    /// Look interpolation rate while idle, radians/second
    pub look_slow_rate: f32,

    // === STUCK DETECTION & RECOVERY ===
    /// Consecutive blocked moves before the agent is judged stuck
    pub blocked_moves_threshold: u32,

    /// No verified displacement within this window also means stuck, ms
    pub stall_window_ms: u64,

    /// Net displacement below this over the history window counts as none
    pub min_progress: f32,

    /// Hard bound on recovery attempts before the state machine reports
    /// Exhausted
    pub max_recovery_attempts: u32,

    /// Wall-clock budget per recovery strategy, ms
    pub strategy_budget_ms: u64,

    /// Pillar strategy target height, blocks
    pub pillar_target_height: i32,

    /// How deep horizontal clearing probes per direction, blocks
    pub clear_probe_depth: i32,

    // === ACTIONS ===
    /// Tool reach for mining and placing, blocks
    pub reach: f32,

    /// Bounded wait for an inventory delta after breaking a block, ms
    pub collect_wait_ms: u64,

    /// Radius searched for dropped-item entities after a break
    pub item_search_radius: f32,

    /// Melee reach for attacks, blocks
    pub attack_reach: f32,

    // === HEALTH ===
    /// Health at or below this triggers the reflex escape outright
    pub critical_health: f32,

    /// Damage within the rolling window above this rate triggers the reflex
    pub damage_rate_threshold: f32,

    /// Rolling damage window, ms
    pub damage_window_ms: u64,

    /// Minimum interval between reflex firings, ms
    pub reflex_cooldown_ms: u64,

    /// Maximum retained health events
    pub max_health_events: usize,

    // === MEMORY ===
    /// Debounce before dirty landmark memory is flushed to disk, ms
    pub landmark_flush_debounce_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            // Perception
            fov_half_angle_deg: 70.0,
            los_step: 0.5,
            memory_range: 32.0,
            scan_depth: 5,
            surface_y: 60.0,
            max_sky_light: 15,
            brightest_sweep_cells: 16,
            resource_search_radius: 6,

            // Motion
            arrive_radius: 0.5,
            stuck_sample_ms: 500,
            stuck_epsilon: 0.2,
            max_clear_attempts: 3,
            walk_timeout_ms: 10_000,
            path_poll_ms: 250,
            bad_path_margin: 8.0,
            stall_timeout_ms: 4_000,
            max_break_resume_cycles: 2,
            navigate_timeout_ms: 30_000,
            look_fast_rate: 6.0,
            look_slow_rate: 1.5,

            // Stuck detection & recovery
            blocked_moves_threshold: 3,
            stall_window_ms: 10_000,
            min_progress: 1.0,
            max_recovery_attempts: 5,
            strategy_budget_ms: 8_000,
            pillar_target_height: 5,
            clear_probe_depth: 2,

            // Actions
            reach: 4.5,
            collect_wait_ms: 3_000,
            item_search_radius: 8.0,
            attack_reach: 3.0,

            // Health
            critical_health: 6.0,
            damage_rate_threshold: 6.0,
            damage_window_ms: 5_000,
            reflex_cooldown_ms: 3_000,
            max_health_events: 32,

            // Memory
            landmark_flush_debounce_ms: 2_000,
        }
    }
}

impl AgentConfig {
    /// Load a config from a TOML file, filling omitted keys with defaults
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)
            .map_err(|e| crate::core::error::AgentError::InvalidRequest(e.to_string()))?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.fov_half_angle_deg <= 0.0 || self.fov_half_angle_deg > 90.0 {
            return Err(format!(
                "fov_half_angle_deg ({}) must be in (0, 90]",
                self.fov_half_angle_deg
            ));
        }
        if self.los_step <= 0.0 || self.los_step > 1.0 {
            return Err(format!("los_step ({}) must be in (0, 1]", self.los_step));
        }
        if self.arrive_radius >= self.bad_path_margin {
            return Err(format!(
                "arrive_radius ({}) must be < bad_path_margin ({})",
                self.arrive_radius, self.bad_path_margin
            ));
        }
        if self.stall_timeout_ms >= self.navigate_timeout_ms {
            return Err(format!(
                "stall_timeout_ms ({}) must be < navigate_timeout_ms ({})",
                self.stall_timeout_ms, self.navigate_timeout_ms
            ));
        }
        if self.max_recovery_attempts == 0 {
            return Err("max_recovery_attempts must be at least 1".into());
        }
        if self.min_progress <= 0.0 {
            return Err("min_progress must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_fov_rejected() {
        let config = AgentConfig {
            fov_half_angle_deg: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stall_must_undercut_navigate_timeout() {
        let config = AgentConfig {
            stall_timeout_ms: 60_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_override() {
        let config: AgentConfig = toml::from_str("max_recovery_attempts = 7").unwrap();
        assert_eq!(config.max_recovery_attempts, 7);
        assert_eq!(config.scan_depth, 5);
    }
}
