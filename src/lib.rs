//! Wayfarer - Embodied Motion and Recovery Engine

pub mod actions;
pub mod core;
pub mod health;
pub mod memory;
pub mod motion;
pub mod perception;
pub mod recovery;
pub mod session;
pub mod world;
