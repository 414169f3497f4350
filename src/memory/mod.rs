//! Persistent spatial memory

pub mod landmarks;

pub use landmarks::LandmarkStore;
