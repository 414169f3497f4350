//! Block classification tables
//!
//! Name-based block classes used by perception, motion, and mining. Sets are
//! built once and shared; membership checks are on the hot path of the LOS
//! ray march.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Blocks the LOS ray march sees through
static TRANSPARENT: OnceLock<AHashSet<&'static str>> = OnceLock::new();

/// Blocks breakable with bare hands in a single swing
static INSTANT_BREAK: OnceLock<AHashSet<&'static str>> = OnceLock::new();

/// Stone-family blocks used by the cave heuristic
static STONE_FAMILY: OnceLock<AHashSet<&'static str>> = OnceLock::new();

/// Blocks the agent can place from inventory
static PLACEABLE: OnceLock<AHashSet<&'static str>> = OnceLock::new();

/// Functional blocks worth remembering as landmarks
static FUNCTIONAL: OnceLock<AHashSet<&'static str>> = OnceLock::new();

fn transparent() -> &'static AHashSet<&'static str> {
    TRANSPARENT.get_or_init(|| {
        [
            "air", "cave_air", "water", "lava", "fire", "glass", "glass_pane", "tall_grass",
            "short_grass", "fern", "vine", "torch", "wall_torch", "dandelion", "poppy",
            "sugar_cane", "snow",
        ]
        .into_iter()
        .collect()
    })
}

fn instant_break() -> &'static AHashSet<&'static str> {
    INSTANT_BREAK.get_or_init(|| {
        [
            "tall_grass", "short_grass", "fern", "vine", "torch", "wall_torch",
            "dandelion", "poppy", "sugar_cane", "snow", "fire",
        ]
        .into_iter()
        .collect()
    })
}

fn stone_family() -> &'static AHashSet<&'static str> {
    STONE_FAMILY.get_or_init(|| {
        [
            "stone", "cobblestone", "andesite", "diorite", "granite", "deepslate",
            "cobbled_deepslate", "tuff", "bedrock",
        ]
        .into_iter()
        .collect()
    })
}

fn placeable() -> &'static AHashSet<&'static str> {
    PLACEABLE.get_or_init(|| {
        [
            "dirt", "cobblestone", "netherrack", "stone", "planks", "crafting_table",
            "furnace", "chest", "torch",
        ]
        .into_iter()
        .collect()
    })
}

fn functional() -> &'static AHashSet<&'static str> {
    FUNCTIONAL.get_or_init(|| {
        ["crafting_table", "furnace", "chest", "bed", "enchanting_table"]
            .into_iter()
            .collect()
    })
}

pub fn is_air(name: &str) -> bool {
    name == "air" || name == "cave_air"
}

pub fn is_liquid(name: &str) -> bool {
    name == "water" || name == "lava"
}

pub fn is_solid(name: &str) -> bool {
    !is_air(name) && !is_liquid(name) && !instant_break().contains(name)
}

pub fn is_transparent(name: &str) -> bool {
    transparent().contains(name)
}

pub fn is_instant_break(name: &str) -> bool {
    instant_break().contains(name)
}

pub fn is_stone_family(name: &str) -> bool {
    stone_family().contains(name)
}

pub fn is_placeable(name: &str) -> bool {
    placeable().contains(name)
}

pub fn is_functional(name: &str) -> bool {
    functional().contains(name)
}

/// Column-type blocks grow vertically; mining prefers trunk-level candidates
pub fn is_column(name: &str) -> bool {
    name.ends_with("_log") || name == "bamboo" || name == "cactus" || name == "sugar_cane"
}

/// Ore and wood blocks reported as nearby resources
pub fn is_resource(name: &str) -> bool {
    name.ends_with("_ore") || name.ends_with("_log")
}

/// Tool classes the capability check recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolClass {
    Pickaxe,
    Axe,
    Shovel,
    Sword,
}

/// A held tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub class: ToolClass,
}

/// Tool class required to harvest a block, if any
///
/// Blocks not listed here harvest bare-handed.
pub fn required_tool(block: &str) -> Option<ToolClass> {
    if block.ends_with("_ore") || is_stone_family(block) && block != "bedrock" {
        Some(ToolClass::Pickaxe)
    } else if block == "obsidian" {
        Some(ToolClass::Pickaxe)
    } else {
        None
    }
}
