//! Landmark memory
//!
//! Remembers where named blocks of interest were seen, keyed by block
//! name, so the agent can return to a crafting table or cave mouth it
//! walked away from. File-backed stores persist as JSON with debounced
//! flushes; the in-memory variant is for tests and throwaway sessions.

use ahash::AHashMap;
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::core::error::Result;
use crate::core::types::block_center;

/// Remembered positions per landmark, most recent last
#[derive(Debug, Default, Serialize, Deserialize)]
struct LandmarkMap {
    landmarks: AHashMap<String, Vec<IVec3>>,
}

/// Positions remembered per landmark name
const MAX_POSITIONS_PER_NAME: usize = 16;

struct StoreInner {
    map: LandmarkMap,
    dirty: bool,
}

/// Named-position memory with optional JSON persistence
pub struct LandmarkStore {
    path: Option<PathBuf>,
    inner: Mutex<StoreInner>,
}

impl LandmarkStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(StoreInner {
                map: LandmarkMap::default(),
                dirty: false,
            }),
        }
    }

    /// Load from a JSON file, starting empty when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let map = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => LandmarkMap::default(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path: Some(path),
            inner: Mutex::new(StoreInner { map, dirty: false }),
        })
    }

    /// Remember a position for a landmark name
    pub fn record(&self, name: &str, position: IVec3) {
        let mut inner = self.inner.lock().unwrap();
        let positions = inner.map.landmarks.entry(name.to_string()).or_default();
        if positions.contains(&position) {
            return;
        }
        positions.push(position);
        while positions.len() > MAX_POSITIONS_PER_NAME {
            positions.remove(0);
        }
        inner.dirty = true;
        debug!(name, ?position, "landmark recorded");
    }

    /// Forget a position, e.g. after the block was broken
    pub fn forget(&self, name: &str, position: IVec3) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(positions) = inner.map.landmarks.get_mut(name) {
            let before = positions.len();
            positions.retain(|p| *p != position);
            if positions.len() != before {
                inner.dirty = true;
            }
        }
    }

    /// Closest remembered position for a landmark name
    pub fn nearest(&self, name: &str, from: Vec3) -> Option<IVec3> {
        let inner = self.inner.lock().unwrap();
        inner
            .map
            .landmarks
            .get(name)?
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = from.distance_squared(block_center(*a));
                let db = from.distance_squared(block_center(*b));
                da.total_cmp(&db)
            })
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.map.landmarks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write to disk unconditionally; no-op for in-memory stores
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut inner = self.inner.lock().unwrap();
        let text = serde_json::to_string_pretty(&inner.map)?;
        std::fs::write(path, text)?;
        inner.dirty = false;
        Ok(())
    }

    /// Write to disk only when something changed since the last flush
    pub fn flush_if_dirty(&self) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if !inner.dirty {
                return Ok(());
            }
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_picks_closest() {
        let store = LandmarkStore::in_memory();
        store.record("crafting_table", IVec3::new(10, 64, 0));
        store.record("crafting_table", IVec3::new(2, 64, 0));
        store.record("furnace", IVec3::new(1, 64, 0));

        let from = Vec3::new(0.5, 64.0, 0.5);
        assert_eq!(
            store.nearest("crafting_table", from),
            Some(IVec3::new(2, 64, 0))
        );
        assert_eq!(store.nearest("chest", from), None);
    }

    #[test]
    fn test_record_deduplicates() {
        let store = LandmarkStore::in_memory();
        store.record("furnace", IVec3::new(1, 64, 0));
        store.record("furnace", IVec3::new(1, 64, 0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_forget_removes_position() {
        let store = LandmarkStore::in_memory();
        store.record("chest", IVec3::new(4, 64, 4));
        store.forget("chest", IVec3::new(4, 64, 4));
        assert!(store.is_empty());
    }

    #[test]
    fn test_positions_per_name_bounded() {
        let store = LandmarkStore::in_memory();
        for i in 0..40 {
            store.record("torch", IVec3::new(i, 64, 0));
        }
        assert_eq!(store.len(), MAX_POSITIONS_PER_NAME);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("landmarks-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("landmarks.json");

        let store = LandmarkStore::load(&path).unwrap();
        store.record("crafting_table", IVec3::new(7, 60, -3));
        store.flush_if_dirty().unwrap();

        let reloaded = LandmarkStore::load(&path).unwrap();
        assert_eq!(
            reloaded.nearest("crafting_table", Vec3::ZERO),
            Some(IVec3::new(7, 60, -3))
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
