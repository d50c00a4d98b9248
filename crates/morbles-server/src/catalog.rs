//! In-memory level catalog.
//!
//! The catalog is loaded from storage at startup and then kept in step with
//! every insert and update, without re-fetching. Mutations hold the write
//! lock across id assignment, the storage write and the in-memory change, so
//! two concurrent inserts can never compute the same id.
//!
//! Lock order: catalog lock before database lock.

use std::sync::Arc;

use morbles_shared::types::{Level, LevelId, NewLevel};
use morbles_store::{Database, StoreError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::ServerError;

pub struct Catalog {
    db: Arc<Mutex<Database>>,
    /// Sorted by ascending id.
    levels: RwLock<Vec<Level>>,
}

impl Catalog {
    /// Load the catalog from storage. Failure is returned, never replaced by
    /// an empty catalog.
    pub async fn load(db: Arc<Mutex<Database>>) -> Result<Self, StoreError> {
        let levels = db.lock().await.list_levels()?;
        info!(levels = levels.len(), "Level catalog loaded");
        Ok(Self {
            db,
            levels: RwLock::new(levels),
        })
    }

    /// Replace the snapshot with the current storage contents.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let mut levels = self.levels.write().await;
        let fresh = self.db.lock().await.list_levels()?;
        *levels = fresh;
        debug!(levels = levels.len(), "Level catalog refreshed");
        Ok(levels.len())
    }

    pub async fn list(&self) -> Vec<Level> {
        self.levels.read().await.clone()
    }

    pub async fn ids(&self) -> Vec<LevelId> {
        self.levels.read().await.iter().map(|l| l.id).collect()
    }

    pub async fn by_id(&self, id: LevelId) -> Option<Level> {
        let levels = self.levels.read().await;
        levels
            .binary_search_by_key(&id, |l| l.id)
            .ok()
            .map(|idx| levels[idx].clone())
    }

    /// The level with the smallest id strictly greater than `id`.
    pub async fn next_after(&self, id: LevelId) -> Option<Level> {
        let levels = self.levels.read().await;
        let idx = levels.partition_point(|l| l.id <= id);
        levels.get(idx).cloned()
    }

    /// Assign the next id (max + 1, or 1 when empty) and persist.
    pub async fn insert(&self, candidate: NewLevel) -> Result<Level, ServerError> {
        candidate.validate()?;

        let mut levels = self.levels.write().await;
        let id = levels
            .iter()
            .map(|l| l.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted("levels"))?;
        let level = Level::from_new(id, candidate);

        self.db.lock().await.insert_level(&level)?;
        levels.push(level.clone());

        info!(id, name = %level.name, official = level.is_official, "Level added");
        Ok(level)
    }

    /// Replace every field of level `id` except the id itself.
    ///
    /// Returns `Ok(None)` if no such level exists.
    pub async fn update(
        &self,
        id: LevelId,
        replacement: NewLevel,
    ) -> Result<Option<Level>, ServerError> {
        replacement.validate()?;

        let mut levels = self.levels.write().await;
        let Ok(idx) = levels.binary_search_by_key(&id, |l| l.id) else {
            return Ok(None);
        };
        let level = Level::from_new(id, replacement);

        if !self.db.lock().await.update_level(&level)? {
            // Row gone from storage; drop it from the snapshot too.
            levels.remove(idx);
            warn!(id, "Level missing from storage, removed from catalog");
            return Ok(None);
        }
        levels[idx] = level.clone();

        info!(id, name = %level.name, "Level updated");
        Ok(Some(level))
    }
}
