//! Scenes held in process memory.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::store::SceneData;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Volatile backend for tests and throwaway boards. Scenes are kept as the
/// JSON a file or remote backend would receive, so a save/load pair goes
/// through the same serialization path.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    scenes: RwLock<HashMap<String, String>>,
}

fn poisoned(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.scenes.read().map_err(poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.scenes.write().map_err(poisoned)
    }

    /// Store `json` under `id` as is, without validating it.
    pub fn put_raw(&self, id: &str, json: impl Into<String>) -> StorageResult<()> {
        self.write()?.insert(id.to_owned(), json.into());
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, scene: &SceneData) -> BoxFuture<'_, StorageResult<()>> {
        let entry = scene.to_json().map(|json| (id.to_owned(), json));
        Box::pin(async move {
            let (id, json) = entry?;
            log::debug!("Storing scene {} ({} bytes)", id, json.len());
            self.write()?.insert(id, json);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SceneData>> {
        let id = id.to_owned();
        Box::pin(async move {
            let scenes = self.read()?;
            match scenes.get(&id) {
                Some(json) => Ok(SceneData::from_json(json)?),
                None => Err(StorageError::NotFound(id)),
            }
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_owned();
        Box::pin(async move {
            self.write()?.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let mut ids: Vec<String> = self.read()?.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_owned();
        Box::pin(async move { Ok(self.read()?.contains_key(&id)) })
    }
}
