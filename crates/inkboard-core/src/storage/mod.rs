//! Storage abstraction for persisted scenes.

mod memory;

pub use memory::MemoryStorage;

use crate::store::{SceneData, SceneError};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Scene not found: {0}")]
    NotFound(String),
    #[error("Scene data error: {0}")]
    Scene(#[from] SceneError),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Scene storage backend. Implementations may keep scenes in memory, on
/// disk or behind a network service.
pub trait Storage: Send + Sync {
    fn save(&self, id: &str, scene: &SceneData) -> BoxFuture<'_, StorageResult<()>>;

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SceneData>>;

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// All stored scene ids.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// Load a scene, falling back to an empty one. The error, if any, is handed
/// back for reporting.
pub async fn load_scene_or_empty(storage: &dyn Storage, id: &str) -> (SceneData, Option<StorageError>) {
    match storage.load(id).await {
        Ok(data) => (data, None),
        Err(e) => {
            log::warn!("Loading scene {} failed, starting empty: {}", id, e);
            (SceneData::new(Vec::new()), Some(e))
        }
    }
}
