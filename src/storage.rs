use async_trait::async_trait;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoStoreError {
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Uploaded-photo storage behind a trait object so handlers and tests never
/// care where the bytes live.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persist `bytes` and return the generated filename (`{uuid}.{ext}`).
    async fn save(&self, ext: &str, bytes: &[u8]) -> Result<String, PhotoStoreError>;
    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), PhotoStoreError>;
    /// Best-effort: a missing file is not an error.
    async fn delete(&self, name: &str) -> Result<(), PhotoStoreError>;
}

/// Local-disk store under a public uploads directory served by the app
/// itself.
pub struct FsPhotoStore {
    root: PathBuf,
}

impl FsPhotoStore {
    pub fn new() -> Self {
        let root = std::env::var("PETAFF_UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        if let Err(e) = std::fs::create_dir_all(&root) {
            error!("failed to create uploads dir '{}': {e}", root.display());
        }
        Self { root }
    }

    // Stored names are always `{uuid}.{ext}`; anything else is a client
    // fabricating a path.
    fn checked_path(&self, name: &str) -> Result<PathBuf, PhotoStoreError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(PhotoStoreError::NotFound);
        }
        Ok(self.root.join(name))
    }
}

impl Default for FsPhotoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhotoStore for FsPhotoStore {
    async fn save(&self, ext: &str, bytes: &[u8]) -> Result<String, PhotoStoreError> {
        let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PhotoStoreError::Other(e.to_string()))?;
        Ok(name)
    }

    async fn load(&self, name: &str) -> Result<(Vec<u8>, String), PhotoStoreError> {
        let path = self.checked_path(name)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| PhotoStoreError::NotFound)?;
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((bytes, mime))
    }

    async fn delete(&self, name: &str) -> Result<(), PhotoStoreError> {
        let path = self.checked_path(name)?;
        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }
}

pub fn build_photo_store() -> Arc<dyn PhotoStore> {
    let store = FsPhotoStore::new();
    info!("photo store: local directory '{}'", store.root.display());
    Arc::new(store)
}
