//! Photo byte storage backends

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use ppfw_common::{Error, Result};

/// Where uploaded photo bytes live
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Store `bytes` and return the backend key
    async fn put(
        &self,
        intervention_id: Uuid,
        photo_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String>;

    /// Remove stored bytes; removing an absent key succeeds
    async fn remove(&self, storage_key: &str) -> Result<()>;
}

/// Files under `<root>/<intervention_id>/<photo_id>.<ext>`
#[derive(Debug, Clone)]
pub struct FsPhotoStore {
    root: PathBuf,
}

impl FsPhotoStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, storage_key: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if storage_key.is_empty() || escapes {
            return Err(Error::InvalidInput(format!("Invalid storage key: {}", storage_key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PhotoStore for FsPhotoStore {
    async fn put(
        &self,
        intervention_id: Uuid,
        photo_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let storage_key = format!("{}/{}.{}", intervention_id, photo_id, extension);
        let path = self.resolve(&storage_key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(storage_key = %storage_key, size = bytes.len(), "Photo stored");
        Ok(storage_key)
    }

    async fn remove(&self, storage_key: &str) -> Result<()> {
        let path = self.resolve(storage_key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_remove() {
        let dir = TempDir::new().unwrap();
        let store = FsPhotoStore::new(dir.path().to_path_buf());
        let iv = Uuid::new_v4();
        let photo = Uuid::new_v4();

        let key = store.put(iv, photo, "jpg", b"\xFF\xD8\xFFdata").await.unwrap();
        assert_eq!(key, format!("{}/{}.jpg", iv, photo));
        assert!(dir.path().join(&key).exists());

        store.remove(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        // Second removal is a no-op
        store.remove(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_keys_leaving_root() {
        let dir = TempDir::new().unwrap();
        let store = FsPhotoStore::new(dir.path().to_path_buf());

        assert!(store.remove("../etc/passwd").await.is_err());
        assert!(store.remove("/etc/passwd").await.is_err());
        assert!(store.remove("").await.is_err());
    }
}
