use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

/// Flat media store backing profile uploads. Names are opaque filenames;
/// there is no directory hierarchy.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn delete_object(&self, name: &str) -> anyhow::Result<()>;
    async fn object_exists(&self, name: &str) -> bool;
}

/// Local-disk store rooted at the configured uploads directory.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create uploads dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            anyhow::bail!("invalid object name {:?}", name);
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }

    async fn object_exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// In-memory store used by `AppState::fake()` and unit tests.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn contains(&self, name: &str) -> bool {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .contains_key(name)
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .insert(name.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("no such object {}", name))
    }

    async fn object_exists(&self, name: &str) -> bool {
        self.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> LocalStorage {
        let dir = std::env::temp_dir().join(format!("tutorhub-test-{}", uuid::Uuid::new_v4()));
        LocalStorage::new(dir).await.expect("create temp store")
    }

    #[tokio::test]
    async fn put_exists_delete_roundtrip() {
        let store = temp_store().await;
        let name = "1699999999999.png";

        assert!(!store.object_exists(name).await);
        store
            .put_object(name, Bytes::from_static(b"png bytes"))
            .await
            .expect("put");
        assert!(store.object_exists(name).await);

        store.delete_object(name).await.expect("delete");
        assert!(!store.object_exists(name).await);
    }

    #[tokio::test]
    async fn delete_missing_object_errors() {
        let store = temp_store().await;
        assert!(store.delete_object("never-stored.jpg").await.is_err());
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let store = temp_store().await;
        for bad in ["../etc/passwd", "a/b.png", "a\\b.png", ""] {
            assert!(
                store.put_object(bad, Bytes::from_static(b"x")).await.is_err(),
                "{bad:?} should be rejected"
            );
            assert!(!store.object_exists(bad).await);
        }
    }

    #[tokio::test]
    async fn memory_storage_tracks_objects() {
        let store = MemoryStorage::default();
        store
            .put_object("pic.jpg", Bytes::from_static(b"jpg"))
            .await
            .expect("put");
        assert!(store.contains("pic.jpg"));
        store.delete_object("pic.jpg").await.expect("delete");
        assert!(!store.contains("pic.jpg"));
        assert!(store.delete_object("pic.jpg").await.is_err());
    }
}
