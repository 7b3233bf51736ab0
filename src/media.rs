use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::storage::StorageClient;

/// Uploads are named by the current epoch-millisecond plus the original
/// file's extension; the database stores only this name.
pub fn stored_filename(original: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    match extension(original) {
        Some(ext) => format!("{millis}.{ext}"),
        None => millis.to_string(),
    }
}

fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains('/') || ext.contains('\\') {
        None
    } else {
        Some(ext)
    }
}

pub async fn store_upload(
    storage: &dyn StorageClient,
    original: &str,
    body: Bytes,
) -> anyhow::Result<String> {
    let name = stored_filename(original);
    storage.put_object(&name, body).await?;
    Ok(name)
}

/// Best-effort removal of a superseded media file. Callers invoke this only
/// after the row pointing at the replacement has been committed; a failure
/// here is logged and never fails the request.
pub async fn delete_stale(storage: &dyn StorageClient, name: Option<&str>) {
    let Some(name) = name else { return };
    if let Err(err) = storage.delete_object(name).await {
        tracing::warn!(error = %err, file = %name, "failed to delete stale upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn extension_parsing() {
        assert_eq!(extension("photo.jpg"), Some("jpg"));
        assert_eq!(extension("archive.tar.gz"), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("trailing."), None);
        assert_eq!(extension("weird.a/b"), None);
    }

    #[test]
    fn stored_filename_keeps_extension() {
        let name = stored_filename("me.png");
        let (stem, ext) = name.rsplit_once('.').expect("has extension");
        assert_eq!(ext, "png");
        assert!(stem.chars().all(|c| c.is_ascii_digit()));
        assert!(stem.len() >= 13, "epoch millis are 13 digits: {stem}");
    }

    #[test]
    fn stored_filename_without_extension_is_bare_timestamp() {
        let name = stored_filename("blob");
        assert!(name.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn store_upload_writes_under_generated_name() {
        let storage = MemoryStorage::default();
        let name = store_upload(&storage, "intro.mp4", Bytes::from_static(b"video"))
            .await
            .expect("store");
        assert!(name.ends_with(".mp4"));
        assert!(storage.contains(&name));
    }

    #[tokio::test]
    async fn delete_stale_is_silent_on_missing_file() {
        let storage = MemoryStorage::default();
        // Neither arm panics or errors.
        delete_stale(&storage, None).await;
        delete_stale(&storage, Some("gone.jpg")).await;
    }

    #[tokio::test]
    async fn delete_stale_removes_existing_file() {
        let storage = MemoryStorage::default();
        storage
            .put_object("old.jpg", Bytes::from_static(b"old"))
            .await
            .expect("put");
        delete_stale(&storage, Some("old.jpg")).await;
        assert!(!storage.contains("old.jpg"));
    }
}
