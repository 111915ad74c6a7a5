use super::BlobStore;
use crate::types::{StoreError, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// ローカルディレクトリをブロブストアとして扱う実装
///
/// キーはディレクトリからの相対パス。書き込みは一時ファイルに出力してから
/// リネームするため、途中で失敗しても既存のドキュメントは壊れない。
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::read(key, format!("{} - {}", path.display(), e)))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::write(key, e))?;
        }

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| StoreError::write(key, format!("{} - {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StoreError::write(key, format!("{} - {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());

        store
            .put("ledger/posted_urls.json", b"[]".to_vec())
            .await
            .unwrap();
        let body = store.get("ledger/posted_urls.json").await.unwrap();
        assert_eq!(body, b"[]".to_vec());

        // 全置換で上書きされる
        store
            .put("ledger/posted_urls.json", b"[{}]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get("ledger/posted_urls.json").await.unwrap(),
            b"[{}]".to_vec()
        );
        assert!(
            !dir.path().join("ledger/posted_urls.tmp").exists(),
            "一時ファイルが残っている"
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());

        let result = store.get("none.json").await;
        assert!(matches!(result, Err(StoreError::Read { .. })));
    }
}
