//! ブロブストア
//!
//! 台帳ドキュメントとRSS設定ドキュメントをキー単位で丸ごと読み書きする。
//! 部分更新はサポートしない（常に全置換）。

pub mod file;
pub mod http;

use crate::types::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

pub use file::FileBlobStore;
pub use http::HttpBlobStore;

/// ブロブストアの抽象化トレイト
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// キーのドキュメントを取得する。存在しない場合もエラー
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// キーのドキュメントを全置換で書き込む
    async fn put(&self, key: &str, body: Vec<u8>) -> StoreResult<()>;
}

/// テスト用のメモリ上のブロブストア
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期ドキュメントを登録
    pub fn with_object(self, key: &str, body: &str) -> Self {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), body.as_bytes().to_vec());
        }
        self
    }

    /// 保存されているドキュメントを文字列で取得
    pub fn object_text(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()?
            .get(key)
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }

    /// これまでの書き込み回数
    pub fn put_count(&self) -> usize {
        self.puts.lock().map(|count| *count).unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::read(key, "ストアの状態が壊れています"))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::read(key, "ドキュメントが存在しません"))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::write(key, "ストアの状態が壊れています"))?;
        objects.insert(key.to_string(), body);
        if let Ok(mut puts) = self.puts.lock() {
            *puts += 1;
        }
        Ok(())
    }
}

/// ドライラン用デコレータ。読み込みは委譲し、書き込みはログ出力のみ
pub struct DryRunBlobStore<S> {
    inner: S,
}

impl<S: BlobStore> DryRunBlobStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for DryRunBlobStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        info!(key, bytes = body.len(), "[dry-run] ストアへの書き込みをスキップ");
        Ok(())
    }
}
