use crate::domain::article::ArticleRecord;
use crate::infra::storage::BlobStore;
use crate::types::{StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 投稿済みURLの保持日数
pub const RETENTION_DAYS: i64 = 30;

/// 投稿済み記事の台帳
///
/// ブロブストア上の1つのJSON配列ドキュメントとして永続化される。
/// 読み込み→期限切れの除外→新規投稿の追加→全体の上書き保存、の順に使う。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlLedger {
    entries: Vec<ArticleRecord>,
}

impl UrlLedger {
    /// 同じURLのエントリが複数あれば`posted_at`が最も新しいものだけを残す
    pub fn new(entries: Vec<ArticleRecord>) -> Self {
        Self {
            entries: dedup_by_url(entries),
        }
    }

    /// ストアから台帳を読み込む。ドキュメントが無い場合もエラー
    pub async fn load<S: BlobStore + ?Sized>(store: &S, key: &str) -> StoreResult<Self> {
        let body = store.get(key).await?;
        let entries: Vec<ArticleRecord> =
            serde_json::from_slice(&body).map_err(|e| StoreError::json(key, e))?;
        let loaded = entries.len();
        let ledger = Self::new(entries);
        if ledger.len() < loaded {
            warn!(
                key = %key,
                duplicates = loaded - ledger.len(),
                "台帳の重複URLをまとめました"
            );
        }
        info!(key = %key, count = ledger.len(), "台帳を読み込みました");
        Ok(ledger)
    }

    pub fn entries(&self) -> &[ArticleRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 保持期間内（`now - retention_days` 以降に投稿）のエントリのみを残した台帳を返す
    ///
    /// 境界ちょうどのエントリは残す。`posted_at` の無いエントリは除外される。
    /// ストアには書き込まない。
    pub fn prune(&self, now: DateTime<Utc>, retention_days: i64) -> Self {
        let cutoff = now - Duration::days(retention_days);
        let entries: Vec<ArticleRecord> = self
            .entries
            .iter()
            .filter(|entry| entry.posted_at.is_some_and(|posted| posted >= cutoff))
            .cloned()
            .collect();
        debug!(
            before = self.entries.len(),
            after = entries.len(),
            cutoff = %cutoff,
            "保持期間外のエントリを除外"
        );
        Self { entries }
    }

    /// 重複判定用のURL集合
    pub fn membership_set(&self) -> HashSet<String> {
        self.entries.iter().map(|entry| entry.url.clone()).collect()
    }

    /// 新規エントリを追加し、台帳全体をストアへ上書き保存する
    ///
    /// 既に存在するURLのエントリは追加しない。追加が0件でも保存する。
    pub async fn append_and_save<S: BlobStore + ?Sized>(
        mut self,
        store: &S,
        key: &str,
        new_entries: Vec<ArticleRecord>,
    ) -> StoreResult<Self> {
        let mut urls = self.membership_set();
        let mut appended = 0;
        for entry in new_entries {
            if urls.insert(entry.url.clone()) {
                self.entries.push(entry);
                appended += 1;
            }
        }

        let body = serde_json::to_vec_pretty(&self.entries).map_err(|e| StoreError::json(key, e))?;
        store.put(key, body).await?;
        info!(
            key = %key,
            appended,
            total = self.entries.len(),
            "台帳を保存しました"
        );
        Ok(self)
    }
}

/// 最初に現れた位置を保ったまま、URLごとに最新の投稿日時のエントリへまとめる
fn dedup_by_url(entries: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ArticleRecord> = Vec::with_capacity(entries.len());
    for entry in entries {
        match positions.get(&entry.url) {
            Some(&i) => {
                if entry.posted_at > unique[i].posted_at {
                    unique[i] = entry;
                }
            }
            None => {
                positions.insert(entry.url.clone(), unique.len());
                unique.push(entry);
            }
        }
    }
    unique
}
