use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 記事の取得元。投稿テンプレートの選択に使い、台帳には保存しない
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleOrigin {
    /// 固定のスクレイピング対象（出没情報一覧ページ）
    #[default]
    Scraped,
    /// 設定されたRSSフィード
    Feed,
}

/// 記事エンティティ
///
/// `url` が重複判定のキー、`published_at` が投稿順、`posted_at` が保持期間の
/// 基準になる。`posted_at` が未設定のものは投稿待ちで、台帳には保存されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub origin: ArticleOrigin,
}

impl ArticleRecord {
    /// 投稿待ちの記事を作成
    pub fn pending(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        published_at: DateTime<Utc>,
        origin: ArticleOrigin,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: description.into(),
            published_at,
            posted_at: None,
            origin,
        }
    }

    /// 投稿待ちかどうか
    pub fn is_pending(&self) -> bool {
        self.posted_at.is_none()
    }

    /// 投稿済みとして記録した記事を返す
    pub fn mark_posted(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = Some(posted_at);
        self
    }
}

/// 公開日時の昇順に並べる（同時刻は元の順序を保つ）
pub fn sort_by_published(articles: &mut [ArticleRecord]) {
    articles.sort_by(|a, b| a.published_at.cmp(&b.published_at));
}
