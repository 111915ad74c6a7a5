use crate::domain::article::{sort_by_published, ArticleOrigin, ArticleRecord};
use crate::domain::relevance::RelevanceRuleSet;
use crate::infra::api::http::{HttpClient, HTTP_TIMEOUT_SECS};
use crate::infra::parser::{
    collapse_whitespace, html_to_text, parse_atom_from_xml_str, parse_channel_from_xml_str,
    parse_date, truncate_chars,
};
use crate::infra::storage::BlobStore;
use crate::types::{FetchResult, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rss::Item;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// フィード記事の抜粋の最大文字数
pub const EXCERPT_MAX_CHARS: usize = 100;

/// RSS設定ドキュメント
///
/// ```json
/// {"include_keywords": ["クマ"], "exclude_keywords": ["クマノミ"], "rss_sources": ["https://..."]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssSourceConfig {
    #[serde(flatten)]
    pub rules: RelevanceRuleSet,
    #[serde(default)]
    pub rss_sources: Vec<String>,
}

/// ブロブストアからRSS設定ドキュメントを読み込む
///
/// 起動時に1度だけ呼び、以降は参照で各処理へ渡す。
pub async fn load_rss_config<S: BlobStore + ?Sized>(
    store: &S,
    key: &str,
) -> StoreResult<RssSourceConfig> {
    let body = store.get(key).await?;
    let config: RssSourceConfig =
        serde_json::from_slice(&body).map_err(|e| StoreError::json(key, e))?;
    info!(
        sources = config.rss_sources.len(),
        include = config.rules.include_keywords.len(),
        exclude = config.rules.exclude_keywords.len(),
        "RSS設定を読み込みました"
    );
    Ok(config)
}

/// RSS・Atomの項目を共通の形にしたもの
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    /// 説明文（HTMLを含む場合がある）
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl FeedEntry {
    /// RSSの`item`。日付は`pubDate`、なければDublin Coreの日付
    pub fn from_rss_item(item: &Item) -> Self {
        let published = item.pub_date().and_then(parse_date).or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().iter().find_map(|date| parse_date(date)))
        });
        Self {
            title: item.title().map(str::trim).unwrap_or_default().to_string(),
            link: item.link().map(|link| link.trim().to_string()),
            summary: item.description().or(item.content()).map(str::to_string),
            published,
        }
    }

    /// Atomの`entry`。リンクは`rel="alternate"`（省略含む）を優先し、日付は`published`、なければ`updated`
    pub fn from_atom_entry(entry: feed_rs::model::Entry) -> Self {
        let link = entry
            .links
            .iter()
            .find(|link| link.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| entry.links.first())
            .map(|link| link.href.trim().to_string());
        let summary = entry
            .summary
            .map(|text| text.content)
            .or_else(|| entry.content.and_then(|content| content.body));
        Self {
            title: entry
                .title
                .map(|text| text.content.trim().to_string())
                .unwrap_or_default(),
            link,
            summary,
            published: entry.published.or(entry.updated),
        }
    }
}

/// フィード本文を解析する。RSSとして読めなければAtomとして読む
///
/// どちらでも読めない場合はRSSとしての解析エラーを返す。
pub fn parse_feed_entries(url: &str, xml: &str) -> FetchResult<Vec<FeedEntry>> {
    match parse_channel_from_xml_str(url, xml) {
        Ok(channel) => Ok(channel.items().iter().map(FeedEntry::from_rss_item).collect()),
        Err(rss_error) => {
            let feed = parse_atom_from_xml_str(url, xml).map_err(|atom_error| {
                debug!(feed = %url, error = %atom_error, "Atomとしても解析できません");
                rss_error
            })?;
            Ok(feed.entries.into_iter().map(FeedEntry::from_atom_entry).collect())
        }
    }
}

/// フィードURLから項目を取得する
pub async fn fetch_feed_entries<H: HttpClient + ?Sized>(
    client: &H,
    url: &str,
) -> FetchResult<Vec<FeedEntry>> {
    let xml = client.get_text(url, HTTP_TIMEOUT_SECS).await?;
    parse_feed_entries(url, &xml)
}

/// 設定された全フィードから関連記事を収集する
///
/// `seen` は台帳のURLと、この実行で既に採用したURLの集合。採用した記事の
/// URLは即座に追加されるため、複数フィードに同じリンクがあっても1件になる。
/// 1つのフィードの失敗はログに残して次のフィードへ進む。
/// 戻り値は公開日時の昇順。
pub async fn collect_feed_articles<H: HttpClient + ?Sized>(
    client: &H,
    config: &RssSourceConfig,
    seen: &mut HashSet<String>,
    now: DateTime<Utc>,
) -> Vec<ArticleRecord> {
    let mut articles = Vec::new();

    for url in &config.rss_sources {
        let entries = match fetch_feed_entries(client, url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(feed = %url, error = %e, "フィードの取得に失敗したためスキップ");
                continue;
            }
        };

        let before = articles.len();
        for entry in &entries {
            if let Some(article) = entry_to_article(entry, &config.rules, seen, now) {
                seen.insert(article.url.clone());
                articles.push(article);
            }
        }
        debug!(
            feed = %url,
            items = entries.len(),
            accepted = articles.len() - before,
            "フィードを処理"
        );
    }

    sort_by_published(&mut articles);
    info!(count = articles.len(), "フィードから関連記事を収集");
    articles
}

/// フィードの1項目を記事に変換する。採用しない場合は`None`
fn entry_to_article(
    entry: &FeedEntry,
    rules: &RelevanceRuleSet,
    seen: &HashSet<String>,
    now: DateTime<Utc>,
) -> Option<ArticleRecord> {
    let link = entry.link.as_deref().filter(|link| !link.is_empty())?;
    if seen.contains(link) {
        return None;
    }

    let description = excerpt(entry.summary.as_deref().unwrap_or_default());
    if !rules.is_relevant(&format!("{}{}", entry.title, description)) {
        return None;
    }

    Some(ArticleRecord::pending(
        link,
        entry.title.clone(),
        description,
        entry.published.unwrap_or(now),
        ArticleOrigin::Feed,
    ))
}

/// 説明文からマークアップを除き、切り詰めてリンク記号を付ける
fn excerpt(raw: &str) -> String {
    let text = collapse_whitespace(&html_to_text(raw));
    if text.is_empty() {
        return String::new();
    }
    format!("🔗 {}", truncate_chars(&text, EXCERPT_MAX_CHARS))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{atom_xml, rss_xml};
    use super::*;
    use crate::infra::api::http::MockHttpClient;
    use crate::infra::storage::MemoryBlobStore;
    use chrono::TimeZone;

    fn config(sources: &[&str]) -> RssSourceConfig {
        RssSourceConfig {
            rules: RelevanceRuleSet::new(vec!["クマ".to_string()], vec!["クマノミ".to_string()]),
            rss_sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_collect_filters_and_sorts() {
        let feed_a = rss_xml(&[
            (
                "クマが出没",
                "https://news.example.com/2",
                "<p>市街地で<b>クマ</b>を目撃</p>",
                "Fri, 31 Oct 2025 12:00:00 +0900",
            ),
            ("クマノミ展示", "https://news.example.com/x", "水族館", "Fri, 31 Oct 2025 10:00:00 +0900"),
            ("天気", "https://news.example.com/y", "晴れ", "Fri, 31 Oct 2025 10:00:00 +0900"),
            ("クマ リンクなし", "", "本文", "Fri, 31 Oct 2025 10:00:00 +0900"),
        ]);
        let feed_b = rss_xml(&[(
            "山でクマ",
            "https://news.example.com/1",
            "登山道",
            "Thu, 30 Oct 2025 08:00:00 +0900",
        )]);
        let client = MockHttpClient::new()
            .with_response("https://a.example.com/rss", &feed_a)
            .with_response("https://b.example.com/rss", &feed_b);

        let mut seen = HashSet::new();
        let articles = collect_feed_articles(
            &client,
            &config(&["https://a.example.com/rss", "https://b.example.com/rss"]),
            &mut seen,
            now(),
        )
        .await;

        let urls: Vec<_> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://news.example.com/1", "https://news.example.com/2"],
            "公開日時の昇順で関連記事のみ"
        );
        assert_eq!(articles[1].description, "🔗 市街地でクマを目撃");
        assert!(articles.iter().all(|a| a.origin == ArticleOrigin::Feed));
        assert!(seen.contains("https://news.example.com/1"));
    }

    #[tokio::test]
    async fn test_duplicate_links_across_feeds_and_ledger() {
        let item = (
            "クマ目撃",
            "https://news.example.com/dup",
            "本文",
            "Fri, 31 Oct 2025 12:00:00 +0900",
        );
        let known = (
            "クマ既出",
            "https://news.example.com/known",
            "本文",
            "Fri, 31 Oct 2025 12:00:00 +0900",
        );
        let client = MockHttpClient::new()
            .with_response("https://a.example.com/rss", &rss_xml(&[item, known]))
            .with_response("https://b.example.com/rss", &rss_xml(&[item]));

        let mut seen: HashSet<String> = ["https://news.example.com/known".to_string()].into();
        let articles = collect_feed_articles(
            &client,
            &config(&["https://a.example.com/rss", "https://b.example.com/rss"]),
            &mut seen,
            now(),
        )
        .await;

        assert_eq!(articles.len(), 1, "同一実行内と台帳の重複は除外されるべき");
        assert_eq!(articles[0].url, "https://news.example.com/dup");
    }

    #[tokio::test]
    async fn test_failed_feed_is_skipped() {
        let client = MockHttpClient::new()
            .with_error("https://broken.example.com/rss", "接続タイムアウト")
            .with_response("https://invalid.example.com/rss", "<invalid>xml</broken>")
            .with_response(
                "https://ok.example.com/rss",
                &rss_xml(&[(
                    "クマ",
                    "https://news.example.com/ok",
                    "",
                    "Fri, 31 Oct 2025 12:00:00 +0900",
                )]),
            );

        let mut seen = HashSet::new();
        let articles = collect_feed_articles(
            &client,
            &config(&[
                "https://broken.example.com/rss",
                "https://invalid.example.com/rss",
                "https://ok.example.com/rss",
            ]),
            &mut seen,
            now(),
        )
        .await;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].description, "", "説明がなければ抜粋なし");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "あ".repeat(EXCERPT_MAX_CHARS + 20);
        let text = excerpt(&long);
        assert!(text.starts_with("🔗 "));
        assert!(text.ends_with('…'));
        assert_eq!(text.chars().count(), 2 + EXCERPT_MAX_CHARS + 1);
    }

    #[test]
    fn test_missing_pub_date_falls_back_to_now() {
        let item = rss::ItemBuilder::default()
            .title(Some("クマ".to_string()))
            .link(Some("https://news.example.com/n".to_string()))
            .build();
        let entry = FeedEntry::from_rss_item(&item);
        let article = entry_to_article(&entry, &config(&[]).rules, &HashSet::new(), now()).unwrap();
        assert_eq!(article.published_at, now());
    }

    #[tokio::test]
    async fn test_collect_atom_feed() {
        let atom = atom_xml(&[
            (
                "クマが出没",
                "https://atom.example.com/1",
                "通学路で目撃",
                "2025-10-31T03:00:00Z",
            ),
            (
                "クマノミ特集",
                "https://atom.example.com/2",
                "水族館",
                "2025-10-31T04:00:00Z",
            ),
        ]);
        let client = MockHttpClient::new().with_response("https://atom.example.com/feed", &atom);

        let mut seen = HashSet::new();
        let articles = collect_feed_articles(
            &client,
            &config(&["https://atom.example.com/feed"]),
            &mut seen,
            now(),
        )
        .await;

        assert_eq!(articles.len(), 1, "Atomの関連記事も収集されるべき");
        assert_eq!(articles[0].url, "https://atom.example.com/1");
        assert_eq!(articles[0].title, "クマが出没");
        assert_eq!(articles[0].description, "🔗 通学路で目撃");
        assert_eq!(
            articles[0].published_at,
            Utc.with_ymd_and_hms(2025, 10, 31, 3, 0, 0).unwrap(),
            "publishedが無ければupdatedを使う"
        );
    }

    #[test]
    fn test_unparsable_feed_is_error() {
        assert!(parse_feed_entries("https://x.example.com/rss", "<invalid>xml</broken>").is_err());
    }

    #[tokio::test]
    async fn test_load_rss_config() {
        let store = MemoryBlobStore::new().with_object(
            "rss_config.json",
            r#"{"include_keywords":["クマ"],"exclude_keywords":[],"rss_sources":["https://a.example.com/rss"]}"#,
        );
        let config = load_rss_config(&store, "rss_config.json").await.unwrap();
        assert_eq!(config.rss_sources, vec!["https://a.example.com/rss"]);
        assert!(config.rules.is_relevant("クマ"));

        let broken = MemoryBlobStore::new().with_object("rss_config.json", "{");
        assert!(matches!(
            load_rss_config(&broken, "rss_config.json").await,
            Err(StoreError::Json { .. })
        ));
    }
}
