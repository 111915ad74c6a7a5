use crate::{
    config::AppConfig,
    domain::{
        article::{sort_by_published, ArticleRecord},
        datetime::jst,
        feed::{collect_feed_articles, load_rss_config},
        ledger::{UrlLedger, RETENTION_DAYS},
        pin::rotate_pins,
        post::{format_article, format_summary},
        prefecture::{fetch_window, rank_prefectures, tally_statuses},
        scrape::ScrapedSource,
    },
    infra::{
        api::{
            http::HttpClient,
            posting::{PostingGateway, Visibility},
        },
        storage::BlobStore,
    },
    types::{GatewayResult, PublishError, RunError, RunReport, RunResult},
};
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// 連続する投稿の間隔
pub const POST_DELAY: Duration = Duration::from_millis(200);

/// 集計対象の期間（時間）
const SUMMARY_WINDOW_HOURS: i64 = 24;

/// 1回の実行の設定
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub ledger_key: String,
    pub rss_config_key: Option<String>,
    pub visibility: Visibility,
    pub source: ScrapedSource,
    /// 時刻に関係なく日次集計を行う
    pub force_summary: bool,
    pub post_delay: Duration,
}

impl RunOptions {
    pub fn from_config(config: &AppConfig, force_summary: bool) -> Self {
        Self {
            ledger_key: config.store.ledger_key.clone(),
            rss_config_key: config.store.rss_config_key.clone(),
            visibility: config.visibility(),
            source: ScrapedSource::default(),
            force_summary,
            post_delay: POST_DELAY,
        }
    }
}

/// 日本時間の0時0分かどうか
pub fn is_summary_window(now: DateTime<Utc>) -> bool {
    let now_jst = now.with_timezone(&jst());
    now_jst.hour() == 0 && now_jst.minute() == 0
}

/// ボットのメイン実行関数（依存性を注入）
///
/// 1. 集計時刻（または強制指定）なら前日分の都道府県別集計を投稿してピン留め
/// 2. 台帳を読み込み、保持期間外のエントリを除外
/// 3. 一覧ページとRSSフィードから未投稿の記事を収集
/// 4. 公開日時の古い順に投稿し、成功したものだけを台帳に追加して保存
pub async fn execute_bot_workflow<H, G, S>(
    http: &H,
    gateway: &G,
    store: &S,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> RunResult<RunReport>
where
    H: HttpClient + ?Sized,
    G: PostingGateway + ?Sized,
    S: BlobStore + ?Sized,
{
    info!("=== クマ出没情報ボット開始 ===");
    let mut report = RunReport::empty();

    if options.force_summary || is_summary_window(now) {
        run_prefecture_summary(gateway, options.visibility, now)
            .await
            .map_err(RunError::Summary)?;
        report.summary_posted = true;
    }

    let ledger = UrlLedger::load(store, &options.ledger_key)
        .await?
        .prune(now, RETENTION_DAYS);
    let mut seen = ledger.membership_set();

    // 段階1: 一覧ページ
    let scraped = options.source.collect_articles(http, now).await?;
    report.fetched += scraped.len();
    let mut articles: Vec<ArticleRecord> = scraped
        .into_iter()
        .filter(|article| seen.insert(article.url.clone()))
        .collect();
    info!(count = articles.len(), "一覧ページの新規記事");

    // 段階2: RSSフィード
    if let Some(key) = &options.rss_config_key {
        let rss_config = load_rss_config(store, key).await?;
        let feed_articles = collect_feed_articles(http, &rss_config, &mut seen, now).await;
        report.fetched += feed_articles.len();
        articles.extend(feed_articles);
    }

    sort_by_published(&mut articles);
    report.new = articles.len();

    // 段階3: 投稿
    let (posted, failed) =
        publish_articles(gateway, articles, options.visibility, options.post_delay).await;
    report.published = posted.len();
    report.failed = failed;

    let ledger = ledger
        .append_and_save(store, &options.ledger_key, posted)
        .await?;
    report.ledger_size = ledger.len();

    info!("{}", report);
    info!("=== クマ出没情報ボット完了 ===");
    Ok(report)
}

/// 記事を順に投稿し、成功した記事（投稿日時付き）と失敗件数を返す
///
/// 投稿の間には `delay` を空ける（最後の投稿の後は待たない）。
pub async fn publish_articles<G: PostingGateway + ?Sized>(
    gateway: &G,
    articles: Vec<ArticleRecord>,
    visibility: Visibility,
    delay: Duration,
) -> (Vec<ArticleRecord>, usize) {
    let mut posted = Vec::with_capacity(articles.len());
    let mut failed = 0;

    for (idx, article) in articles.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let text = format_article(&article);
        match gateway.publish(&text, visibility).await {
            Ok(status_id) => {
                info!(status_id = %status_id, url = %article.url, "投稿しました");
                posted.push(article.mark_posted(Utc::now()));
            }
            Err(source) => {
                let e = PublishError::new(&article.title, source);
                warn!(error = %e, url = %article.url, "投稿に失敗。次回実行で再試行");
                failed += 1;
            }
        }
    }

    (posted, failed)
}

/// 直近24時間の自分の投稿を集計し、ランキングを投稿してピン留めする
async fn run_prefecture_summary<G: PostingGateway + ?Sized>(
    gateway: &G,
    visibility: Visibility,
    now: DateTime<Utc>,
) -> GatewayResult<()> {
    info!("--- 都道府県別集計開始 ---");
    let account = gateway.current_account().await?;
    let cutoff = now - ChronoDuration::hours(SUMMARY_WINDOW_HOURS);

    let statuses = fetch_window(gateway, &account.id, cutoff).await?;
    let tally = tally_statuses(&statuses);
    let rows = rank_prefectures(&tally.counts);
    let day = cutoff.with_timezone(&jst()).date_naive();

    let text = format_summary(day, tally.total, &rows);
    let status_id = gateway.publish(&text, visibility).await?;
    info!(
        status_id = %status_id,
        total = tally.total,
        regions = rows.len(),
        "集計を投稿しました"
    );

    rotate_pins(gateway, &account.id, &status_id).await;
    info!("--- 都道府県別集計完了 ---");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::article::ArticleOrigin;
    use crate::domain::feed::fixtures::rss_xml;
    use crate::domain::scrape::fixtures::{listing_item, listing_page};
    use crate::infra::api::http::MockHttpClient;
    use crate::infra::api::posting::{GatewayCall, MockPostingGateway, Status};
    use crate::infra::storage::MemoryBlobStore;
    use crate::types::StoreError;
    use chrono::TimeZone;

    const LEDGER_KEY: &str = "posted_urls.json";
    const RSS_KEY: &str = "rss_config.json";
    const BASE: &str = "https://kuma.example.com/news";
    const FEED: &str = "https://feed.example.com/rss";

    fn options(rss: bool) -> RunOptions {
        RunOptions {
            ledger_key: LEDGER_KEY.to_string(),
            rss_config_key: rss.then(|| RSS_KEY.to_string()),
            visibility: Visibility::Public,
            source: ScrapedSource::new(BASE, 3),
            force_summary: false,
            post_delay: Duration::ZERO,
        }
    }

    /// 日本時間 2025/11/01 09:30
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 0, 30, 0).unwrap()
    }

    fn http_client() -> MockHttpClient {
        let page = listing_page(&[
            listing_item("https://kuma.example.com/a/2", "クマ目撃2", "秋田県", "10/31(金)", "18:00"),
            listing_item("https://kuma.example.com/a/1", "クマ目撃1", "岩手県", "10/31(金)", "09:00"),
        ]);
        let feed = rss_xml(&[(
            "クマが市街地に",
            "https://feed.example.com/n/1",
            "本文",
            "Fri, 31 Oct 2025 12:00:00 +0900",
        )]);
        MockHttpClient::new()
            .with_response(&format!("{}?page=1", BASE), &page)
            .with_response(FEED, &feed)
    }

    fn store() -> MemoryBlobStore {
        MemoryBlobStore::new()
            .with_object(LEDGER_KEY, "[]")
            .with_object(
                RSS_KEY,
                &format!(r#"{{"include_keywords":["クマ"],"rss_sources":["{}"]}}"#, FEED),
            )
    }

    #[test]
    fn test_is_summary_window() {
        // JST 00:00 = UTC 15:00
        assert!(is_summary_window(Utc.with_ymd_and_hms(2025, 10, 31, 15, 0, 0).unwrap()));
        assert!(is_summary_window(Utc.with_ymd_and_hms(2025, 10, 31, 15, 0, 59).unwrap()));
        assert!(!is_summary_window(Utc.with_ymd_and_hms(2025, 10, 31, 15, 1, 0).unwrap()));
        assert!(!is_summary_window(Utc.with_ymd_and_hms(2025, 10, 31, 0, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_workflow_publishes_in_chronological_order() {
        let http = http_client();
        let gateway = MockPostingGateway::new();
        let store = store();

        let report = execute_bot_workflow(&http, &gateway, &store, &options(true), now())
            .await
            .unwrap();

        let texts = gateway.published_texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("クマ目撃1"), "公開日時の古い順");
        assert!(texts[1].starts_with("📰 クマが市街地に"));
        assert!(texts[2].contains("クマ目撃2"));
        assert_eq!(report.new, 3);
        assert_eq!(report.published, 3);
        assert_eq!(report.ledger_size, 3);
        assert!(!report.summary_posted);

        let ledger = UrlLedger::load(&store, LEDGER_KEY).await.unwrap();
        assert!(ledger.entries().iter().all(|e| !e.is_pending()));
    }

    #[tokio::test]
    async fn test_second_run_publishes_nothing() {
        let http = http_client();
        let gateway = MockPostingGateway::new();
        let store = store();

        execute_bot_workflow(&http, &gateway, &store, &options(true), now())
            .await
            .unwrap();
        let second = execute_bot_workflow(&http, &gateway, &store, &options(true), now())
            .await
            .unwrap();

        assert_eq!(second.published, 0, "2回目の実行では何も投稿しない");
        assert_eq!(gateway.published_texts().len(), 3);
        assert_eq!(second.ledger_size, 3);
    }

    #[tokio::test]
    async fn test_failed_publish_is_retried_next_run() {
        let http = http_client();
        let store = store();

        let failing = MockPostingGateway::new().failing_publish_containing("クマ目撃2");
        let first = execute_bot_workflow(&http, &failing, &store, &options(false), now())
            .await
            .unwrap();
        assert_eq!(first.published, 1);
        assert_eq!(first.failed, 1);
        assert_eq!(first.ledger_size, 1, "失敗した記事は台帳に追加しない");

        let healthy = MockPostingGateway::new();
        let second = execute_bot_workflow(&http, &healthy, &store, &options(false), now())
            .await
            .unwrap();
        assert_eq!(healthy.published_texts().len(), 1);
        assert!(healthy.published_texts()[0].contains("クマ目撃2"));
        assert_eq!(second.ledger_size, 2);
    }

    #[tokio::test]
    async fn test_scrape_first_page_failure_is_fatal() {
        let http = MockHttpClient::new();
        let gateway = MockPostingGateway::new();
        let store = store();

        let result = execute_bot_workflow(&http, &gateway, &store, &options(false), now()).await;
        assert!(matches!(result, Err(RunError::Fetch(_))));
        assert!(gateway.calls().is_empty());
        assert_eq!(store.put_count(), 0, "失敗時は台帳を保存しない");
    }

    #[tokio::test]
    async fn test_missing_ledger_is_fatal() {
        let http = http_client();
        let gateway = MockPostingGateway::new();
        let store = MemoryBlobStore::new();

        let result = execute_bot_workflow(&http, &gateway, &store, &options(false), now()).await;
        assert!(matches!(result, Err(RunError::Store(StoreError::Read { .. }))));
    }

    #[tokio::test]
    async fn test_forced_summary_posts_and_pins() {
        let http = http_client();
        let store = store();
        let status = |id: &str, minutes: i64, content: &str| Status {
            id: id.to_string(),
            created_at: now() - ChronoDuration::minutes(minutes),
            content: content.to_string(),
        };
        let gateway = MockPostingGateway::new().with_statuses(vec![
            status("5", 10, "<p>🐻 a</p><p>📍 岩手県 岩手日報</p>"),
            status("4", 20, "<p>🐻 b</p><p>📍 秋田県 秋田魁</p>"),
            status("3", 30, "<p>🐻 c</p><p>📍 岩手県 盛岡</p>"),
            status("2", 40, "<p>📰 ニュース</p>"),
            status("1", 60 * 25, "<p>🐻 old</p><p>📍 北海道</p>"),
        ]);

        let mut options = options(false);
        options.force_summary = true;
        let report = execute_bot_workflow(&http, &gateway, &store, &options, now())
            .await
            .unwrap();
        assert!(report.summary_posted);

        let calls = gateway.calls();
        let GatewayCall::Publish(summary) = &calls[0] else {
            panic!("最初の操作は集計の投稿であるべき: {:?}", calls);
        };
        assert!(summary.starts_with("🐻 10月31日のクマ出没情報集計（全3件）"));
        assert!(summary.contains("1. 岩手県：2件\n2. 秋田県：1件"));
        assert!(!summary.contains("北海道"), "24時間より前の投稿は数えない");
        assert_eq!(calls[1], GatewayCall::Pin("1001".to_string()));
    }

    #[tokio::test]
    async fn test_publish_articles_counts_failures() {
        let gateway = MockPostingGateway::new().failing_publish_containing("NG");
        let at = Utc.with_ymd_and_hms(2025, 10, 31, 0, 0, 0).unwrap();
        let articles = vec![
            ArticleRecord::pending("https://e.com/1", "OK", "岩手県", at, ArticleOrigin::Scraped),
            ArticleRecord::pending("https://e.com/2", "NG", "岩手県", at, ArticleOrigin::Scraped),
        ];

        let (posted, failed) =
            publish_articles(&gateway, articles, Visibility::Public, Duration::from_millis(1)).await;
        assert_eq!(posted.len(), 1);
        assert_eq!(failed, 1);
        assert!(posted[0].posted_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_articles_waits_only_between_posts() {
        let at = Utc.with_ymd_and_hms(2025, 10, 31, 0, 0, 0).unwrap();
        let articles = |n: usize| -> Vec<ArticleRecord> {
            (0..n)
                .map(|i| {
                    ArticleRecord::pending(
                        format!("https://e.com/{}", i),
                        "クマ目撃",
                        "岩手県",
                        at,
                        ArticleOrigin::Scraped,
                    )
                })
                .collect()
        };

        let gateway = MockPostingGateway::new();
        let started = tokio::time::Instant::now();
        let (posted, _) = publish_articles(&gateway, articles(3), Visibility::Public, POST_DELAY).await;
        assert_eq!(posted.len(), 3);
        assert_eq!(
            started.elapsed(),
            POST_DELAY * 2,
            "投稿の間にだけ待ち、最後の投稿の後は待たない"
        );

        let started = tokio::time::Instant::now();
        publish_articles(&gateway, articles(1), Visibility::Public, POST_DELAY).await;
        assert_eq!(started.elapsed(), Duration::ZERO, "1件なら待たない");
    }
}
