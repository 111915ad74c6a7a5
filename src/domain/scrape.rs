//! 出没情報一覧ページのスクレイピング
//!
//! 固定の一覧ページ（`?page=n`）を先頭から順に取得し、広告枠を除いた
//! 各記事を `ArticleRecord` に正規化する。

use crate::domain::article::{ArticleOrigin, ArticleRecord};
use crate::domain::datetime::normalize_datetime;
use crate::infra::api::http::{HttpClient, HTTP_TIMEOUT_SECS};
use crate::types::{FetchError, FetchResult};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

/// クマ出没ニュースのキーワード一覧ページ
pub const KUMA_NEWS_URL: &str = "https://topics.smt.docomo.ne.jp/latestnews/keywords/592c8cd81446273da9280cdf06875ec2347a5b3bd970bca305d5cb869e7c4161";

/// 取得する最大ページ数
pub const MAX_PAGES: u32 = 3;

/// スクレイピング対象の設定
#[derive(Debug, Clone)]
pub struct ScrapedSource {
    pub base_url: String,
    pub max_pages: u32,
}

impl Default for ScrapedSource {
    fn default() -> Self {
        Self {
            base_url: KUMA_NEWS_URL.to_string(),
            max_pages: MAX_PAGES,
        }
    }
}

impl ScrapedSource {
    pub fn new(base_url: &str, max_pages: u32) -> Self {
        Self {
            base_url: base_url.to_string(),
            max_pages,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}?page={}", self.base_url, page)
    }

    /// 一覧ページを順に取得して記事を抽出する
    ///
    /// 1ページ目の取得失敗は実行全体のエラー。2ページ目以降は失敗または
    /// 記事0件の時点で打ち切り、それまでの結果を返す。
    pub async fn collect_articles<H: HttpClient + ?Sized>(
        &self,
        client: &H,
        now: DateTime<Utc>,
    ) -> FetchResult<Vec<ArticleRecord>> {
        let mut all_articles = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.page_url(page);
            let html = match client.get_text(&url, HTTP_TIMEOUT_SECS).await {
                Ok(html) => html,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "ページの取得に失敗したため打ち切ります");
                    break;
                }
            };

            let articles = parse_listing_page(&html, page, now)?;
            if articles.is_empty() && page > 1 {
                info!(page, "記事が見つからないため打ち切ります");
                break;
            }

            debug!(page, count = articles.len(), "ページから記事を抽出");
            all_articles.extend(articles);
        }

        info!(count = all_articles.len(), "スクレイピング完了");
        Ok(all_articles)
    }
}

/// 一覧ページで使うセレクタ群
struct ListingSelectors {
    item: Selector,
    advertisement: Selector,
    unit: Selector,
    supplement: Selector,
    date: Selector,
    time: Selector,
    title: Selector,
    source: Selector,
    region: Selector,
    anchor: Selector,
}

fn selector(css: &str) -> FetchResult<Selector> {
    Selector::parse(css).map_err(|e| FetchError::selector(css, format!("{:?}", e)))
}

impl ListingSelectors {
    fn new() -> FetchResult<Self> {
        Ok(Self {
            item: selector("li.h-bm02")?,
            advertisement: selector("div[data-allox-placement]")?,
            unit: selector("div.thumbsListUnit")?,
            supplement: selector("p.newsListSupplement")?,
            date: selector("span.newsDate")?,
            time: selector("span.newsTime")?,
            title: selector("h3.thumbsListTitle")?,
            source: selector("span.newsTenter")?,
            region: selector("ul.topics-keywords li a")?,
            anchor: selector("a[href]")?,
        })
    }
}

/// 選択された全要素のテキストを連結して前後の空白を除く
fn select_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// 一覧ページのHTMLから記事を抽出する
///
/// 広告枠は除外し、本体・日時・リンクのいずれかが欠けた記事は警告を出して捨てる。
pub fn parse_listing_page(
    html: &str,
    page: u32,
    now: DateTime<Utc>,
) -> FetchResult<Vec<ArticleRecord>> {
    let selectors = ListingSelectors::new()?;
    let document = Html::parse_document(html);

    let articles = document
        .select(&selectors.item)
        .filter(|item| item.select(&selectors.advertisement).next().is_none())
        .filter_map(|item| extract_article(item, &selectors, page, now))
        .collect();

    Ok(articles)
}

fn extract_article(
    item: ElementRef<'_>,
    selectors: &ListingSelectors,
    page: u32,
    now: DateTime<Utc>,
) -> Option<ArticleRecord> {
    let Some(unit) = item.select(&selectors.unit).next() else {
        warn!(page, "記事の本体が見つからない項目をスキップ");
        return None;
    };
    let supplement = unit.select(&selectors.supplement).next();

    let (date_text, time_text, source) = match supplement {
        Some(supplement) => (
            select_text(supplement, &selectors.date),
            select_text(supplement, &selectors.time),
            select_text(supplement, &selectors.source),
        ),
        None => Default::default(),
    };

    let published_at = match normalize_datetime(&date_text, &time_text, now) {
        Ok(published_at) => published_at,
        Err(e) => {
            warn!(page, error = %e, "日時を解析できない記事をスキップ");
            return None;
        }
    };

    let title_element = unit.select(&selectors.title).next();
    let title = title_element
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let href = title_element
        .and_then(closest_anchor_href)
        .or_else(|| {
            unit.select(&selectors.anchor)
                .next()
                .and_then(|a| a.value().attr("href"))
        })
        .map(str::to_string);

    let Some(url) = href.filter(|href| !href.is_empty()) else {
        warn!(page, title = %title, "リンクのない記事をスキップ");
        return None;
    };

    let region = select_text(item, &selectors.region);

    Some(ArticleRecord::pending(
        url,
        title,
        format!("{} {} {} {}", region, source, date_text, time_text),
        published_at.with_timezone(&Utc),
        ArticleOrigin::Scraped,
    ))
}

/// 要素を囲む最も近い`<a>`のhref
fn closest_anchor_href<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "a")
        .and_then(|anchor| anchor.value().attr("href"))
}
