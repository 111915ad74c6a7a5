use crate::domain::article::{ArticleOrigin, ArticleRecord};
use crate::domain::prefecture::RankedPrefecture;
use crate::infra::parser::grapheme_count;
use chrono::{Datelike, NaiveDate};

/// 投稿本文の最大文字数
pub const MAX_POST_CHARS: usize = 500;

const SIGHTING_HASHTAG: &str = "#クマ出没情報";
const NEWS_HASHTAG: &str = "#クマ関連ニュース";
const EMPTY_LISTING: &str = "該当なし";
const SUMMARY_DISCLAIMER: &str =
    "※報道された出没情報の集計です。実際の出没件数とは異なる場合があります。";

/// 取得元に応じたテンプレートで記事の投稿本文を作る
pub fn format_article(article: &ArticleRecord) -> String {
    match article.origin {
        ArticleOrigin::Scraped => format_sighting(article),
        ArticleOrigin::Feed => format_feed_article(article),
    }
}

/// 出没情報一覧から取得した記事
pub fn format_sighting(article: &ArticleRecord) -> String {
    format!(
        "🐻 {}\n\n🔗 {}\n\n📍 {}\n\n{}",
        article.title, article.url, article.description, SIGHTING_HASHTAG
    )
}

/// フィードから取得した記事
///
/// 上限を超える場合は抜粋ブロックを丸ごと外す。
pub fn format_feed_article(article: &ArticleRecord) -> String {
    let with_excerpt = render_feed_article(article, Some(&article.description));
    if char_count(&with_excerpt) <= MAX_POST_CHARS {
        return with_excerpt;
    }
    render_feed_article(article, None)
}

fn render_feed_article(article: &ArticleRecord, excerpt: Option<&str>) -> String {
    let mut text = format!("📰 {}\n\n🔗 {}", article.title, article.url);
    if let Some(excerpt) = excerpt.filter(|e| !e.is_empty()) {
        text.push_str("\n\n");
        text.push_str(excerpt);
    }
    text.push_str("\n\n");
    text.push_str(NEWS_HASHTAG);
    text
}

/// 日次集計の投稿本文
pub fn format_summary(day: NaiveDate, total: usize, rows: &[RankedPrefecture]) -> String {
    let listing = if rows.is_empty() {
        EMPTY_LISTING.to_string()
    } else {
        rows.iter().map(format_ranked_line).collect::<Vec<_>>().join("\n")
    };

    format!(
        "🐻 {}月{}日のクマ出没情報集計（全{}件）\n\n📊 都道府県別ランキング:\n{}\n\n{}\n\n{}",
        day.month(),
        day.day(),
        total,
        listing,
        SUMMARY_DISCLAIMER,
        SIGHTING_HASHTAG
    )
}

fn format_ranked_line(row: &RankedPrefecture) -> String {
    match row.rank {
        Some(rank) => format!("{}. {}：{}件", rank, row.region, row.count),
        None => format!("・{}：{}件", row.region, row.count),
    }
}

/// ユーザーが認識する文字数（書記素クラスタ単位）
pub fn char_count(text: &str) -> usize {
    grapheme_count(text)
}
