use crate::types::{FetchError, FetchResult};
use chrono::{DateTime, Utc};
use feed_rs::model::Feed;
use regex::Regex;
use rss::Channel;
use scraper::Html;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

/// 文字列を日付型に変換するヘルパー関数
///
/// `dateparser`クレートを利用して、RSSの`pubDate`などの様々な形式の
/// 日付文字列を解析し、`DateTime<Utc>`型に変換する。
///
/// # サポート形式の例
/// - "2025-01-15T10:00:00Z"
/// - "Sun, 10 Aug 2025 12:00:00 +0000"
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    dateparser::parse(date_str.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// XML文字列からRSSチャンネルを解析する
pub fn parse_channel_from_xml_str(url: &str, xml: &str) -> FetchResult<Channel> {
    Channel::read_from(xml.as_bytes()).map_err(|e| FetchError::feed(url, e))
}

/// XML文字列をAtomフィードとして解析する
pub fn parse_atom_from_xml_str(url: &str, xml: &str) -> FetchResult<Feed> {
    feed_rs::parser::parse(xml.as_bytes()).map_err(|e| FetchError::atom(url, e))
}

fn line_break_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").expect("改行タグの正規表現")
    })
}

/// HTMLをプレーンテキストに変換する
///
/// `<br>`や段落の終わりは改行にし、タグを除去して実体参照をデコードする。
pub fn html_to_text(html: &str) -> String {
    let with_breaks = line_break_pattern().replace_all(html, "\n");
    let fragment = Html::parse_fragment(&with_breaks);
    fragment.root_element().text().collect::<String>()
}

/// 空白（改行含む）の連続を1つの半角スペースにまとめる
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 見た目の文字数（書記素クラスタ単位）
pub fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// 見た目の文字数で切り詰め、切り詰めた場合は末尾に`…`を付ける
///
/// 結合文字や絵文字の途中では切らない。
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if grapheme_count(text) <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.graphemes(true).take(max_chars).collect();
    truncated.push('…');
    truncated
}
