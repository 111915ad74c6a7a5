use crate::infra::api::posting::{PostingGateway, Status};
use crate::infra::parser::html_to_text;
use crate::types::GatewayResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// 投稿一覧取得の1ページあたりの件数
pub const STATUS_PAGE_SIZE: usize = 40;

/// どの都道府県にも該当しない地域
pub const UNCLASSIFIED: &str = "その他";

/// 都道府県（宣言順に部分一致を試す）
pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// 地域ごとの件数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefectureCount {
    pub region: String,
    pub count: usize,
}

/// 順位付きの集計行。`rank` は「その他」のみ`None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPrefecture {
    pub rank: Option<usize>,
    pub region: String,
    pub count: usize,
}

/// 投稿群の集計結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefectureTally {
    pub counts: HashMap<String, usize>,
    /// 地域マーカーを含んでいた投稿数
    pub total: usize,
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"📍\s*([^\n📍]+)").expect("地域マーカーの正規表現"))
}

/// 本文から地域マーカーに続く文字列を取り出す
pub fn extract_location(text: &str) -> Option<&str> {
    location_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// 最初に含まれている都道府県名。無ければ「その他」
pub fn classify_region(location: &str) -> &'static str {
    PREFECTURES
        .iter()
        .find(|prefecture| location.contains(*prefecture))
        .copied()
        .unwrap_or(UNCLASSIFIED)
}

/// プレーンテキストの本文群を地域ごとに数える
pub fn tally<'a, I>(texts: I) -> PrefectureTally
where
    I: IntoIterator<Item = &'a str>,
{
    let mut result = PrefectureTally::default();
    for text in texts {
        if let Some(location) = extract_location(text) {
            *result
                .counts
                .entry(classify_region(location).to_string())
                .or_insert(0) += 1;
            result.total += 1;
        }
    }
    result
}

/// 投稿（HTML本文）を地域ごとに数える
pub fn tally_statuses(statuses: &[Status]) -> PrefectureTally {
    let texts: Vec<String> = statuses.iter().map(|s| html_to_text(&s.content)).collect();
    tally(texts.iter().map(String::as_str))
}

/// 降順に並んだ件数列に競技順位（1224方式）を付ける
///
/// 同数は同順位、次の異なる件数は1始まりの位置が順位になる。
pub fn assign_competition_ranks(sorted_counts: &[usize]) -> Vec<usize> {
    let mut ranks = Vec::with_capacity(sorted_counts.len());
    for (idx, count) in sorted_counts.iter().enumerate() {
        let rank = match (idx, ranks.last()) {
            (0, _) | (_, None) => 1,
            (_, Some(&prev_rank)) if sorted_counts[idx - 1] == *count => prev_rank,
            _ => idx + 1,
        };
        ranks.push(rank);
    }
    ranks
}

/// 件数から順位表を作る
///
/// 件数の降順、同数は地域名の昇順。「その他」は順位計算から除き、
/// 件数があれば末尾に順位なしで付ける。
pub fn rank_prefectures(counts: &HashMap<String, usize>) -> Vec<RankedPrefecture> {
    let mut ranked: Vec<PrefectureCount> = counts
        .iter()
        .filter(|(region, count)| region.as_str() != UNCLASSIFIED && **count > 0)
        .map(|(region, count)| PrefectureCount {
            region: region.clone(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.region.cmp(&b.region)));

    let sorted_counts: Vec<usize> = ranked.iter().map(|p| p.count).collect();
    let mut rows: Vec<RankedPrefecture> = ranked
        .into_iter()
        .zip(assign_competition_ranks(&sorted_counts))
        .map(|(p, rank)| RankedPrefecture {
            rank: Some(rank),
            region: p.region,
            count: p.count,
        })
        .collect();

    if let Some(&count) = counts.get(UNCLASSIFIED).filter(|count| **count > 0) {
        rows.push(RankedPrefecture {
            rank: None,
            region: UNCLASSIFIED.to_string(),
            count,
        });
    }
    rows
}

/// 自アカウントの投稿のうち `cutoff` より後に作成されたものを新しい順に集める
///
/// 各ページ最古の投稿IDを次のカーソルにし、`cutoff` 以前の投稿か空ページで止める。
pub async fn fetch_window<G: PostingGateway + ?Sized>(
    gateway: &G,
    account_id: &str,
    cutoff: DateTime<Utc>,
) -> GatewayResult<Vec<Status>> {
    let mut window = Vec::new();
    let mut max_id: Option<String> = None;

    loop {
        let page = gateway
            .account_statuses(account_id, max_id.as_deref(), STATUS_PAGE_SIZE)
            .await?;
        let Some(oldest) = page.last() else {
            break;
        };
        max_id = Some(oldest.id.clone());
        debug!(count = page.len(), "投稿一覧のページを取得");

        for status in page {
            if status.created_at <= cutoff {
                info!(count = window.len(), "集計対象の投稿を取得");
                return Ok(window);
            }
            window.push(status);
        }
    }

    info!(count = window.len(), "集計対象の投稿を取得");
    Ok(window)
}
