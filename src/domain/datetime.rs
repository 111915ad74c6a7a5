use crate::types::ParseError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc};

const JST_OFFSET_SECS: i32 = 9 * 60 * 60;
const DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// 日本標準時（UTC+9）
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9は有効なオフセット")
}

/// 年を含まない日付・時刻の断片を日本時間の絶対時刻に変換する
///
/// - `date_text`: `10/31(金)` のような `月/日` 形式。括弧以降の曜日は無視する
/// - `time_text`: `15:04` のような `時:分` 形式
///
/// 現在の年で組み立てた日時が `now` より未来になる場合は、
/// 取得元が未来の出来事を報じることはないため前年として解釈し直す。
pub fn normalize_datetime(
    date_text: &str,
    time_text: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<FixedOffset>, ParseError> {
    let tz = jst();
    let now_jst = now.with_timezone(&tz);
    let date = strip_weekday(date_text.trim());
    let time = time_text.trim();

    let candidate = resolve_in_year(now_jst.year(), date, time, &tz)
        .ok_or_else(|| ParseError::date_time(date_text, time_text))?;

    if candidate > now_jst {
        return resolve_in_year(now_jst.year() - 1, date, time, &tz)
            .ok_or_else(|| ParseError::date_time(date_text, time_text));
    }

    Ok(candidate)
}

/// `10/31(金)` → `10/31`
fn strip_weekday(date_text: &str) -> &str {
    match date_text.find('(') {
        Some(idx) if idx > 0 => date_text[..idx].trim_end(),
        _ => date_text,
    }
}

fn resolve_in_year(
    year: i32,
    date: &str,
    time: &str,
    tz: &FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    let text = format!("{}/{} {}", year, date, time);
    let naive = NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst_instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        jst()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_same_year_when_in_past() {
        let now = jst_instant(2025, 11, 1, 9, 0);
        let parsed = normalize_datetime("10/31(金)", "15:04", now).unwrap();
        assert_eq!(parsed, jst().with_ymd_and_hms(2025, 10, 31, 15, 4, 0).unwrap());
        assert_eq!(parsed.offset().local_minus_utc(), JST_OFFSET_SECS);
    }

    #[test]
    fn test_previous_year_when_candidate_in_future() {
        let now = jst_instant(2026, 1, 2, 9, 0);
        let parsed = normalize_datetime("10/31(金)", "15:04", now).unwrap();
        assert_eq!(parsed, jst().with_ymd_and_hms(2025, 10, 31, 15, 4, 0).unwrap());
    }

    #[test]
    fn test_same_minute_is_not_future() {
        let now = jst_instant(2025, 10, 31, 15, 4);
        let parsed = normalize_datetime("10/31", "15:04", now).unwrap();
        assert_eq!(parsed.year(), 2025);
    }

    #[test]
    fn test_single_digit_fields() {
        let now = jst_instant(2025, 6, 1, 0, 0);
        let parsed = normalize_datetime("5/3(土)", "7:05", now).unwrap();
        assert_eq!(parsed, jst().with_ymd_and_hms(2025, 5, 3, 7, 5, 0).unwrap());
    }

    #[test]
    fn test_utc_midnight_uses_jst_year() {
        // UTC では 2025/12/31 だが JST では 2026/1/1
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 16, 0, 0).unwrap();
        let parsed = normalize_datetime("1/1(木)", "0:30", now).unwrap();
        assert_eq!(parsed.year(), 2026);
    }

    #[test]
    fn test_invalid_fragments() {
        let now = jst_instant(2025, 11, 1, 9, 0);
        assert!(normalize_datetime("", "15:04", now).is_err());
        assert!(normalize_datetime("10/31", "", now).is_err());
        assert!(normalize_datetime("昨日", "15:04", now).is_err());
        assert!(normalize_datetime("13/01", "15:04", now).is_err());

        let err = normalize_datetime("10/31", "25:00", now).unwrap_err();
        assert_eq!(err, ParseError::date_time("10/31", "25:00"));
    }
}
