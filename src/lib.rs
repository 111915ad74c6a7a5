//! クマ出没情報ボット
//!
//! 出没情報の一覧ページとRSSフィードから記事を集め、投稿済みURLの台帳で
//! 重複を除いてMastodonへ投稿する。日本時間の0時には前日分を都道府県別に
//! 集計したランキングを投稿し、ピン留めする。

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;
pub mod types;
