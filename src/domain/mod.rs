//! ドメイン層
//!
//! 取得（一覧ページ・フィード）、重複判定の台帳、投稿本文の整形、
//! 都道府県別の集計、ピン留めの入れ替えを扱う。

pub mod article;
pub mod datetime;
pub mod feed;
pub mod ledger;
pub mod pin;
pub mod post;
pub mod prefecture;
pub mod relevance;
pub mod scrape;
