//! インフラ層
//!
//! 外部との境界（HTTP取得、投稿サービス、ブロブストア）と、
//! ドメインに依存しない解析・読み込みヘルパーをまとめる。

pub mod api;
pub mod loader;
pub mod parser;
pub mod storage;
