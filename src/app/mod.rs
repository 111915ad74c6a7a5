//! アプリケーション層
//!
//! 1回の実行（集計→収集→投稿→台帳保存）の手順を組み立てる。

pub mod workflow;
