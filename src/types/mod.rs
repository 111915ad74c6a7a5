//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - エラー型: 設定・ストア・取得・投稿・ピン留めごとのエラー
//! - 実行結果型: 1回の実行の集計

pub mod error;
pub mod result;

// 便利な再エクスポート
pub use error::{
    ConfigError, ConfigResult, FetchError, FetchResult, GatewayError, GatewayResult, ParseError,
    PinError, PublishError, RunError, RunResult, StoreError, StoreResult,
};
pub use result::RunReport;
