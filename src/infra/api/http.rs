use crate::types::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// 取得元へのHTTPタイムアウト（秒）
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// HTTPクライアントの抽象化トレイト
///
/// このトレイトは、実際のHTTP通信とモック実装の両方を
/// 統一的に扱えるようにするためのインターフェースです。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 指定されたURLからテキストを取得する
    ///
    /// 200以外のステータスは`FetchError::Status`として返す。
    ///
    /// # Arguments
    /// * `url` - 取得対象のURL
    /// * `timeout_secs` - タイムアウト時間（秒）
    async fn get_text(&self, url: &str, timeout_secs: u64) -> FetchResult<String>;
}

/// `reqwest` を使用した本番用のHTTPクライアント実装
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// 新しいHTTPクライアントを作成
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_text(&self, url: &str, timeout_secs: u64) -> FetchResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| FetchError::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::request(url, e))
    }
}

/// モックが返す応答
#[derive(Debug, Clone)]
enum MockResponse {
    Body(String),
    Status(u16),
    Error(String),
}

/// テスト用のモックHTTPクライアント
///
/// URLごとに定義済みのレスポンス・ステータス・エラーを返す。
/// 未登録のURLには既定の応答（未設定なら404）を返す。
/// 呼び出されたURLは順に記録される。
pub struct MockHttpClient {
    routes: HashMap<String, MockResponse>,
    fallback: MockResponse,
    requested: Mutex<Vec<String>>,
}

impl MockHttpClient {
    /// 全URLに404を返すモッククライアントを作成
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: MockResponse::Status(404),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// 全URLに同じ成功レスポンスを返すモッククライアントを作成
    pub fn new_success(mock_response: &str) -> Self {
        Self {
            fallback: MockResponse::Body(mock_response.to_string()),
            ..Self::new()
        }
    }

    /// 全URLでエラーを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            fallback: MockResponse::Error(error_message.to_string()),
            ..Self::new()
        }
    }

    /// 指定URLの成功レスポンスを登録
    pub fn with_response(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), MockResponse::Body(body.to_string()));
        self
    }

    /// 指定URLのステータスを登録
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// 指定URLの通信エラーを登録
    pub fn with_error(mut self, url: &str, error_message: &str) -> Self {
        self.routes
            .insert(url.to_string(), MockResponse::Error(error_message.to_string()));
        self
    }

    /// これまでに要求されたURL
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get_text(&self, url: &str, _timeout_secs: u64) -> FetchResult<String> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }

        match self.routes.get(url).unwrap_or(&self.fallback) {
            MockResponse::Body(body) => Ok(body.clone()),
            MockResponse::Status(status) => Err(FetchError::status(url, *status)),
            MockResponse::Error(message) => {
                Err(FetchError::other(url, format!("モックHTTPエラー: {}", message)))
            }
        }
    }
}
