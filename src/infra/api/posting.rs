use crate::types::{GatewayError, GatewayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// 投稿サービスへのHTTPタイムアウト（秒）
const GATEWAY_TIMEOUT_SECS: u64 = 30;

/// 投稿の公開範囲
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            "direct" => Ok(Visibility::Direct),
            other => Err(format!("不明な公開範囲: {}", other)),
        }
    }
}

/// 投稿（ステータス）。`content` はサービス側でHTML化された本文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
}

/// 自アカウント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// 投稿サービスの抽象化トレイト
///
/// 投稿・自アカウント取得・投稿一覧（新しい順）・ピン留め操作を提供する。
/// 本番ではMastodon API、テストではモック、ドライランでは
/// 書き込み系をログ出力に置き換えたデコレータを注入する。
#[async_trait]
pub trait PostingGateway: Send + Sync {
    /// 本文を投稿して投稿IDを返す
    async fn publish(&self, text: &str, visibility: Visibility) -> GatewayResult<String>;

    /// 認証中の自アカウントを取得
    async fn current_account(&self) -> GatewayResult<Account>;

    /// アカウントの投稿を新しい順に取得する。`max_id` は前ページ最古の投稿ID
    async fn account_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> GatewayResult<Vec<Status>>;

    /// ピン留め中の投稿を取得
    async fn pinned_statuses(&self, account_id: &str) -> GatewayResult<Vec<Status>>;

    async fn pin(&self, status_id: &str) -> GatewayResult<()>;

    async fn unpin(&self, status_id: &str) -> GatewayResult<()>;
}

/// Mastodon REST APIを使用した本番用の実装
pub struct MastodonGateway {
    client: Client,
    server: String,
    access_token: String,
}

impl MastodonGateway {
    pub fn new(server: &str, access_token: &str) -> Self {
        Self {
            client: Client::new(),
            server: server.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
    }

    /// ステータスを確認し、失敗時は本文をエラーに含める
    async fn check(endpoint: &str, response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::status(endpoint, status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> GatewayResult<T> {
        let endpoint = self.endpoint(path);
        let response = self
            .authorized(self.client.get(&endpoint).query(query))
            .send()
            .await
            .map_err(|e| GatewayError::request(&endpoint, e))?;
        let response = Self::check(&endpoint, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::decode(&endpoint, e))
    }

    async fn post_empty(&self, path: &str) -> GatewayResult<()> {
        let endpoint = self.endpoint(path);
        let response = self
            .authorized(self.client.post(&endpoint))
            .send()
            .await
            .map_err(|e| GatewayError::request(&endpoint, e))?;
        Self::check(&endpoint, response).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct NewStatus<'a> {
    status: &'a str,
    visibility: &'a str,
}

#[async_trait]
impl PostingGateway for MastodonGateway {
    async fn publish(&self, text: &str, visibility: Visibility) -> GatewayResult<String> {
        let endpoint = self.endpoint("/api/v1/statuses");
        let body = NewStatus {
            status: text,
            visibility: visibility.as_str(),
        };
        let response = self
            .authorized(self.client.post(&endpoint).json(&body))
            .send()
            .await
            .map_err(|e| GatewayError::request(&endpoint, e))?;
        let response = Self::check(&endpoint, response).await?;
        let status: Status = response
            .json()
            .await
            .map_err(|e| GatewayError::decode(&endpoint, e))?;
        Ok(status.id)
    }

    async fn current_account(&self) -> GatewayResult<Account> {
        self.get_json("/api/v1/accounts/verify_credentials", &[])
            .await
    }

    async fn account_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> GatewayResult<Vec<Status>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }
        self.get_json(&format!("/api/v1/accounts/{}/statuses", account_id), &query)
            .await
    }

    async fn pinned_statuses(&self, account_id: &str) -> GatewayResult<Vec<Status>> {
        self.get_json(
            &format!("/api/v1/accounts/{}/statuses", account_id),
            &[("pinned", "true".to_string())],
        )
        .await
    }

    async fn pin(&self, status_id: &str) -> GatewayResult<()> {
        self.post_empty(&format!("/api/v1/statuses/{}/pin", status_id))
            .await
    }

    async fn unpin(&self, status_id: &str) -> GatewayResult<()> {
        self.post_empty(&format!("/api/v1/statuses/{}/unpin", status_id))
            .await
    }
}

/// ドライラン用デコレータ
///
/// 読み取り系は内側の実装へ委譲し、投稿・ピン留め操作はログ出力のみ行う。
pub struct DryRunGateway<G> {
    inner: G,
}

impl<G: PostingGateway> DryRunGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: PostingGateway> PostingGateway for DryRunGateway<G> {
    async fn publish(&self, text: &str, visibility: Visibility) -> GatewayResult<String> {
        info!(visibility = visibility.as_str(), "[dry-run] 投稿をスキップ:\n{}", text);
        Ok(format!("dry-run-{}", Utc::now().timestamp_millis()))
    }

    async fn current_account(&self) -> GatewayResult<Account> {
        self.inner.current_account().await
    }

    async fn account_statuses(
        &self,
        account_id: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> GatewayResult<Vec<Status>> {
        self.inner.account_statuses(account_id, max_id, limit).await
    }

    async fn pinned_statuses(&self, account_id: &str) -> GatewayResult<Vec<Status>> {
        self.inner.pinned_statuses(account_id).await
    }

    async fn pin(&self, status_id: &str) -> GatewayResult<()> {
        info!(status_id, "[dry-run] ピン留めをスキップ");
        Ok(())
    }

    async fn unpin(&self, status_id: &str) -> GatewayResult<()> {
        info!(status_id, "[dry-run] ピン留め解除をスキップ");
        Ok(())
    }
}

/// モックが記録した操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Publish(String),
    Pin(String),
    Unpin(String),
}

#[derive(Debug, Default)]
struct MockState {
    /// 新しい順
    statuses: Vec<Status>,
    pinned: Vec<Status>,
    calls: Vec<GatewayCall>,
    next_id: u64,
}

/// テスト用のモック投稿サービス
///
/// 投稿は新しい順の投稿一覧の先頭に追加され、操作は`calls()`で検証できる。
pub struct MockPostingGateway {
    state: Mutex<MockState>,
    /// この文字列を含む本文の投稿を失敗させる
    fail_publish_containing: Option<String>,
    fail_pin: bool,
}

impl MockPostingGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1000,
                ..MockState::default()
            }),
            fail_publish_containing: None,
            fail_pin: false,
        }
    }

    /// 既存の投稿一覧（新しい順）を設定
    pub fn with_statuses(self, statuses: Vec<Status>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.statuses = statuses;
        }
        self
    }

    /// 既存のピン留め投稿を設定
    pub fn with_pinned(self, pinned: Vec<Status>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.pinned = pinned;
        }
        self
    }

    pub fn failing_publish_containing(mut self, needle: &str) -> Self {
        self.fail_publish_containing = Some(needle.to_string());
        self
    }

    pub fn failing_pin(mut self) -> Self {
        self.fail_pin = true;
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// 投稿された本文
    pub fn published_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Publish(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn pinned_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.pinned.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> GatewayResult<std::sync::MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| GatewayError::other("モックの状態が壊れています"))
    }
}

impl Default for MockPostingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostingGateway for MockPostingGateway {
    async fn publish(&self, text: &str, _visibility: Visibility) -> GatewayResult<String> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::Publish(text.to_string()));

        if let Some(needle) = &self.fail_publish_containing {
            if text.contains(needle.as_str()) {
                return Err(GatewayError::other(format!("投稿拒否: {}", needle)));
            }
        }

        state.next_id += 1;
        let status = Status {
            id: state.next_id.to_string(),
            created_at: Utc::now(),
            content: text.to_string(),
        };
        let id = status.id.clone();
        state.statuses.insert(0, status);
        Ok(id)
    }

    async fn current_account(&self) -> GatewayResult<Account> {
        Ok(Account {
            id: "1".to_string(),
            username: "kumabot".to_string(),
        })
    }

    async fn account_statuses(
        &self,
        _account_id: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> GatewayResult<Vec<Status>> {
        let state = self.lock()?;
        let start = match max_id {
            Some(max_id) => state
                .statuses
                .iter()
                .position(|s| s.id == max_id)
                .map(|pos| pos + 1)
                .unwrap_or(state.statuses.len()),
            None => 0,
        };
        Ok(state.statuses.iter().skip(start).take(limit).cloned().collect())
    }

    async fn pinned_statuses(&self, _account_id: &str) -> GatewayResult<Vec<Status>> {
        Ok(self.lock()?.pinned.clone())
    }

    async fn pin(&self, status_id: &str) -> GatewayResult<()> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::Pin(status_id.to_string()));
        if self.fail_pin {
            return Err(GatewayError::other("ピン留め上限"));
        }
        let status = state
            .statuses
            .iter()
            .find(|s| s.id == status_id)
            .cloned()
            .unwrap_or(Status {
                id: status_id.to_string(),
                created_at: Utc::now(),
                content: String::new(),
            });
        state.pinned.push(status);
        Ok(())
    }

    async fn unpin(&self, status_id: &str) -> GatewayResult<()> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::Unpin(status_id.to_string()));
        state.pinned.retain(|s| s.id != status_id);
        Ok(())
    }
}
