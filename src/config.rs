//! アプリケーション設定
//!
//! 実行環境（AWS Lambda）では環境変数から、それ以外では設定ファイル
//! （JSON/YAML）から読み込む。

use crate::infra::api::posting::Visibility;
use crate::infra::loader::load_yaml_from_file;
use crate::infra::storage::HttpBlobStore;
use crate::types::{ConfigError, ConfigResult};
use serde::Deserialize;
use tracing::info;

const DEFAULT_REGION: &str = "ap-northeast-1";
const LAMBDA_MARKER_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// 投稿サービス（Mastodon）の設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MastodonConfig {
    pub server: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub access_token: String,
    /// 空文字は `public`
    #[serde(default)]
    pub visibility: String,
}

/// ブロブストアの設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(alias = "object_key")]
    pub ledger_key: String,
    #[serde(default)]
    pub rss_config_key: Option<String>,
    /// 明示的なエンドポイント。未指定ならバケットとリージョンから組み立てる
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 指定された場合はローカルディレクトリをストアとして使う
    #[serde(default)]
    pub local_dir: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl StoreConfig {
    /// HTTPストアの接続先
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => HttpBlobStore::s3_endpoint(&self.bucket_name, &self.region),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub mastodon: MastodonConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// 実行環境に応じて設定を読み込み、検証する
    pub fn load(config_path: &str) -> ConfigResult<Self> {
        let config = if is_lambda(|name| std::env::var(name).ok()) {
            info!("環境変数から設定を読み込みます");
            Self::from_env()?
        } else {
            info!(path = %config_path, "設定ファイルから設定を読み込みます");
            Self::from_file(config_path)?
        };
        config.validate()?;
        Ok(config)
    }

    /// 設定ファイルから読み込む（JSONもYAMLとして解析できる）
    pub fn from_file(path: &str) -> ConfigResult<Self> {
        load_yaml_from_file(path)
    }

    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 名前から値を引く関数を使って環境変数形式の設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| optional(name).ok_or_else(|| ConfigError::missing_env_var(name));

        let region = optional("KUMA_AWS_REGION")
            .or_else(|| optional("AWS_REGION"))
            .unwrap_or_else(default_region);

        Ok(Self {
            mastodon: MastodonConfig {
                server: required("MASTODON_SERVER")?,
                client_id: optional("MASTODON_CLIENT_ID").unwrap_or_default(),
                client_secret: optional("MASTODON_CLIENT_SECRET").unwrap_or_default(),
                access_token: required("MASTODON_ACCESS_TOKEN")?,
                visibility: optional("MASTODON_VISIBILITY").unwrap_or_default(),
            },
            store: StoreConfig {
                region,
                bucket_name: required("S3_BUCKET_NAME")?,
                ledger_key: required("S3_OBJECT_KEY")?,
                rss_config_key: optional("S3_RSS_CONFIG_KEY"),
                endpoint: optional("S3_ENDPOINT"),
                local_dir: None,
                auth_token: optional("S3_AUTH_TOKEN"),
            },
        })
    }

    /// 必須項目と値の形式を検証する
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mastodon.server.trim().is_empty() {
            return Err(ConfigError::invalid_value("mastodon.server が空です"));
        }
        if !self.mastodon.server.starts_with("http://") && !self.mastodon.server.starts_with("https://")
        {
            return Err(ConfigError::invalid_value(format!(
                "mastodon.server はURLで指定してください: {}",
                self.mastodon.server
            )));
        }
        if self.mastodon.access_token.trim().is_empty() {
            return Err(ConfigError::invalid_value("mastodon.access_token が空です"));
        }
        self.mastodon
            .visibility
            .parse::<Visibility>()
            .map_err(ConfigError::invalid_value)?;

        if self.store.ledger_key.trim().is_empty() {
            return Err(ConfigError::invalid_value("store.ledger_key が空です"));
        }
        if self.store.local_dir.is_none()
            && self.store.endpoint.is_none()
            && self.store.bucket_name.trim().is_empty()
        {
            return Err(ConfigError::invalid_value(
                "store.bucket_name・endpoint・local_dir のいずれかが必要です",
            ));
        }
        Ok(())
    }

    /// 検証済みの公開範囲
    pub fn visibility(&self) -> Visibility {
        self.mastodon.visibility.parse().unwrap_or_default()
    }
}

/// Lambda上で実行されているか
fn is_lambda<F: Fn(&str) -> Option<String>>(lookup: F) -> bool {
    lookup(LAMBDA_MARKER_ENV).is_some_and(|name| !name.is_empty())
}
