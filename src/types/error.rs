use thiserror::Error;

/// 設定関連のエラー型
/// 環境変数、設定ファイル、設定値の検証など設定に関するエラーを定義
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 環境変数が見つからない
    #[error("環境変数が見つかりません: {name}")]
    MissingEnvironmentVariable { name: String },

    /// 設定値が不正
    #[error("設定値が不正です: {reason}")]
    InvalidValue { reason: String },

    /// 設定ファイルが読み込めない
    #[error("設定ファイルを読み込めません: {path} - {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 設定ファイルの内容を解析できない
    #[error("設定ファイルの解析に失敗: {path} - {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// 環境変数不足エラーを作成
    pub fn missing_env_var<N: Into<String>>(name: N) -> Self {
        Self::MissingEnvironmentVariable { name: name.into() }
    }

    /// 不正な設定値エラーを作成
    pub fn invalid_value<R: Into<String>>(reason: R) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// 設定ファイル読み込みエラーを作成
    pub fn config_file<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::ConfigFile {
            path: path.into(),
            source,
        }
    }

    /// 設定ファイル解析エラーを作成
    pub fn decode<P: Into<String>>(path: P, source: serde_yaml::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }
}

/// ブロブストア（台帳・RSS設定ドキュメント）のエラー型
#[derive(Error, Debug)]
pub enum StoreError {
    /// ドキュメントの読み込みに失敗
    #[error("ストアからの読み込みに失敗: {key} - {reason}")]
    Read { key: String, reason: String },

    /// ドキュメントの書き込みに失敗
    #[error("ストアへの書き込みに失敗: {key} - {reason}")]
    Write { key: String, reason: String },

    /// JSONのシリアライズ/デシリアライズに失敗
    #[error("JSON処理エラー: {key} - {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn read<K: Into<String>, R: ToString>(key: K, reason: R) -> Self {
        Self::Read {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write<K: Into<String>, R: ToString>(key: K, reason: R) -> Self {
        Self::Write {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn json<K: Into<String>>(key: K, source: serde_json::Error) -> Self {
        Self::Json {
            key: key.into(),
            source,
        }
    }
}

/// 取得元（スクレイピング対象・RSSフィード）からの取得エラー型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 通信エラー（タイムアウト含む）
    #[error("HTTPリクエストに失敗: {url} - {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 200以外のステータス
    #[error("HTTPステータス異常: {url} - {status}")]
    Status { url: String, status: u16 },

    /// フィードXMLの解析に失敗
    #[error("フィードの解析に失敗: {url} - {source}")]
    Feed {
        url: String,
        #[source]
        source: rss::Error,
    },

    /// Atomフィードの解析に失敗
    #[error("Atomフィードの解析に失敗: {url} - {source}")]
    Atom {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },

    /// CSSセレクタの構築に失敗
    #[error("セレクタが不正です: {selector} - {reason}")]
    Selector { selector: String, reason: String },

    /// モッククライアント等、その他の取得エラー
    #[error("取得エラー: {url} - {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    pub fn request<U: Into<String>>(url: U, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    pub fn status<U: Into<String>>(url: U, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    pub fn feed<U: Into<String>>(url: U, source: rss::Error) -> Self {
        Self::Feed {
            url: url.into(),
            source,
        }
    }

    pub fn atom<U: Into<String>>(url: U, source: feed_rs::parser::ParseFeedError) -> Self {
        Self::Atom {
            url: url.into(),
            source,
        }
    }

    pub fn selector<S: Into<String>, R: ToString>(selector: S, reason: R) -> Self {
        Self::Selector {
            selector: selector.into(),
            reason: reason.to_string(),
        }
    }

    pub fn other<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Other {
            url: url.into(),
            message: message.into(),
        }
    }

    /// 404かどうか
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// 日時文字列の解析エラー
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("日時の解析に失敗: '{date} {time}'")]
    DateTime { date: String, time: String },
}

impl ParseError {
    pub fn date_time<D: Into<String>, T: Into<String>>(date: D, time: T) -> Self {
        Self::DateTime {
            date: date.into(),
            time: time.into(),
        }
    }
}

/// 投稿サービス（Mastodon API）呼び出しのエラー型
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("投稿サービスへのリクエストに失敗: {endpoint} - {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("投稿サービスがエラーを返しました: {endpoint} - {status} {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("投稿サービスの応答を解析できません: {endpoint} - {reason}")]
    Decode { endpoint: String, reason: String },

    /// モック用
    #[error("投稿サービスエラー: {message}")]
    Other { message: String },
}

impl GatewayError {
    pub fn request<E: Into<String>>(endpoint: E, source: reqwest::Error) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn status<E: Into<String>, B: Into<String>>(endpoint: E, status: u16, body: B) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    pub fn decode<E: Into<String>, R: ToString>(endpoint: E, reason: R) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn other<M: Into<String>>(message: M) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// 単一投稿の失敗。台帳には追加されず次回実行で再試行される
#[derive(Error, Debug)]
#[error("投稿に失敗: {title} - {source}")]
pub struct PublishError {
    pub title: String,
    #[source]
    pub source: GatewayError,
}

impl PublishError {
    pub fn new<T: Into<String>>(title: T, source: GatewayError) -> Self {
        Self {
            title: title.into(),
            source,
        }
    }
}

/// ピン留め操作の失敗。ログ出力のみで伝播しない
#[derive(Error, Debug)]
pub enum PinError {
    #[error("ピン留め一覧の取得に失敗: {0}")]
    List(#[source] GatewayError),

    #[error("ピン留め解除に失敗: {id} - {source}")]
    Unpin {
        id: String,
        #[source]
        source: GatewayError,
    },

    #[error("ピン留めに失敗: {id} - {source}")]
    Pin {
        id: String,
        #[source]
        source: GatewayError,
    },
}

/// 1回の実行全体の失敗（トリガーへ返す単一のエラー）
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("日次集計に失敗: {0}")]
    Summary(#[source] GatewayError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
pub type RunResult<T> = std::result::Result<T, RunError>;
