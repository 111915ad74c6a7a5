use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use kumabot::{
    app::workflow::{execute_bot_workflow, RunOptions},
    config::AppConfig,
    infra::{
        api::{
            http::ReqwestHttpClient,
            posting::{DryRunGateway, MastodonGateway, PostingGateway},
        },
        storage::{BlobStore, DryRunBlobStore, FileBlobStore, HttpBlobStore},
    },
    types::{RunReport, RunResult},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kumabot", about = "クマ出没情報をMastodonへ投稿するボット")]
struct Cli {
    /// 時刻に関係なく都道府県別集計を投稿する
    #[arg(long, env = "KUMABOT_FORCE_SUMMARY")]
    force_summary: bool,

    /// 投稿・ピン留め・台帳の保存を行わずにログ出力のみ
    #[arg(long, env = "KUMABOT_DRY_RUN")]
    dry_run: bool,

    /// 設定ファイル（Lambda以外で使用）
    #[arg(long, default_value = "config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kumabot=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(report) => {
            info!(
                published = report.published,
                failed = report.failed,
                "実行が完了しました"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "実行に失敗しました");
            Err(anyhow::Error::new(e).context("ボットの実行に失敗"))
        }
    }
}

/// 設定を読み込み、1回分の処理を実行する
async fn run(cli: &Cli) -> RunResult<RunReport> {
    let config = AppConfig::load(&cli.config)?;
    if cli.dry_run {
        info!("ドライランモードで実行します");
    }

    let http = ReqwestHttpClient::new();
    let gateway = build_gateway(&config, cli.dry_run);
    let store = build_store(&config, cli.dry_run);
    let options = RunOptions::from_config(&config, cli.force_summary);

    execute_bot_workflow(&http, gateway.as_ref(), store.as_ref(), &options, Utc::now()).await
}

fn build_gateway(config: &AppConfig, dry_run: bool) -> Box<dyn PostingGateway> {
    let gateway = MastodonGateway::new(&config.mastodon.server, &config.mastodon.access_token);
    if dry_run {
        Box::new(DryRunGateway::new(gateway))
    } else {
        Box::new(gateway)
    }
}

fn build_store(config: &AppConfig, dry_run: bool) -> Box<dyn BlobStore> {
    match &config.store.local_dir {
        Some(dir) => {
            info!(dir = %dir, "ローカルディレクトリをストアとして使用");
            wrap_store(FileBlobStore::new(dir), dry_run)
        }
        None => {
            let endpoint = config.store.endpoint_url();
            info!(endpoint = %endpoint, "HTTPストアを使用");
            wrap_store(
                HttpBlobStore::new(&endpoint, config.store.auth_token.clone()),
                dry_run,
            )
        }
    }
}

fn wrap_store<S: BlobStore + 'static>(store: S, dry_run: bool) -> Box<dyn BlobStore> {
    if dry_run {
        Box::new(DryRunBlobStore::new(store))
    } else {
        Box::new(store)
    }
}
