use super::BlobStore;
use crate::types::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const STORE_TIMEOUT_SECS: u64 = 30;

/// HTTPのGET/PUTでオブジェクトを読み書きする実装
///
/// S3互換エンドポイント（`{endpoint}/{key}`）を想定する。署名は行わないため、
/// 書き込み可能なエンドポイントか、前段で認可されたプロキシを指定すること。
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    /// バケット名とリージョンからS3の仮想ホスト形式のエンドポイントを作る
    pub fn s3_endpoint(bucket: &str, region: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com", bucket, region)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key.trim_start_matches('/'))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(Duration::from_secs(STORE_TIMEOUT_SECS));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let url = self.url_for(key);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::read(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::read(key, format!("HTTP {}", status.as_u16())));
        }

        let body = response.bytes().await.map_err(|e| StoreError::read(key, e))?;
        Ok(body.to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        let url = self.url_for(key);
        let response = self
            .request(
                self.client
                    .put(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body),
            )
            .send()
            .await
            .map_err(|e| StoreError::write(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::write(key, format!("HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}
