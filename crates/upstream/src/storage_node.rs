//! Storage node client.

use crate::error::{Upstream, UpstreamError, UpstreamResult};
use crate::retry::{RetryPolicy, decode_json, reject_unsuccessful};
use crate::schema::v1::{FileListingPage, NodeInfo, RemoteFile};
use async_trait::async_trait;
use std::time::Duration;

/// Upper bound on listing pages per call, so a node that always reports
/// `has_more` cannot loop forever.
const MAX_LISTING_PAGES: usize = 100_000;

/// Client for the storage node v1 API.
#[async_trait]
pub trait StorageNodeClient: Send + Sync {
    /// Query the node's self-describing info endpoint.
    async fn fetch_info(&self, base_url: &str) -> UpstreamResult<NodeInfo>;

    /// Fetch the node's complete file listing, following pages.
    async fn list_files(&self, base_url: &str) -> UpstreamResult<Vec<RemoteFile>>;
}

/// HTTP implementation of [`StorageNodeClient`].
#[derive(Clone)]
pub struct HttpStorageNodeClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    page_size: u32,
}

impl HttpStorageNodeClient {
    pub fn new(request_timeout: Duration, retry: RetryPolicy, page_size: u32) -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;
        Ok(Self {
            http,
            retry,
            page_size: page_size.max(1),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> UpstreamResult<T> {
        let response = self
            .retry
            .send(Upstream::StorageNode, || {
                self.http.get(url).query(query).send()
            })
            .await?;
        let response = reject_unsuccessful(Upstream::StorageNode, response).await?;
        decode_json(Upstream::StorageNode, response).await
    }
}

#[async_trait]
impl StorageNodeClient for HttpStorageNodeClient {
    async fn fetch_info(&self, base_url: &str) -> UpstreamResult<NodeInfo> {
        let url = format!("{base_url}/api/v1/info");
        self.get_json(&url, &[]).await
    }

    async fn list_files(&self, base_url: &str) -> UpstreamResult<Vec<RemoteFile>> {
        let url = format!("{base_url}/api/v1/files");
        let mut files = Vec::new();

        for _ in 0..MAX_LISTING_PAGES {
            let query = [
                ("offset", files.len().to_string()),
                ("limit", self.page_size.to_string()),
            ];
            let page: FileListingPage = self.get_json(&url, &query).await?;
            let received = page.files.len();
            files.extend(page.files);

            if !page.has_more || received == 0 {
                tracing::debug!(base_url, files = files.len(), "file listing complete");
                return Ok(files);
            }
        }

        Err(UpstreamError::invalid(
            Upstream::StorageNode,
            format!("file listing exceeded {MAX_LISTING_PAGES} pages"),
        ))
    }
}
