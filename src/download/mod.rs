use crate::http::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use log::info;

/// Fetches a release artifact into memory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpDownloader {
    http_client: HttpClient,
}

impl HttpDownloader {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading {}...", url);
        let bytes = self.http_client.download_bytes(url).await?;
        info!("Download complete ({} bytes).", bytes.len());
        Ok(bytes)
    }
}
