use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{ArtworkError, Result};

/// Raw response from a remote artwork endpoint.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Remote fetch capability injected into the pipeline.
///
/// Implementations surface transport failures as [`ArtworkError::Timeout`]
/// or [`ArtworkError::Unreachable`]; interpreting HTTP status codes is the
/// pipeline's job.
#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse>;
}

/// Stock fetcher backed by `reqwest` with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct HttpArtworkFetcher {
    client: reqwest::Client,
}

impl HttpArtworkFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ArtworkError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_transport_error)?.to_vec();
        Ok(FetchResponse { status, body })
    }
}

fn map_transport_error(err: reqwest::Error) -> ArtworkError {
    if err.is_timeout() {
        ArtworkError::Timeout
    } else {
        ArtworkError::Unreachable
    }
}
