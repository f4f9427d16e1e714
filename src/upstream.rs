use std::pin::Pin;

use async_trait::async_trait;
use axum::http::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::ProxyError;

pub type BoxByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, ProxyError>> + Send>>;

/// Status, content type and body stream of a fetched upstream image.
pub struct FetchedImage {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: BoxByteStream,
}

/// Abstraction over the upstream image host, enabling mock implementations
/// for testing.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch the image at `remainder` (the prefix-stripped request path).
    /// Non-2xx upstream statuses are not errors; only transport failures are.
    async fn fetch_image(
        &self,
        method: Method,
        remainder: &str,
        user_agent: &str,
    ) -> Result<FetchedImage, ProxyError>;
}

/// Production upstream backed by a shared reqwest client.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    /// `base_url` must end with '/' (enforced by config validation).
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Upstream URL for a prefix-stripped request path. The remainder is
    /// appended literally; the base URL carries the trailing slash.
    fn image_url(&self, remainder: &str) -> String {
        format!("{}{}", self.base_url, remainder)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_image(
        &self,
        method: Method,
        remainder: &str,
        user_agent: &str,
    ) -> Result<FetchedImage, ProxyError> {
        let response = self
            .client
            .request(method, self.image_url(remainder))
            .header(REFERER, self.base_url.as_str())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(map_fetch_err)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes_stream()
            .map(|r| r.map_err(|e| ProxyError::Upstream(e.to_string())));

        Ok(FetchedImage {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}

fn map_fetch_err(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout(err.to_string())
    } else {
        ProxyError::Upstream(err.to_string())
    }
}
