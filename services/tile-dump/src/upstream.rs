//! HTTP access to the tile service.
//!
//! Every request is tagged with a [`RequestKind`]. Failures of primary
//! requests (the tile and style the run was asked for) abort the run;
//! failures of background requests made by the rendering engine are
//! recoverable and answered with a placeholder by the caller.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response};
use renderer::Resource;
use thiserror::Error;
use tile_common::{StyleDocument, TileCoord};
use tracing::{debug, instrument};

use crate::config::UpstreamConfig;

/// Who asked for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Tile data or style requested directly by the run. Fatal on failure.
    Primary,
    /// Resource requested by the rendering engine. Recoverable.
    Background,
}

impl RequestKind {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RequestKind::Background)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Primary => f.write_str("primary"),
            RequestKind::Background => f.write_str("background"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status: {status}, statusText: {text}")]
    Status { status: u16, text: String },

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// A failed upstream request.
#[derive(Debug, Error)]
#[error("Error - {kind} request failed - {failure} url: {url}")]
pub struct FetchError {
    pub kind: RequestKind,
    /// Request URL with the API key redacted
    pub url: String,
    #[source]
    pub failure: FetchFailure,
}

impl FetchError {
    pub fn new(kind: RequestKind, url: &str, failure: FetchFailure) -> Self {
        Self {
            kind,
            url: redact_api_key(url),
            failure,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

/// Replace the value of the `api` query parameter so keys stay out of logs.
pub fn redact_api_key(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            if !parsed.query_pairs().any(|(k, _)| k == "api") {
                return url.to_string();
            }
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let v = if k == "api" { "***".to_string() } else { v.into_owned() };
                    (k.into_owned(), v)
                })
                .collect();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Source of tile data, styles and engine resources.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// URL the engine will use for `coord`'s vector tile.
    fn tile_url(&self, coord: &TileCoord) -> String;

    async fn fetch_tile(&self, coord: &TileCoord) -> Result<Bytes, FetchError>;

    async fn fetch_style(&self) -> Result<StyleDocument, FetchError>;

    /// Fetch an arbitrary resource on behalf of the rendering engine.
    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError>;
}

/// [`Upstream`] over HTTP(S).
pub struct HttpUpstream {
    client: Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    async fn get(&self, url: &str, kind: RequestKind) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(kind, url, FetchFailure::Transport(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                kind,
                url,
                FetchFailure::Status {
                    status: status.as_u16(),
                    text: status.canonical_reason().unwrap_or("").to_string(),
                },
            ));
        }

        Ok(response)
    }

    async fn body(response: Response, url: &str, kind: RequestKind) -> Result<Bytes, FetchError> {
        response
            .bytes()
            .await
            .map_err(|e| FetchError::new(kind, url, FetchFailure::Transport(e)))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    fn tile_url(&self, coord: &TileCoord) -> String {
        self.config.tile_url(coord)
    }

    #[instrument(skip_all, fields(tile = %coord))]
    async fn fetch_tile(&self, coord: &TileCoord) -> Result<Bytes, FetchError> {
        let url = self.config.tile_url(coord);
        let response = self.get(&url, RequestKind::Primary).await?;
        let data = Self::body(response, &url, RequestKind::Primary).await?;
        debug!(bytes = data.len(), "Fetched tile data");
        Ok(data)
    }

    #[instrument(skip_all)]
    async fn fetch_style(&self) -> Result<StyleDocument, FetchError> {
        let url = self.config.style_url();
        let response = self.get(&url, RequestKind::Primary).await?;
        let data = Self::body(response, &url, RequestKind::Primary).await?;
        let style = StyleDocument::from_slice(&data).map_err(|e| {
            FetchError::new(
                RequestKind::Primary,
                &url,
                FetchFailure::InvalidBody(e.to_string()),
            )
        })?;
        debug!(layers = style.layer_count(), "Fetched style");
        Ok(style)
    }

    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError> {
        let response = self.get(url, RequestKind::Background).await?;
        let headers = response.headers().clone();
        let data = Self::body(response, url, RequestKind::Background).await?;

        Ok(Resource {
            data,
            modified: http_date(headers.get(header::LAST_MODIFIED)),
            expires: http_date(headers.get(header::EXPIRES)),
            etag: headers
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

/// Parse an HTTP date header (RFC 2822 form, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn http_date(value: Option<&header::HeaderValue>) -> Option<DateTime<Utc>> {
    let text = value?.to_str().ok()?;
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
