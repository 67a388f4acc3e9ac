//! HTTP transport for CalDAV operations.
//!
//! Sends WebDAV requests (PROPFIND, REPORT, PUT, DELETE, MKCALENDAR) and
//! maps response statuses to [`ProviderError`]s. The first request goes
//! out unauthenticated; after a 401 the server's challenge is remembered
//! and every following request is authorized up front.

use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::auth::Challenge;
use super::config::CalDavConfig;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// One WebDAV request.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: &'static str,
    pub url: Url,
    pub depth: Option<u8>,
    pub body: Option<(String, &'static str)>,
    pub headers: Vec<(&'static str, String)>,
}

impl DavRequest {
    fn new(method: &'static str, url: Url) -> Self {
        Self {
            method,
            url,
            depth: None,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn propfind(url: Url, depth: u8, body: String) -> Self {
        Self {
            depth: Some(depth),
            body: Some((body, XML_CONTENT_TYPE)),
            ..Self::new("PROPFIND", url)
        }
    }

    pub fn report(url: Url, body: String) -> Self {
        Self {
            depth: Some(1),
            body: Some((body, XML_CONTENT_TYPE)),
            ..Self::new("REPORT", url)
        }
    }

    pub fn mkcalendar(url: Url, body: String) -> Self {
        Self {
            body: Some((body, XML_CONTENT_TYPE)),
            ..Self::new("MKCALENDAR", url)
        }
    }

    /// PUT of iCalendar text. Without an etag the write only succeeds if
    /// nothing exists at `url` yet.
    pub fn put(url: Url, data: String, etag: Option<&str>) -> Self {
        let precondition = match etag {
            Some(etag) => ("If-Match", quote_etag(etag)),
            None => ("If-None-Match", "*".to_string()),
        };
        Self {
            body: Some((data, ICS_CONTENT_TYPE)),
            headers: vec![precondition],
            ..Self::new("PUT", url)
        }
    }

    pub fn delete(url: Url, etag: Option<&str>) -> Self {
        Self {
            headers: etag
                .map(|etag| vec![("If-Match", quote_etag(etag))])
                .unwrap_or_default(),
            ..Self::new("DELETE", url)
        }
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    /// `ETag` header, quotes stripped.
    pub etag: Option<String>,
    pub body: String,
}

fn quote_etag(etag: &str) -> String {
    if etag.starts_with('"') || etag.starts_with("W/") {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    }
}

/// Low-level HTTP client. Needs `&mut self` to keep the digest nonce count.
pub struct Transport {
    client: Client,
    config: CalDavConfig,
    challenge: Option<Challenge>,
}

impl Transport {
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {e}"))
                    .with_source(e)
            })?;

        Ok(Self {
            client,
            config,
            challenge: None,
        })
    }

    pub fn config(&self) -> &CalDavConfig {
        &self.config
    }

    /// Sends `request`, answering one authentication challenge if needed.
    pub async fn send(&mut self, request: &DavRequest) -> ProviderResult<DavResponse> {
        let response = self.dispatch(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.config.credentials().is_some() {
            let header = response
                .headers()
                .get(reqwest::header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("Basic");
            let challenge = Challenge::from_header(header);
            let first_attempt = self.challenge.replace(challenge).is_none();
            debug!(
                method = request.method,
                url = %request.url,
                first_attempt,
                "server requested authentication"
            );
            let retried = self.dispatch(request).await?;
            return check_status(retried).await;
        }

        check_status(response).await
    }

    async fn dispatch(&mut self, request: &DavRequest) -> ProviderResult<Response> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            ProviderError::internal(format!("invalid HTTP method {}: {e}", request.method))
        })?;
        let mut builder = self.client.request(method, request.url.clone());

        if let Some(depth) = request.depth {
            builder = builder.header("Depth", depth.to_string());
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let (Some(challenge), Some((username, password))) =
            (self.challenge.as_mut(), self.config.credentials())
        {
            let value = challenge.authorize(request.method, request.url.path(), username, password);
            builder = builder.header(reqwest::header::AUTHORIZATION, value);
        }
        if let Some((body, content_type)) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, *content_type)
                .body(body.clone());
        }

        trace!(method = request.method, url = %request.url, "sending request");
        builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request to {} timed out", request.url)
            } else {
                format!("request to {} failed: {e}", request.url)
            };
            ProviderError::network(message).with_source(e)
        })
    }
}

async fn check_status(response: Response) -> ProviderResult<DavResponse> {
    let status = response.status();
    trace!(status = %status, "received response");

    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_string());

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT | StatusCode::MULTI_STATUS => {
            let body = response.text().await.map_err(|e| {
                ProviderError::network(format!("failed to read response: {e}")).with_source(e)
            })?;
            Ok(DavResponse {
                status: status.as_u16(),
                etag,
                body,
            })
        }
        StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
            "server rejected the configured credentials",
        )),
        StatusCode::FORBIDDEN => Err(ProviderError::authorization("access denied")),
        StatusCode::NOT_FOUND => Err(ProviderError::not_found(format!(
            "{} not found",
            response.url().path()
        ))),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Err(ProviderError::conflict(
            format!("{} was changed on the server", response.url().path()),
        )),
        s if s.is_server_error() => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::server(format!("server error ({s}): {body}")))
        }
        s => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %s, body = %body, "unexpected response status");
            Err(ProviderError::invalid_response(format!(
                "unexpected status {s}: {body}"
            )))
        }
    }
}
