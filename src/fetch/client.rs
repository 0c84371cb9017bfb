//! Request helpers for fetching configuration documents.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Client, IntoUrl, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::fetch::error::{FetchError, FetchResult};

/// Request settings forwarded verbatim to the transport.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub bearer_token: Option<String>,
    pub timeout: Option<Duration>,
    /// Client to send with; a fresh default client when unset.
    pub client: Option<Client>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            bearer_token: None,
            timeout: None,
            client: None,
        }
    }
}

/// Options for [`fetch_config`] and [`fetch_json`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Log the body of failed responses.
    pub debug: bool,
    pub request: RequestOptions,
}

impl FetchOptions {
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }
}

/// Issue the request and return the raw response on a success status.
pub async fn fetch_config(url: impl IntoUrl, options: &FetchOptions) -> FetchResult<Response> {
    let client = options.request.client.clone().unwrap_or_default();
    let mut request = client
        .request(options.request.method.clone(), url)
        .headers(options.request.headers.clone());
    if let Some(token) = &options.request.bearer_token {
        request = request.bearer_auth(token);
    }
    if let Some(timeout) = options.request.timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        if options.debug {
            log_error_body(status, response).await;
        }
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Issue the request and parse the success body as JSON.
pub async fn fetch_json<T: DeserializeOwned>(
    url: impl IntoUrl,
    options: &FetchOptions,
) -> FetchResult<T> {
    let response = fetch_config(url, options).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Build an updater that fetches `url` as JSON on every call.
pub fn json_updater<T>(
    url: Url,
    options: FetchOptions,
) -> impl Fn() -> BoxFuture<'static, FetchResult<T>> + Send + Sync + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    move || -> BoxFuture<'static, FetchResult<T>> {
        let url = url.clone();
        let options = options.clone();
        Box::pin(async move { fetch_json::<T>(url, &options).await })
    }
}

async fn log_error_body(status: StatusCode, response: Response) {
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(status = status.as_u16(), error = %e, "Failed to read error body");
            return;
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(info) => tracing::error!(status = status.as_u16(), body = %info, "Fetch Error"),
        Err(_) => tracing::error!(status = status.as_u16(), details = %text, "Error details"),
    }
}
