//! HTTP transport for the 1Click and explorer APIs
//!
//! Every request accepts JSON and carries the bearer key when one is
//! configured. Replies come back raw so callers decide what a non-2xx
//! status means.

use crate::error::{SwapError, SwapResult};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, trace};

const JSON: &str = "application/json";

/// Status and raw body of a provider reply
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: String) -> SwapResult<HttpReply>;

    async fn post_json(&self, url: String, body: String) -> SwapResult<HttpReply>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, api_key: Option<&str>) -> SwapResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers(api_key)?)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: RequestBuilder) -> SwapResult<HttpReply> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Provider replied {}", status);
        trace!("Reply body: {}", body);
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: String) -> SwapResult<HttpReply> {
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    async fn post_json(&self, url: String, body: String) -> SwapResult<HttpReply> {
        debug!("POST {}", url);
        self.send(self.client.post(url).header(CONTENT_TYPE, JSON).body(body))
            .await
    }
}

fn default_headers(api_key: Option<&str>) -> SwapResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON));

    if let Some(key) = api_key {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            SwapError::Configuration("provider api_key is not a valid header value".to_string())
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let anonymous = default_headers(None).unwrap();
        assert_eq!(anonymous.get(ACCEPT).unwrap(), JSON);
        assert!(anonymous.get(AUTHORIZATION).is_none());

        let authed = default_headers(Some("secret")).unwrap();
        let bearer = authed.get(AUTHORIZATION).unwrap();
        assert_eq!(bearer, "Bearer secret");
        assert!(bearer.is_sensitive());
    }

    #[test]
    fn test_rejects_unprintable_key() {
        let err = default_headers(Some("line\nbreak")).unwrap_err();
        assert!(matches!(err, SwapError::Configuration(_)));
        assert!(ReqwestTransport::new(Duration::from_secs(1), Some("ok-key")).is_ok());
    }

    #[test]
    fn test_is_success() {
        let ok = HttpReply { status: 201, body: String::new() };
        let throttled = HttpReply { status: 429, body: String::new() };
        assert!(ok.is_success());
        assert!(!throttled.is_success());
    }
}
