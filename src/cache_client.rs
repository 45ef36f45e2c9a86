//! HTTP client for the cache/fetch server's wire protocol: a GET carrying
//! the target URL and user agent as query parameters, with a CBOR-encoded
//! response body.
//!
//! The cache server is assumed to be CBOR-native end to end: its `response`
//! field is itself a CBOR map exposing `url`, `status`, `content`, and
//! `headers` rather than an opaque blob — see DESIGN.md.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;

use crate::cbor::{self, Value};
use crate::error::{CborError, Result};

pub struct CacheClient {
    http: Client,
    host: String,
    port: u16,
    user_agent: String,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: i64,
    pub error: Option<String>,
    pub content: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-type")).map(|(_, v)| v.as_str())
    }
}

impl CacheClient {
    pub fn new(host: impl Into<String>, port: u16, user_agent: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(CacheClient { http, host: host.into(), port, user_agent: user_agent.into() })
    }

    /// Fetches `url` through the cache server. Transient failures are
    /// retried up to 3 attempts total with exponential backoff (1s, 2s,
    /// capped at 10s); on exhaustion a synthetic `status = 0` response is
    /// returned rather than an error, so this never propagates a failure
    /// out to the worker loop.
    pub async fn fetch(&self, url: &str) -> FetchResponse {
        let mut backoff = Duration::from_secs(1);
        let mut last_err = String::new();

        for attempt in 1..=3u32 {
            match self.try_fetch(url).await {
                Ok(resp) => return resp,
                Err(e) => {
                    tracing::warn!(attempt, url, error = %e, "cache fetch failed");
                    last_err = e.to_string();
                    if attempt < 3 {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(Duration::from_secs(10));
                    }
                }
            }
        }

        FetchResponse {
            url: url.to_string(),
            status: 0,
            error: Some(last_err),
            content: Vec::new(),
            headers: HashMap::new(),
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<FetchResponse> {
        let endpoint = format!("http://{}:{}/", self.host, self.port);
        let body = self
            .http
            .get(&endpoint)
            .query(&[("q", url), ("u", self.user_agent.as_str())])
            .send()
            .await?
            .bytes()
            .await?;

        let decoded = cbor::decode(&body)?;
        let top = decoded.as_map().ok_or_else(|| CborError("cache response was not a cbor map".into()))?;
        let get = |key: &str| top.iter().find_map(|(k, v)| (k.as_text() == Some(key)).then_some(v));

        let top_url = get("url").and_then(Value::as_text).map(str::to_string);
        let status = get("status").and_then(Value::as_i64).unwrap_or(0);
        let error = get("error").and_then(Value::as_text).map(str::to_string);

        let mut inner_url = None;
        let mut content = Vec::new();
        let mut headers = HashMap::new();
        if let Some(inner) = get("response") {
            inner_url = inner.map_get("url").and_then(Value::as_text).map(str::to_string);
            if let Some(bytes) = inner.map_get("content").and_then(Value::as_bytes) {
                content = bytes.to_vec();
            }
            if let Some(header_pairs) = inner.map_get("headers").and_then(Value::as_map) {
                for (k, v) in header_pairs {
                    if let (Some(k), Some(v)) = (k.as_text(), v.as_text()) {
                        headers.insert(k.to_string(), v.to_string());
                    }
                }
            }
        }

        // The inner (post-redirect) response url wins over the outer echo,
        // which in turn wins over the request url.
        let resp_url = inner_url.or(top_url).unwrap_or_else(|| url.to_string());

        Ok(FetchResponse { url: resp_url, status, error, content, headers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response_bytes(status: i64) -> Vec<u8> {
        let inner = Value::Map(vec![
            (Value::Text("content".into()), Value::Bytes(b"<html></html>".to_vec())),
            (
                Value::Text("headers".into()),
                Value::Map(vec![(Value::Text("Content-Type".into()), Value::Text("text/html".into()))]),
            ),
        ]);
        let top = Value::Map(vec![
            (Value::Text("url".into()), Value::Text("https://ics.uci.edu/".into())),
            (Value::Text("status".into()), Value::Uint(status as u64)),
            (Value::Text("response".into()), inner),
        ]);
        cbor::encode(&top)
    }

    #[test]
    fn decodes_a_well_formed_cbor_response() {
        let bytes = sample_response_bytes(200);
        let decoded = cbor::decode(&bytes).unwrap();
        let top = decoded.as_map().unwrap();
        let status = top.iter().find_map(|(k, v)| (k.as_text() == Some("status")).then_some(v)).unwrap();
        assert_eq!(status.as_i64(), Some(200));
    }

    #[test]
    fn content_type_lookup_is_case_insensitive() {
        let resp = FetchResponse {
            url: "https://ics.uci.edu/".into(),
            status: 200,
            error: None,
            content: vec![],
            headers: HashMap::from([("content-type".to_string(), "text/html".to_string())]),
        };
        assert_eq!(resp.content_type(), Some("text/html"));
    }
}
