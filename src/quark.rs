//! Quark drive growth API client.
//!
//! Two endpoints are used, both authorized by the `kps`/`sign`/`vcode`
//! query parameters captured from the mobile app:
//!
//! - `GET  /1/clouddrive/capacity/growth/info` returns capacity and sign state
//! - `POST /1/clouddrive/capacity/growth/sign` claims today's reward
//!
//! The API has no stability guarantees, so every status and raw body is
//! logged and non-JSON bodies are kept as a fallback object instead of
//! being treated as errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Value, json};

use crate::account::Credentials;
use crate::error::{Result, Stage};

/// Base URL of the drive API host.
const QUARK_API_URL: &str = "https://drive-m.quark.cn";

const GROWTH_INFO_PATH: &str = "/1/clouddrive/capacity/growth/info";
const GROWTH_SIGN_PATH: &str = "/1/clouddrive/capacity/growth/sign";

const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Mobile) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
const ACCEPT: &str = "application/json, text/plain, */*";
const REFERER: &str = "https://drive-m.quark.cn/";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Number of characters of a non-JSON body kept for diagnostics.
const RAW_PREVIEW_CHARS: usize = 200;

/// Query string shared by both growth calls.
#[derive(Serialize)]
struct GrowthQuery<'a> {
    pr: &'static str,
    fr: &'static str,
    kps: &'a str,
    sign: &'a str,
    vcode: &'a str,
    #[serde(rename = "__t")]
    timestamp: i64,
    sign_cyclic: &'static str,
}

impl<'a> GrowthQuery<'a> {
    /// Builds the query with a fresh millisecond timestamp.
    fn new(credentials: &'a Credentials) -> Self {
        Self {
            pr: "ucpro",
            fr: "android",
            kps: &credentials.kps,
            sign: &credentials.sign,
            vcode: &credentials.vcode,
            timestamp: Utc::now().timestamp_millis(),
            sign_cyclic: "true",
        }
    }
}

#[derive(Serialize)]
struct SignBody {
    sign_cyclic: bool,
}

/// HTTP status plus decoded body of a growth call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    /// Parsed JSON, or `{"status": .., "raw": ..}` when the body was not JSON.
    pub body: Value,
}

impl ApiReply {
    /// Decodes a raw body, degrading to the fallback object on invalid JSON.
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = serde_json::from_str(text).unwrap_or_else(|e| {
            log::warn!("Response is not JSON status={}: {}", status, e);
            json!({
                "status": status,
                "raw": text.chars().take(RAW_PREVIEW_CHARS).collect::<String>(),
            })
        });
        Self { status, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// The two growth calls.
///
/// The cookie is passed on every call so that each account fully specifies
/// the header it sends; nothing carries over between accounts.
#[async_trait]
pub trait GrowthApi {
    async fn growth_info(&self, credentials: &Credentials, cookie: Option<&str>) -> Result<ApiReply>;

    async fn growth_sign(&self, credentials: &Credentials, cookie: Option<&str>) -> Result<ApiReply>;
}

/// Client for the Quark drive API.
///
/// Holds one `reqwest` client (connection pool plus the fixed mobile
/// headers) for the whole run.
pub struct QuarkClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl QuarkClient {
    /// Creates a client with the fixed mobile headers and the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::REFERER, HeaderValue::from_static(REFERER));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: QUARK_API_URL.to_string(),
            timeout,
        })
    }

    fn with_cookie(request: reqwest::RequestBuilder, cookie: Option<&str>) -> reqwest::RequestBuilder {
        match cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }

    /// Sends the request. Errors are stripped of the URL, whose query holds the credentials.
    async fn send(&self, stage: Stage, request: reqwest::RequestBuilder) -> Result<ApiReply> {
        let start = Instant::now();
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            let e = e.without_url();
            log::error!("Quark API request failed stage={:?}: {}", stage, e);
            e
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            let e = e.without_url();
            log::error!("Failed to read Quark API body stage={:?}: {}", stage, e);
            e
        })?;

        log::debug!(
            "Quark API responded stage={:?} duration_ms={} status={} body={}",
            stage,
            start.elapsed().as_millis(),
            status,
            text
        );

        Ok(ApiReply::from_text(status, &text))
    }
}

#[async_trait]
impl GrowthApi for QuarkClient {
    async fn growth_info(&self, credentials: &Credentials, cookie: Option<&str>) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, GROWTH_INFO_PATH);
        let request = self.client.get(&url).query(&GrowthQuery::new(credentials));
        self.send(Stage::Info, Self::with_cookie(request, cookie)).await
    }

    async fn growth_sign(&self, credentials: &Credentials, cookie: Option<&str>) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, GROWTH_SIGN_PATH);
        let request = self
            .client
            .post(&url)
            .query(&GrowthQuery::new(credentials))
            .json(&SignBody { sign_cyclic: true });
        self.send(Stage::Sign, Self::with_cookie(request, cookie)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_is_parsed() {
        let reply = ApiReply::from_text(200, r#"{"code":0,"data":{"88VIP":true}}"#);
        assert!(reply.is_ok());
        assert_eq!(reply.body["data"]["88VIP"], Value::Bool(true));
    }

    #[test]
    fn test_non_json_body_becomes_fallback_object() {
        let html = format!("<html>{}</html>", "x".repeat(500));
        let reply = ApiReply::from_text(502, &html);

        assert!(!reply.is_ok());
        assert_eq!(reply.body["status"], json!(502));
        let raw = reply.body["raw"].as_str().unwrap();
        assert_eq!(raw.chars().count(), RAW_PREVIEW_CHARS);
        assert!(raw.starts_with("<html>"));
    }

    #[test]
    fn test_fallback_preview_counts_characters_not_bytes() {
        let text = "签".repeat(300);
        let reply = ApiReply::from_text(200, &text);
        assert_eq!(reply.body["raw"].as_str().unwrap().chars().count(), RAW_PREVIEW_CHARS);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_credentials() {
        let client = QuarkClient {
            base_url: "http://127.0.0.1:1".to_string(),
            ..QuarkClient::new(Duration::from_secs(5)).unwrap()
        };
        let credentials = Credentials {
            kps: "SECRETKPS".to_string(),
            sign: "SECRETSIGN".to_string(),
            vcode: "SECRETVCODE".to_string(),
        };

        let error = client.growth_info(&credentials, None).await.unwrap_err();
        let reason = error.to_string();

        assert!(matches!(error, crate::error::CheckinError::Transport(_)));
        assert!(!reason.contains("kps="), "{reason}");
        assert!(!reason.contains("SECRETKPS"), "{reason}");
        assert!(!reason.contains("SECRETSIGN"), "{reason}");
    }

    #[test]
    fn test_query_serializes_expected_parameters() {
        let credentials = Credentials {
            kps: "a+b/c==".to_string(),
            sign: "S".to_string(),
            vcode: "V".to_string(),
        };
        let query = GrowthQuery::new(&credentials);
        let value = serde_json::to_value(&query).unwrap();

        assert_eq!(value["pr"], "ucpro");
        assert_eq!(value["fr"], "android");
        assert_eq!(value["kps"], "a+b/c==");
        assert_eq!(value["sign_cyclic"], "true");
        assert!(value["__t"].as_i64().unwrap() > 0);
    }
}
