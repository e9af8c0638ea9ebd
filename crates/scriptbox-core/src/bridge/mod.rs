//! Network bridge: outbound HTTP on behalf of a running script.
//!
//! Every request leaving the sandbox is tagged with the identities of the
//! message author and the script author plus the originating guild. Those
//! headers are written last, so a script cannot spoof them by passing its own
//! values under the same names. Response bodies are capped at
//! [`crate::config::MAX_RESPONSE_BYTES`] by default.
//!
//! # Modules
//!
//! - [`error`]: `BridgeError` / `BridgeResult`
//! - [`host`]: the `get_internal` / `post_internal` interpreter functions

pub mod error;
pub mod host;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{RequestBuilder, Response, Url};

use crate::config::SandboxConfig;
use crate::identity;
use crate::metrics::METRICS;
use crate::obs;
use crate::request::InvocationRequest;
use crate::supervisor::CancelFlag;

pub use error::{BridgeError, BridgeResult};

/// Serialized projection of the message author.
pub const AUTHOR_HEADER: &str = "x-arch-author";
/// Serialized projection of the script author.
pub const SCRIPT_AUTHOR_HEADER: &str = "x-arch-script-author";
/// Originating guild id, decimal.
pub const GUILD_HEADER: &str = "x-arch-guild";

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain";

/// What a bridge call hands back to the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResponse {
    pub status: u16,
    /// At most `max_response_bytes` of the body, lossily decoded as UTF-8.
    /// A character split by the cap is dropped whole.
    pub body: String,
    /// Any `Content-Type` value contained `application/json`.
    pub is_json: bool,
}

impl BridgeResponse {
    /// The `(status, body, is_json)` tuple returned to the script.
    pub fn into_tuple(self) -> (i32, String, bool) {
        (i32::from(self.status), self.body, self.is_json)
    }
}

/// Body of an outbound POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostBody {
    Empty,
    /// Sent as `text/plain`.
    Text(String),
    /// Already-encoded JSON, sent as `application/json`.
    Json(String),
}

impl PostBody {
    fn content_type(&self) -> Option<&'static str> {
        match self {
            PostBody::Empty => None,
            PostBody::Text(_) => Some(TEXT_CONTENT_TYPE),
            PostBody::Json(_) => Some(JSON_CONTENT_TYPE),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            PostBody::Empty => Vec::new(),
            PostBody::Text(s) | PostBody::Json(s) => s.into_bytes(),
        }
    }
}

/// Per-invocation HTTP mediator.
///
/// Holds the request it tags outbound calls with; the script never sees this
/// binding, only the narrow `get_internal`/`post_internal` signatures.
#[derive(Debug, Clone)]
pub struct NetworkBridge {
    client: reqwest::Client,
    request: Arc<InvocationRequest>,
    max_response_bytes: usize,
    user_agent: String,
    cancel: CancelFlag,
}

impl NetworkBridge {
    pub fn new(
        client: reqwest::Client,
        request: Arc<InvocationRequest>,
        config: &SandboxConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            client,
            request,
            max_response_bytes: config.max_response_bytes,
            user_agent: config.user_agent.clone(),
            cancel,
        }
    }

    /// Issue a GET with optional caller headers.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> BridgeResult<BridgeResponse> {
        let url = parse_url(url)?;
        let headers = self.outbound_headers(headers, None)?;
        self.dispatch("GET", self.client.get(url).headers(headers)).await
    }

    /// Issue a POST; `body` decides the content type.
    pub async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: PostBody,
    ) -> BridgeResult<BridgeResponse> {
        let url = parse_url(url)?;
        let headers = self.outbound_headers(headers, body.content_type())?;
        let builder = self
            .client
            .post(url)
            .headers(headers)
            .body(body.into_bytes());
        self.dispatch("POST", builder).await
    }

    /// Caller headers, then content type, then the mandatory tagging headers.
    /// `insert` replaces, so later entries win over caller values.
    fn outbound_headers(
        &self,
        caller: &[(String, String)],
        content_type: Option<&'static str>,
    ) -> BridgeResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in caller {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                BridgeError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header, header_value(name, value)?);
        }

        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        let author = identity::project(&self.request.message_author)?;
        let script_author = identity::project(&self.request.script_author)?;
        headers.insert(
            HeaderName::from_static(AUTHOR_HEADER),
            header_value(AUTHOR_HEADER, &author)?,
        );
        headers.insert(
            HeaderName::from_static(SCRIPT_AUTHOR_HEADER),
            header_value(SCRIPT_AUTHOR_HEADER, &script_author)?,
        );
        headers.insert(
            HeaderName::from_static(GUILD_HEADER),
            HeaderValue::from(self.request.guild_id),
        );
        headers.insert(USER_AGENT, header_value("user-agent", &self.user_agent)?);
        Ok(headers)
    }

    async fn dispatch(
        &self,
        method: &'static str,
        builder: RequestBuilder,
    ) -> BridgeResult<BridgeResponse> {
        if self.cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let is_json = response
            .headers()
            .get_all(CONTENT_TYPE)
            .iter()
            .any(|value| String::from_utf8_lossy(value.as_bytes()).contains(JSON_CONTENT_TYPE));
        let body = read_capped(&mut response, self.max_response_bytes).await?;

        METRICS.inc_bridge_requests();
        obs::emit_bridge_request(method, &url, status, body.len());

        Ok(BridgeResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
            is_json,
        })
    }
}

fn parse_url(raw: &str) -> BridgeResult<Url> {
    let url = Url::parse(raw).map_err(|e| BridgeError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BridgeError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn header_value(name: &str, value: &str) -> BridgeResult<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes()).map_err(|e| BridgeError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Read at most `limit` body bytes and drop the rest of the stream.
async fn read_capped(response: &mut Response, limit: usize) -> BridgeResult<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = limit - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            body.truncate(complete_prefix_len(&body));
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Length of `bytes` without a trailing UTF-8 sequence that was cut short.
/// Invalid bytes anywhere else are left for lossy decoding.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    // A cut sequence leaves a lead byte and at most two continuation bytes.
    for back in 1..=bytes.len().min(3) {
        let at = bytes.len() - back;
        let byte = bytes[at];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { at } else { bytes.len() };
    }
    bytes.len()
}
