//! Proxy request model and validation.
//!
//! # Responsibilities
//! - Define the JSON payload accepted by `POST /proxy`
//! - Validate method, URL, timeout, headers, query and body shape
//! - Produce the sanitized `OutboundRequest` for the transport
//!
//! # Design Decisions
//! - Validation happens before any security state is touched
//! - `json` and `data` are mutually exclusive; the internal `Body` variant
//!   makes the ambiguous both-present case unrepresentable

use std::collections::BTreeMap;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::ProxyError;
use crate::forward::upstream::{Body, OutboundRequest};
use crate::security::headers::sanitize_headers;

pub const MIN_TIMEOUT_SECS: f64 = 0.1;
pub const MAX_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_TIMEOUT_SECS: f64 = 15.0;

/// Methods the proxy will forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl From<ProxyMethod> for Method {
    fn from(method: ProxyMethod) -> Self {
        match method {
            ProxyMethod::Get => Method::GET,
            ProxyMethod::Post => Method::POST,
            ProxyMethod::Put => Method::PUT,
            ProxyMethod::Patch => Method::PATCH,
            ProxyMethod::Delete => Method::DELETE,
            ProxyMethod::Head => Method::HEAD,
            ProxyMethod::Options => Method::OPTIONS,
        }
    }
}

/// Raw request body: a string sent verbatim, or a flat object sent as a form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawData {
    Text(String),
    Form(Map<String, Value>),
}

/// Payload of `POST /proxy`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub method: ProxyMethod,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, rename = "json", skip_serializing_if = "Option::is_none")]
    pub json_body: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RawData>,

    /// Seconds, within `[0.1, 120]`.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProxyRequest {
    /// A `GET` to `url` with defaults for everything else.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: ProxyMethod::Get,
            url: url.into(),
            params: None,
            headers: None,
            json_body: None,
            data: None,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Validate and convert into the outbound request.
    pub fn into_outbound(self) -> Result<OutboundRequest, ProxyError> {
        let timeout = parse_timeout(self.timeout)?;
        let url = parse_target_url(&self.url)?;
        let query = match self.params {
            Some(params) => encode_pairs(params, "params")?,
            None => Vec::new(),
        };
        let headers = match self.headers {
            Some(headers) => sanitize_headers(&headers)?,
            None => Default::default(),
        };
        let body = select_body(self.json_body, self.data)?;

        Ok(OutboundRequest {
            method: self.method.into(),
            url,
            query,
            headers,
            body,
            timeout,
        })
    }
}

fn parse_timeout(secs: f64) -> Result<Duration, ProxyError> {
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ProxyError::BadRequest(format!(
            "timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_target_url(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw).map_err(|e| ProxyError::BadRequest(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::BadRequest(
            "URL scheme must be http or https".to_string(),
        ));
    }
    if url.host().is_none() {
        return Err(ProxyError::BadRequest("URL must include a host".to_string()));
    }
    Ok(url)
}

fn select_body(json: Option<Value>, data: Option<RawData>) -> Result<Body, ProxyError> {
    match (json, data) {
        (Some(_), Some(_)) => Err(ProxyError::BadRequest(
            "json and data are mutually exclusive".to_string(),
        )),
        (Some(value), None) => Ok(Body::Json(value)),
        (None, Some(RawData::Text(text))) => Ok(Body::Raw(Bytes::from(text))),
        (None, Some(RawData::Form(fields))) => Ok(Body::Form(encode_pairs(fields, "data")?)),
        (None, None) => Ok(Body::Empty),
    }
}

/// Flatten a JSON object into key/value pairs the way query strings and
/// forms are conventionally encoded: arrays repeat the key, `null` becomes
/// an empty value.
fn encode_pairs(
    fields: Map<String, Value>,
    field: &str,
) -> Result<Vec<(String, String)>, ProxyError> {
    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    let item = scalar_to_string(item).ok_or_else(|| nested(field, &key))?;
                    pairs.push((key.clone(), item));
                }
            }
            other => {
                let other = scalar_to_string(other).ok_or_else(|| nested(field, &key))?;
                pairs.push((key, other));
            }
        }
    }
    Ok(pairs)
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn nested(field: &str, key: &str) -> ProxyError {
    ProxyError::BadRequest(format!("{field}.{key} must be a scalar or a list of scalars"))
}
