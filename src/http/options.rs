//! Request options and process-wide defaults.
//!
//! Options are plain data. Unset fields fall back to the defaults held by
//! the [`RequestContext`](crate::urlrequest::context::RequestContext); the
//! merge happens once, when a request is constructed.

use crate::base::neterror::NetError;
use crate::http::requestbody::RequestBody;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Request mode. Decides the credentials policy when none is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

impl RequestMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMode::Cors => "cors",
            RequestMode::NoCors => "no-cors",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::Navigate => "navigate",
        }
    }
}

/// Credentials mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Include,
    SameOrigin,
    Omit,
}

impl CredentialsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialsMode::Include => "include",
            CredentialsMode::SameOrigin => "same-origin",
            CredentialsMode::Omit => "omit",
        }
    }
}

/// Caller-supplied options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestOptions {
    /// HTTP verb, upper-cased before the transport is opened.
    pub method: Option<String>,
    /// Header name to value. Values may be any JSON value; the transports
    /// decide how non-strings are assigned.
    pub headers: Option<BTreeMap<String, Value>>,
    pub body: Option<RequestBody>,
    pub mode: Option<RequestMode>,
    pub credentials: Option<CredentialsMode>,
    /// Milliseconds. `0` disables the timeout.
    pub timeout: Option<u64>,
    /// Deliver `data` as the response arrives instead of once at the end.
    pub streaming: Option<bool>,
    /// Construct without opening.
    pub manual: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in process defaults: `GET`, `cors`, not streaming, no headers.
    pub fn defaults() -> Self {
        Self {
            method: Some(Method::GET.to_string()),
            headers: Some(BTreeMap::new()),
            mode: Some(RequestMode::Cors),
            streaming: Some(false),
            ..Self::default()
        }
    }

    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::InvalidOptions(e.to_string()))
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn credentials(mut self, credentials: CredentialsMode) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    pub fn manual(mut self, manual: bool) -> Self {
        self.manual = Some(manual);
        self
    }

    /// Fill every unset field from `base`. Set fields win; maps are not
    /// merged key by key.
    pub fn merged_over(&self, base: &RequestOptions) -> RequestOptions {
        RequestOptions {
            method: self.method.clone().or_else(|| base.method.clone()),
            headers: self.headers.clone().or_else(|| base.headers.clone()),
            body: self.body.clone().or_else(|| base.body.clone()),
            mode: self.mode.or(base.mode),
            credentials: self.credentials.or(base.credentials),
            timeout: self.timeout.or(base.timeout),
            streaming: self.streaming.or(base.streaming),
            manual: self.manual.or(base.manual),
        }
    }

    /// Resolve into concrete values for a transport.
    pub fn resolve(&self) -> Result<ResolvedOptions, NetError> {
        let method = self.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| NetError::MethodNotSupported)?;

        Ok(ResolvedOptions {
            method,
            headers: self
                .headers
                .as_ref()
                .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            body: self.body.clone().unwrap_or_default(),
            mode: self.mode.unwrap_or_default(),
            credentials: self.credentials,
            timeout: self.timeout.filter(|ms| *ms > 0).map(Duration::from_millis),
            streaming: self.streaming.unwrap_or(false),
        })
    }
}

/// Options with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub method: Method,
    pub headers: Vec<(String, Value)>,
    pub body: RequestBody,
    pub mode: RequestMode,
    pub credentials: Option<CredentialsMode>,
    pub timeout: Option<Duration>,
    pub streaming: bool,
}

/// Text form of a header value, or `None` when it should not be assigned
/// at all (`null` and empty strings).
pub fn header_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
