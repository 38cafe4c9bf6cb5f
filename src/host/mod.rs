//! Host Environment Module
//!
//! The transports never construct network objects themselves. They ask a
//! [`Host`] for one of three collaborator shapes:
//! - a classic XMLHttpRequest-style object ([`XhrObject`])
//! - a legacy ActiveX-style object (same shape, created by program id)
//! - a fetch API with readable-stream bodies ([`FetchApi`])
//!
//! # Architecture
//!
//! Host objects report progress by pushing [`ReadySignal`]s into the
//! channel handed to `send`. This mirrors the classic readiness events:
//! connection established, chunk received, completed, timed out, errored.
//!
//! [`NativeHost`] implements all of this over hyper for processes that are
//! not running inside a browser.

mod native;

pub use native::NativeHost;

use crate::base::neterror::NetError;
use crate::http::options::{CredentialsMode, RequestMode};
use crate::http::payload::Payload;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

/// Failure reported by a host object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("constructor unavailable: {0}")]
    Unavailable(String),
    #[error("type mismatch")]
    TypeMismatch,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out")]
    TimedOut,
}

/// Readiness notification raised by a host object.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadySignal {
    /// Response headers arrived.
    Connected,
    /// More of the response arrived. Cumulative or delta, depending on the
    /// transport mode.
    Progress(Payload),
    /// The exchange finished. `body` is the full response for transports
    /// that expose one.
    Completed { status: u16, body: Option<Payload> },
    TimedOut,
    Errored(NetError),
}

pub type SignalSender = mpsc::UnboundedSender<ReadySignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<ReadySignal>;

/// Future returned by host objects.
pub type HostFuture<'a, T> = BoxFuture<'a, Result<T, HostError>>;

/// An XMLHttpRequest-shaped object, classic or ActiveX.
///
/// Header values arrive untyped; objects that only accept strings report
/// [`HostError::TypeMismatch`].
pub trait XhrObject: Send {
    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<(), HostError>;

    fn set_request_header(&mut self, name: &str, value: &Value) -> Result<(), HostError>;

    /// Only valid after `open`.
    fn set_response_type(&mut self, response_type: &str) -> Result<(), HostError>;

    fn response_type(&self) -> String;

    /// Whether the object exposes a `response` property at all.
    fn has_response(&self) -> bool {
        true
    }

    /// Whether the object exposes a `withCredentials` flag.
    fn supports_credentials(&self) -> bool {
        false
    }

    fn set_with_credentials(&mut self, _include: bool) -> Result<(), HostError> {
        Err(HostError::NotSupported("withCredentials".into()))
    }

    /// Whether the object can deliver multipart responses natively, each
    /// part as its own progress signal.
    fn supports_multipart(&self) -> bool {
        false
    }

    fn set_multipart(&mut self, _enabled: bool) -> Result<(), HostError> {
        Err(HostError::NotSupported("multipart".into()))
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), HostError> {
        Err(HostError::NotSupported("timeout".into()))
    }

    /// Start the exchange. Returns immediately; progress arrives on `signals`.
    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), HostError>;

    fn abort(&mut self);
}

/// Settings for a single fetch call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchInit {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub mode: RequestMode,
    pub body: Option<Payload>,
    pub credentials: Option<CredentialsMode>,
}

/// One read from a body reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    Chunk(Bytes),
    Done,
}

/// Pull-based reader over a response body.
pub trait BodyReader: Send {
    fn read(&mut self) -> HostFuture<'_, ReadChunk>;
}

/// A fetch response whose body is read through a [`BodyReader`].
pub struct FetchResponse {
    pub status: u16,
    pub body: Option<Box<dyn BodyReader>>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

pub trait FetchApi: Send + Sync {
    /// Whether response bodies expose a stream reader.
    fn supports_readable_stream(&self) -> bool;

    fn fetch(&self, url: Url, init: FetchInit) -> HostFuture<'static, FetchResponse>;
}

/// The environment requests run in.
///
/// Each constructor may fail; the capability probe treats failure as
/// "transport not present".
pub trait Host: Send + Sync {
    fn create_xhr(&self) -> Result<Box<dyn XhrObject>, HostError>;

    fn create_active_x(&self, prog_id: &str) -> Result<Box<dyn XhrObject>, HostError>;

    fn fetch_api(&self) -> Option<Arc<dyn FetchApi>>;

    /// URL of the document requests are made from. Used to resolve relative
    /// URLs and for the same-origin credentials check.
    fn document_url(&self) -> Option<Url> {
        None
    }
}

/// Blanket implementation for Arc-wrapped hosts.
impl<H: Host + ?Sized> Host for Arc<H> {
    fn create_xhr(&self) -> Result<Box<dyn XhrObject>, HostError> {
        (**self).create_xhr()
    }

    fn create_active_x(&self, prog_id: &str) -> Result<Box<dyn XhrObject>, HostError> {
        (**self).create_active_x(prog_id)
    }

    fn fetch_api(&self) -> Option<Arc<dyn FetchApi>> {
        (**self).fetch_api()
    }

    fn document_url(&self) -> Option<Url> {
        (**self).document_url()
    }
}
