//! Native host over hyper.
//!
//! Stands in for a browser when none is present: an XMLHttpRequest-shaped
//! object and a fetch API, both speaking plain HTTP/1.1 through a
//! hyper-util client.

use super::{
    BodyReader, FetchApi, FetchInit, FetchResponse, Host, HostError, HostFuture, ReadChunk,
    ReadySignal, SignalSender, XhrObject,
};
use crate::base::deadline::run_until_deadline;
use crate::base::neterror::NetError;
use crate::http::payload::{Payload, TextDecoder};
use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Method, Request};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Response types the native XHR object accepts.
const RESPONSE_TYPES: &[&str] = &[
    "",
    "text",
    "arraybuffer",
    "moz-chunked-text",
    "moz-chunked-arraybuffer",
];

/// Host backed by a real HTTP client.
///
/// # Example
///
/// ```rust,ignore
/// use requests::host::NativeHost;
/// use requests::urlrequest::context::RequestContext;
///
/// let context = RequestContext::new(NativeHost::new());
/// let req = context.request("http://127.0.0.1:8080/feed", Default::default())?;
/// ```
#[derive(Clone)]
pub struct NativeHost {
    client: HttpClient,
    fetch_enabled: bool,
    document_url: Option<Url>,
}

impl NativeHost {
    /// Host offering both XHR and fetch. The probe will pick fetch.
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            fetch_enabled: true,
            document_url: None,
        }
    }

    /// Host without a fetch API, so requests run over the XHR object.
    pub fn xhr_only() -> Self {
        Self {
            fetch_enabled: false,
            ..Self::new()
        }
    }

    /// Base URL for relative request URLs and same-origin checks.
    pub fn with_document_url(mut self, url: Url) -> Self {
        self.document_url = Some(url);
        self
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHost")
            .field("fetch_enabled", &self.fetch_enabled)
            .field("document_url", &self.document_url)
            .finish_non_exhaustive()
    }
}

impl Host for NativeHost {
    fn create_xhr(&self) -> Result<Box<dyn XhrObject>, HostError> {
        Ok(Box::new(NativeXhr::new(
            self.client.clone(),
            self.document_url.clone(),
        )))
    }

    fn create_active_x(&self, prog_id: &str) -> Result<Box<dyn XhrObject>, HostError> {
        Err(HostError::Unavailable(prog_id.to_owned()))
    }

    fn fetch_api(&self) -> Option<Arc<dyn FetchApi>> {
        if !self.fetch_enabled {
            return None;
        }
        Some(Arc::new(NativeFetch {
            client: self.client.clone(),
        }))
    }

    fn document_url(&self) -> Option<Url> {
        self.document_url.clone()
    }
}

fn build_request(
    method: &Method,
    url: &Url,
    headers: &[(HeaderName, HeaderValue)],
    body: Option<Payload>,
) -> Result<Request<Full<Bytes>>, HostError> {
    let mut builder = Request::builder().method(method.clone()).uri(url.as_str());
    for (name, value) in headers {
        builder = builder.header(name.clone(), value.clone());
    }
    let body = body.map(Payload::into_bytes).unwrap_or_default();
    builder
        .body(Full::new(body))
        .map_err(|e| HostError::InvalidState(e.to_string()))
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HostError> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| HostError::TypeMismatch)?;
    let value = HeaderValue::from_str(value).map_err(|_| HostError::TypeMismatch)?;
    Ok((name, value))
}

/// XMLHttpRequest emulation. Every body frame raises a progress signal
/// carrying the whole response received so far.
struct NativeXhr {
    client: HttpClient,
    base: Option<Url>,
    method: Method,
    url: Option<Url>,
    headers: Vec<(HeaderName, HeaderValue)>,
    response_type: String,
    /// Changeable after send, like a browser XHR.
    timeout: watch::Sender<Option<Duration>>,
    with_credentials: bool,
    task: Option<JoinHandle<()>>,
}

impl NativeXhr {
    fn new(client: HttpClient, base: Option<Url>) -> Self {
        Self {
            client,
            base,
            method: Method::GET,
            url: None,
            headers: Vec::new(),
            response_type: String::new(),
            timeout: watch::channel(None).0,
            with_credentials: false,
            task: None,
        }
    }

    fn ensure_unsent(&self) -> Result<(), HostError> {
        if self.url.is_none() {
            return Err(HostError::InvalidState("not opened".into()));
        }
        if self.task.is_some() {
            return Err(HostError::InvalidState("already sent".into()));
        }
        Ok(())
    }
}

impl XhrObject for NativeXhr {
    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<(), HostError> {
        if !is_async {
            return Err(HostError::NotSupported("synchronous requests".into()));
        }
        self.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| HostError::InvalidState(format!("bad method {method}")))?;
        // Relative URLs resolve against the document, or localhost without one.
        let base = self
            .base
            .clone()
            .or_else(|| Url::parse("http://localhost/").ok());
        let url = Url::options()
            .base_url(base.as_ref())
            .parse(url)
            .map_err(|e| HostError::InvalidState(e.to_string()))?;
        self.url = Some(url);
        self.headers.clear();
        self.response_type.clear();
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &Value) -> Result<(), HostError> {
        self.ensure_unsent()?;
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let (name, value) = parse_header(name, &text)?;
        // A later assignment replaces an earlier one.
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value));
        Ok(())
    }

    fn set_response_type(&mut self, response_type: &str) -> Result<(), HostError> {
        self.ensure_unsent()?;
        if !RESPONSE_TYPES.contains(&response_type) {
            return Err(HostError::NotSupported(response_type.to_owned()));
        }
        self.response_type = response_type.to_owned();
        Ok(())
    }

    fn response_type(&self) -> String {
        self.response_type.clone()
    }

    fn supports_credentials(&self) -> bool {
        true
    }

    fn set_with_credentials(&mut self, include: bool) -> Result<(), HostError> {
        // No cookie jar natively; the flag is recorded only.
        self.with_credentials = include;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), HostError> {
        self.timeout.send_replace(Some(timeout));
        Ok(())
    }

    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), HostError> {
        self.ensure_unsent()?;
        let url = self
            .url
            .clone()
            .ok_or_else(|| HostError::InvalidState("not opened".into()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| HostError::InvalidState("no async runtime".into()))?;

        let request = build_request(&self.method, &url, &self.headers, body)?;
        let binary = self.response_type.ends_with("arraybuffer");
        tracing::debug!(
            url = %url,
            method = %self.method,
            with_credentials = self.with_credentials,
            "native xhr send"
        );

        self.task = Some(runtime.spawn(run_xhr(
            self.client.clone(),
            request,
            binary,
            self.timeout.subscribe(),
            signals,
        )));
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_xhr(
    client: HttpClient,
    request: Request<Full<Bytes>>,
    binary: bool,
    timeout: watch::Receiver<Option<Duration>>,
    signals: SignalSender,
) {
    let exchange = xhr_exchange(client, request, binary, &signals);
    let outcome = run_until_deadline(exchange, Instant::now(), timeout)
        .await
        .unwrap_or(Err(HostError::TimedOut));

    let signal = match outcome {
        Ok((status, body)) => ReadySignal::Completed {
            status,
            body: Some(body),
        },
        Err(HostError::TimedOut) => ReadySignal::TimedOut,
        Err(e) => ReadySignal::Errored(NetError::Transport(e.to_string())),
    };
    let _ = signals.send(signal);
}

async fn xhr_exchange(
    client: HttpClient,
    request: Request<Full<Bytes>>,
    binary: bool,
    signals: &SignalSender,
) -> Result<(u16, Payload), HostError> {
    let response = client
        .request(request)
        .await
        .map_err(|e| HostError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    let _ = signals.send(ReadySignal::Connected);

    let mut body = response.into_body();
    let mut raw = BytesMut::new();
    let mut decoder = TextDecoder::new();
    let mut text = String::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| HostError::Network(e.to_string()))?;
        let Ok(data) = frame.into_data() else {
            continue;
        };
        if data.is_empty() {
            continue;
        }

        let snapshot = if binary {
            raw.extend_from_slice(&data);
            Payload::Binary(raw.clone().freeze())
        } else {
            text.push_str(&decoder.decode(&data));
            Payload::Text(text.clone())
        };
        let _ = signals.send(ReadySignal::Progress(snapshot));
    }

    let body = if binary {
        Payload::Binary(raw.freeze())
    } else {
        text.push_str(&decoder.finish());
        Payload::Text(text)
    };
    Ok((status, body))
}

/// fetch over the same client. Bodies are read frame by frame.
struct NativeFetch {
    client: HttpClient,
}

impl FetchApi for NativeFetch {
    fn supports_readable_stream(&self) -> bool {
        true
    }

    fn fetch(&self, url: Url, init: FetchInit) -> HostFuture<'static, FetchResponse> {
        let client = self.client.clone();
        Box::pin(async move {
            let headers = init
                .headers
                .iter()
                .map(|(name, value)| parse_header(name, value))
                .collect::<Result<Vec<_>, _>>()?;
            let request = build_request(&init.method, &url, &headers, init.body)?;
            tracing::debug!(
                url = %url,
                mode = init.mode.as_str(),
                credentials = init.credentials.map(|c| c.as_str()),
                "native fetch"
            );

            let response = client
                .request(request)
                .await
                .map_err(|e| HostError::Network(e.to_string()))?;
            let status = response.status().as_u16();
            let reader: Box<dyn BodyReader> = Box::new(IncomingReader {
                body: response.into_body(),
            });

            Ok(FetchResponse {
                status,
                body: Some(reader),
            })
        })
    }
}

struct IncomingReader {
    body: Incoming,
}

impl BodyReader for IncomingReader {
    fn read(&mut self) -> HostFuture<'_, ReadChunk> {
        Box::pin(async move {
            while let Some(frame) = self.body.frame().await {
                let frame = frame.map_err(|e| HostError::Network(e.to_string()))?;
                if let Ok(data) = frame.into_data() {
                    if !data.is_empty() {
                        return Ok(ReadChunk::Chunk(data));
                    }
                }
            }
            Ok(ReadChunk::Done)
        })
    }
}
