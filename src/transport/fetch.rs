use super::{PreparedRequest, SliceMode, Transport, TransportKind};
use crate::base::context::HostResultExt;
use crate::base::deadline::run_until_deadline;
use crate::base::neterror::NetError;
use crate::host::{BodyReader, FetchApi, FetchInit, ReadChunk, ReadySignal, SignalSender};
use crate::http::options::header_text;
use crate::http::payload::{Payload, TextDecoder};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// fetch-based transport.
///
/// One fetch call per request. The body is pulled chunk by chunk from the
/// response reader in a spawned task; every chunk is already a delta.
pub struct FetchTransport {
    api: Arc<dyn FetchApi>,
    request: Option<PreparedRequest>,
    headers: Vec<(String, String)>,
    aborted: Arc<AtomicBool>,
    timeout: watch::Sender<Option<Duration>>,
    task: Option<JoinHandle<()>>,
}

impl FetchTransport {
    pub fn new(api: Arc<dyn FetchApi>) -> Self {
        Self {
            api,
            request: None,
            headers: Vec::new(),
            aborted: Arc::new(AtomicBool::new(false)),
            timeout: watch::channel(None).0,
            task: None,
        }
    }
}

impl Transport for FetchTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Fetch
    }

    fn slicing(&self) -> SliceMode {
        SliceMode::Delta
    }

    fn open(&mut self, request: &PreparedRequest) -> Result<(), NetError> {
        self.request = Some(request.clone());
        self.headers.clear();
        self.timeout.send_replace(request.options.timeout);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &Value) {
        let Some(text) = header_text(value) else {
            return;
        };
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), text));
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout.send_replace(Some(timeout));
    }

    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), NetError> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| NetError::Transport("send before open".into()))?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NetError::NoRuntime)?;

        let options = &request.options;
        let init = FetchInit {
            method: options.method.clone(),
            headers: self.headers.clone(),
            mode: options.mode,
            body,
            credentials: options.credentials,
        };
        tracing::debug!(url = %request.url, method = %init.method, "fetch send");

        self.task = Some(runtime.spawn(run_fetch(
            Arc::clone(&self.api),
            request.url.clone(),
            init,
            self.timeout.subscribe(),
            Arc::clone(&self.aborted),
            signals,
        )));
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_fetch(
    api: Arc<dyn FetchApi>,
    url: Url,
    init: FetchInit,
    timeout: watch::Receiver<Option<Duration>>,
    aborted: Arc<AtomicBool>,
    signals: SignalSender,
) {
    let exchange = fetch_exchange(api, url, init, &aborted, &signals);
    let outcome = run_until_deadline(exchange, Instant::now(), timeout)
        .await
        .unwrap_or(Err(NetError::TimedOut));

    let signal = match outcome {
        Ok(Some(status)) => ReadySignal::Completed { status, body: None },
        // Aborted: the owner already knows.
        Ok(None) => return,
        Err(NetError::TimedOut) => ReadySignal::TimedOut,
        Err(e) => ReadySignal::Errored(e),
    };
    let _ = signals.send(signal);
}

/// Returns the status, or `None` when aborted mid-stream.
async fn fetch_exchange(
    api: Arc<dyn FetchApi>,
    url: Url,
    init: FetchInit,
    aborted: &AtomicBool,
    signals: &SignalSender,
) -> Result<Option<u16>, NetError> {
    let response = api.fetch(url, init).await.transport_context("fetch")?;
    let _ = signals.send(ReadySignal::Connected);

    if let Some(reader) = response.body {
        if !pump(reader, aborted, signals).await? {
            return Ok(None);
        }
    }
    Ok(Some(response.status))
}

/// Pull until the reader is done. Returns `false` if aborted first.
async fn pump(
    mut reader: Box<dyn BodyReader>,
    aborted: &AtomicBool,
    signals: &SignalSender,
) -> Result<bool, NetError> {
    let mut decoder = TextDecoder::new();
    loop {
        if aborted.load(Ordering::Acquire) {
            return Ok(false);
        }
        match reader.read().await {
            Ok(ReadChunk::Chunk(bytes)) => {
                let text = decoder.decode(&bytes);
                if !text.is_empty() {
                    let _ = signals.send(ReadySignal::Progress(Payload::Text(text)));
                }
            }
            Ok(ReadChunk::Done) => {
                let tail = decoder.finish();
                if !tail.is_empty() {
                    let _ = signals.send(ReadySignal::Progress(Payload::Text(tail)));
                }
                return Ok(true);
            }
            Err(e) => return Err(NetError::StreamRead(e.to_string())),
        }
    }
}
