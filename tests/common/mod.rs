//! Scripted host environment for integration tests.
//!
//! Every XHR-shaped object the host creates logs what was done to it, and
//! replays a fixed list of readiness signals when sent.

#![allow(dead_code)]

use requests::host::{
    BodyReader, FetchApi, FetchInit, FetchResponse, Host, HostError, HostFuture, ReadChunk,
    ReadySignal, SignalSender, XhrObject,
};
use requests::http::Payload;
use requests::urlrequest::Event;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub const ALL_RESPONSE_TYPES: [&str; 9] = [
    "arraybuffer",
    "blob",
    "document",
    "json",
    "text",
    "moz-blob",
    "moz-chunked-text",
    "moz-chunked-arraybuffer",
    "ms-stream",
];

/// What happened to one fake XHR object.
#[derive(Debug, Default)]
pub struct XhrLog {
    pub prog_id: Option<String>,
    pub opened: Option<(String, String)>,
    pub headers: Vec<(String, Value)>,
    /// Headers refused because the object had already sent.
    pub refused_headers: Vec<String>,
    pub response_types: Vec<String>,
    pub multipart: bool,
    pub with_credentials: Option<bool>,
    pub timeout: Option<Duration>,
    pub body: Option<Payload>,
    pub sent: bool,
    pub aborted: bool,
    /// Sender kept for tests that push signals by hand.
    pub held: Option<SignalSender>,
}

#[derive(Clone, Default)]
struct XhrBehavior {
    response_types: Vec<&'static str>,
    failing_type: Option<&'static str>,
    multipart: bool,
    strings_only: bool,
    credentials: bool,
    script: Vec<ReadySignal>,
    hold: bool,
}

struct FakeXhr {
    behavior: XhrBehavior,
    log: Arc<Mutex<XhrLog>>,
    response_type: String,
    opened: bool,
}

impl XhrObject for FakeXhr {
    fn open(&mut self, method: &str, url: &str, _is_async: bool) -> Result<(), HostError> {
        self.opened = true;
        self.log.lock().unwrap().opened = Some((method.to_owned(), url.to_owned()));
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &Value) -> Result<(), HostError> {
        if !self.opened {
            return Err(HostError::InvalidState("not opened".into()));
        }
        let mut log = self.log.lock().unwrap();
        if log.sent {
            log.refused_headers.push(name.to_owned());
            return Err(HostError::InvalidState("already sent".into()));
        }
        if self.behavior.strings_only && !value.is_string() {
            return Err(HostError::TypeMismatch);
        }
        log.headers.push((name.to_owned(), value.clone()));
        Ok(())
    }

    fn set_response_type(&mut self, response_type: &str) -> Result<(), HostError> {
        if !self.opened {
            return Err(HostError::InvalidState("not opened".into()));
        }
        if self.behavior.failing_type == Some(response_type) {
            return Err(HostError::NotSupported(response_type.to_owned()));
        }
        // Unknown types are ignored silently, as browsers do.
        if self.behavior.response_types.contains(&response_type) {
            self.response_type = response_type.to_owned();
            self.log
                .lock()
                .unwrap()
                .response_types
                .push(response_type.to_owned());
        }
        Ok(())
    }

    fn response_type(&self) -> String {
        self.response_type.clone()
    }

    fn supports_credentials(&self) -> bool {
        self.behavior.credentials
    }

    fn set_with_credentials(&mut self, include: bool) -> Result<(), HostError> {
        self.log.lock().unwrap().with_credentials = Some(include);
        Ok(())
    }

    fn supports_multipart(&self) -> bool {
        self.behavior.multipart
    }

    fn set_multipart(&mut self, enabled: bool) -> Result<(), HostError> {
        if !self.behavior.multipart {
            return Err(HostError::NotSupported("multipart".into()));
        }
        self.log.lock().unwrap().multipart = enabled;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), HostError> {
        self.log.lock().unwrap().timeout = Some(timeout);
        Ok(())
    }

    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), HostError> {
        let mut log = self.log.lock().unwrap();
        log.body = body;
        log.sent = true;
        for signal in &self.behavior.script {
            let _ = signals.send(signal.clone());
        }
        if self.behavior.hold {
            log.held = Some(signals);
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }
}

struct ScriptedReader {
    reads: VecDeque<Result<ReadChunk, HostError>>,
}

impl BodyReader for ScriptedReader {
    fn read(&mut self) -> HostFuture<'_, ReadChunk> {
        let next = self.reads.pop_front().unwrap_or(Ok(ReadChunk::Done));
        Box::pin(async move { next })
    }
}

struct FakeFetch {
    readable_stream: bool,
    failure: Option<HostError>,
    status: u16,
    reads: Vec<Result<ReadChunk, HostError>>,
    calls: Arc<Mutex<Vec<(Url, FetchInit)>>>,
}

impl FetchApi for FakeFetch {
    fn supports_readable_stream(&self) -> bool {
        self.readable_stream
    }

    fn fetch(&self, url: Url, init: FetchInit) -> HostFuture<'static, FetchResponse> {
        self.calls.lock().unwrap().push((url, init));
        let status = self.status;
        let reads = self.reads.clone();
        let failure = self.failure.clone();
        Box::pin(async move {
            if let Some(error) = failure {
                return Err(error);
            }
            Ok(FetchResponse {
                status,
                body: Some(Box::new(ScriptedReader {
                    reads: reads.into(),
                }) as Box<dyn BodyReader>),
            })
        })
    }
}

/// A host whose transports are scripted.
#[derive(Default)]
pub struct FixtureHost {
    xhr: bool,
    active_x: Vec<&'static str>,
    fetch: Option<(bool, Vec<Result<ReadChunk, HostError>>)>,
    fetch_failure: Option<HostError>,
    behavior: XhrBehavior,
    document_url: Option<Url>,
    pub xhrs: Mutex<Vec<Arc<Mutex<XhrLog>>>>,
    pub active_x_attempts: Mutex<Vec<String>>,
    pub fetches: Arc<Mutex<Vec<(Url, FetchInit)>>>,
}

impl FixtureHost {
    /// No transport at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classic XMLHttpRequest.
    pub fn xhr() -> Self {
        Self {
            xhr: true,
            behavior: XhrBehavior {
                credentials: true,
                ..XhrBehavior::default()
            },
            ..Self::default()
        }
    }

    /// ActiveX objects for the given program ids. They accept only string
    /// header values.
    pub fn active_x(ids: &[&'static str]) -> Self {
        Self {
            active_x: ids.to_vec(),
            behavior: XhrBehavior {
                strings_only: true,
                ..XhrBehavior::default()
            },
            ..Self::default()
        }
    }

    /// fetch with a readable-stream body yielding `chunks`.
    pub fn fetch(chunks: &[&[u8]]) -> Self {
        let reads = chunks
            .iter()
            .map(|c| Ok(ReadChunk::Chunk(bytes::Bytes::copy_from_slice(c))))
            .collect();
        Self {
            fetch: Some((true, reads)),
            ..Self::default()
        }
    }

    /// fetch whose reader follows `reads` exactly.
    pub fn fetch_reads(reads: Vec<Result<ReadChunk, HostError>>) -> Self {
        Self {
            fetch: Some((true, reads)),
            ..Self::default()
        }
    }

    /// fetch whose call itself rejects with `error`.
    pub fn fetch_rejecting(error: HostError) -> Self {
        Self {
            fetch: Some((true, Vec::new())),
            fetch_failure: Some(error),
            ..Self::default()
        }
    }

    pub fn with_xhr(mut self) -> Self {
        self.xhr = true;
        self.behavior.credentials = true;
        self
    }

    /// fetch exists but its bodies have no stream reader.
    pub fn with_plain_fetch(mut self) -> Self {
        self.fetch = Some((false, Vec::new()));
        self
    }

    pub fn with_response_types(mut self, types: &[&'static str]) -> Self {
        self.behavior.response_types = types.to_vec();
        self
    }

    pub fn with_failing_type(mut self, response_type: &'static str) -> Self {
        self.behavior.failing_type = Some(response_type);
        self
    }

    pub fn with_multipart(mut self) -> Self {
        self.behavior.multipart = true;
        self
    }

    /// Signals replayed by every object on `send`.
    pub fn with_script(mut self, script: Vec<ReadySignal>) -> Self {
        self.behavior.script = script;
        self
    }

    /// Keep the signal sender after the script ran.
    pub fn holding(mut self) -> Self {
        self.behavior.hold = true;
        self
    }

    pub fn with_document_url(mut self, url: &str) -> Self {
        self.document_url = Some(Url::parse(url).unwrap());
        self
    }

    pub fn xhr_count(&self) -> usize {
        self.xhrs.lock().unwrap().len()
    }

    /// Log of the most recently created object.
    pub fn last_xhr(&self) -> Arc<Mutex<XhrLog>> {
        Arc::clone(self.xhrs.lock().unwrap().last().expect("no xhr created"))
    }

    fn create(&self, prog_id: Option<&str>) -> Box<dyn XhrObject> {
        let log = Arc::new(Mutex::new(XhrLog {
            prog_id: prog_id.map(str::to_owned),
            ..XhrLog::default()
        }));
        self.xhrs.lock().unwrap().push(Arc::clone(&log));
        Box::new(FakeXhr {
            behavior: self.behavior.clone(),
            log,
            response_type: String::new(),
            opened: false,
        })
    }
}

impl Host for FixtureHost {
    fn create_xhr(&self) -> Result<Box<dyn XhrObject>, HostError> {
        if !self.xhr {
            return Err(HostError::Unavailable("XMLHttpRequest".into()));
        }
        Ok(self.create(None))
    }

    fn create_active_x(&self, prog_id: &str) -> Result<Box<dyn XhrObject>, HostError> {
        self.active_x_attempts
            .lock()
            .unwrap()
            .push(prog_id.to_owned());
        if !self.active_x.contains(&prog_id) {
            return Err(HostError::Unavailable(prog_id.to_owned()));
        }
        Ok(self.create(Some(prog_id)))
    }

    fn fetch_api(&self) -> Option<Arc<dyn FetchApi>> {
        let (readable_stream, reads) = self.fetch.clone()?;
        Some(Arc::new(FakeFetch {
            readable_stream,
            failure: self.fetch_failure.clone(),
            status: 200,
            reads,
            calls: Arc::clone(&self.fetches),
        }))
    }

    fn document_url(&self) -> Option<Url> {
        self.document_url.clone()
    }
}

pub fn progress(text: &str) -> ReadySignal {
    ReadySignal::Progress(Payload::from(text))
}

pub fn completed(status: u16, body: &str) -> ReadySignal {
    ReadySignal::Completed {
        status,
        body: Some(Payload::from(body)),
    }
}

/// Events up to and including `end`, or until the channel closes.
pub async fn collect_until_end(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            let end = matches!(event, Event::End(_));
            events.push(event);
            if end {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for end: {events:?}");
    events
}

/// Text of every `data` event, in order.
pub fn data_chunks(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Data(payload) => Some(String::from_utf8_lossy(payload.as_bytes()).into_owned()),
            _ => None,
        })
        .collect()
}
