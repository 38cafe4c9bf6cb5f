use crate::base::loadstate::RequestState;
use crate::base::neterror::NetError;
use crate::host::{ReadySignal, SignalReceiver};
use crate::http::options::RequestOptions;
use crate::transport::{PreparedRequest, Transport, TransportKind};
use crate::urlrequest::delivery::DeliveryEngine;
use crate::urlrequest::events::{Event, EventChannel, EventKind};
use crate::urlrequest::registry::ActiveRegistry;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Applied before caller headers so simple requests skip the CORS preflight.
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// One HTTP exchange.
///
/// A cheap handle: clones share the same request. Created by
/// [`RequestContext::request`](crate::urlrequest::context::RequestContext::request).
///
/// Notifications arrive in the order `before`, `send`, `stream`/`data`,
/// an optional `error`, then `end`. `destroy` may interrupt at any point.
///
/// A request opened on construction may publish before the caller has
/// subscribed. Nothing is lost: see [`EventChannel`] for how unobserved
/// notifications are held.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    url: Url,
    document_url: Option<Url>,
    registry: ActiveRegistry,
    events: EventChannel,
    shared: Mutex<Shared>,
}

struct Shared {
    state: RequestState,
    options: RequestOptions,
    headers: Vec<(String, Value)>,
    timeout: Option<Duration>,
    transport: Option<Box<dyn Transport>>,
    driver: Option<JoinHandle<()>>,
    status: Option<u16>,
    offset: usize,
}

impl Request {
    pub(crate) fn new(
        id: u64,
        url: Url,
        document_url: Option<Url>,
        options: RequestOptions,
        transport: Box<dyn Transport>,
        registry: ActiveRegistry,
    ) -> Self {
        let state = if options.manual.unwrap_or(false) {
            RequestState::Pending
        } else {
            RequestState::Constructed
        };
        Self {
            inner: Arc::new(Inner {
                id,
                url,
                document_url,
                registry,
                events: EventChannel::new(),
                shared: Mutex::new(Shared {
                    state,
                    options,
                    headers: Vec::new(),
                    timeout: None,
                    transport: Some(transport),
                    driver: None,
                    status: None,
                    offset: 0,
                }),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Always `true`: a request is a source of data.
    pub fn readable(&self) -> bool {
        true
    }

    /// Always `false`: a request is never a sink.
    pub fn writable(&self) -> bool {
        false
    }

    pub fn state(&self) -> RequestState {
        self.inner.lock().state
    }

    /// Response status after completion, with legacy codes remapped.
    pub fn status(&self) -> Option<u16> {
        self.inner.lock().status
    }

    /// Bytes delivered through `data` so far.
    pub fn offset(&self) -> usize {
        self.inner.lock().offset
    }

    /// Subscribe to one kind of notification.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, listener);
        self
    }

    /// Every notification from now on, as an async stream.
    pub fn events(&self) -> mpsc::UnboundedReceiver<Event> {
        self.inner.events.receiver()
    }

    /// Set a request header.
    ///
    /// Queued until open. From a `before` listener it still reaches the
    /// transport ahead of the body; after that the transport may refuse it,
    /// and a refusal is logged and dropped.
    pub fn header(&self, name: impl Into<String>, value: impl Into<Value>) -> &Self {
        let (name, value) = (name.into(), value.into());
        let mut guard = self.inner.lock();
        let shared = &mut *guard;
        if shared.state.is_terminal() {
            return self;
        }
        match shared.transport.as_mut() {
            Some(transport) if !shared.state.can_open() => transport.set_header(&name, &value),
            _ => shared.headers.push((name, value)),
        }
        self
    }

    /// Limit how long the exchange may take, counted from when the body was
    /// sent.
    ///
    /// Before open this takes precedence over the `timeout` option. Once
    /// open the limit goes straight to the transport.
    pub fn timeout(&self, timeout: Duration) -> &Self {
        let mut shared = self.inner.lock();
        if shared.state.is_terminal() {
            return self;
        }
        shared.timeout = Some(timeout);
        if !shared.state.can_open() {
            if let Some(transport) = shared.transport.as_mut() {
                transport.set_timeout(timeout);
            }
        }
        self
    }

    /// Open the transport, publish `before`, then send.
    ///
    /// `options` are merged over the ones given at construction. A request
    /// opens once: a second call fails with [`NetError::AlreadyOpened`].
    /// Transport failures are not returned here; they arrive as `error`
    /// followed by `end`.
    ///
    /// `before` listeners run on the calling thread while the transport is
    /// open but unsent, so headers they set go out with the request.
    pub fn open(&self, options: RequestOptions) -> Result<(), NetError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NetError::NoRuntime)?;
        let (mut transport, prepared, queued) = {
            let mut shared = self.inner.lock();
            match shared.state {
                RequestState::Destroyed => return Err(NetError::Destroyed),
                state if !state.can_open() => return Err(NetError::AlreadyOpened),
                _ => {}
            }

            let merged = options.merged_over(&shared.options);
            let mut resolved = merged.resolve()?;
            if shared.timeout.is_some() {
                resolved.timeout = shared.timeout;
            }
            let transport = shared.transport.take().ok_or(NetError::Destroyed)?;

            shared.options = merged;
            shared.state = RequestState::Opening;
            let prepared = PreparedRequest {
                url: self.inner.url.clone(),
                options: resolved,
                document_url: self.inner.document_url.clone(),
            };
            (transport, prepared, std::mem::take(&mut shared.headers))
        };

        let kind = transport.kind();
        let (signals, receiver) = mpsc::unbounded_channel();
        let opened = match transport.open(&prepared) {
            Ok(()) => {
                apply_headers(transport.as_mut(), &prepared, &queued);
                true
            }
            Err(e) => {
                let _ = signals.send(ReadySignal::Errored(e));
                false
            }
        };

        if !self.inner.restore(transport) {
            return Ok(());
        }
        self.inner.publish(&Event::Before(kind));
        let Some(mut transport) = self.inner.take_transport() else {
            return Ok(());
        };

        let body = prepared.options.body.clone().into_payload();
        let sent = opened
            && match transport.send(body, signals.clone()) {
                Ok(()) => true,
                Err(e) => {
                    let _ = signals.send(ReadySignal::Errored(e));
                    false
                }
            };
        drop(signals);
        let engine = DeliveryEngine::new(transport.slicing(), prepared.options.streaming);

        let mut shared = self.inner.lock();
        if shared.state == RequestState::Destroyed {
            drop(shared);
            transport.abort();
            return Ok(());
        }
        shared.transport = Some(transport);
        if sent {
            shared.state = RequestState::Sending;
        }
        tracing::debug!(
            id = self.inner.id,
            url = %self.inner.url,
            method = %prepared.options.method,
            transport = ?kind,
            streaming = prepared.options.streaming,
            "request opened"
        );

        let driver = runtime.spawn(drive(
            Arc::clone(&self.inner),
            kind,
            sent,
            engine,
            receiver,
        ));
        shared.driver = Some(driver);
        Ok(())
    }

    /// Abort the transport, emit `destroy` and leave the registry.
    ///
    /// Returns `false` if the request was already destroyed. Safe to call
    /// from inside a listener.
    pub fn destroy(&self) -> bool {
        let (transport, driver) = {
            let mut shared = self.inner.lock();
            if shared.state == RequestState::Destroyed {
                return false;
            }
            shared.state = RequestState::Destroyed;
            shared.headers.clear();
            shared.options.body = None;
            (shared.transport.take(), shared.driver.take())
        };

        if let Some(mut transport) = transport {
            transport.abort();
        }
        if let Some(driver) = driver {
            driver.abort();
        }
        self.inner.registry.remove(self.inner.id);
        tracing::debug!(id = self.inner.id, "request destroyed");

        self.inner.events.close_with(&Event::Destroy);
        true
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_destroyed(&self) -> bool {
        self.lock().state == RequestState::Destroyed
    }

    /// Put the transport back while `open` publishes `before`. Headers
    /// queued in the meantime are applied first. Returns `false`, with the
    /// transport aborted, if the request was destroyed.
    fn restore(&self, mut transport: Box<dyn Transport>) -> bool {
        let mut shared = self.lock();
        if shared.state == RequestState::Destroyed {
            drop(shared);
            transport.abort();
            return false;
        }
        for (name, value) in std::mem::take(&mut shared.headers) {
            transport.set_header(&name, &value);
        }
        shared.transport = Some(transport);
        true
    }

    fn take_transport(&self) -> Option<Box<dyn Transport>> {
        let mut shared = self.lock();
        if shared.state == RequestState::Destroyed {
            return None;
        }
        shared.transport.take()
    }

    /// Emit unless destroyed. Returns whether the driver should go on.
    fn publish(&self, event: &Event) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let addressed = self.events.emit(event);
        if addressed == 0 {
            if let Event::Error(error) = event {
                tracing::debug!(id = self.id, error = %error, "unobserved request error");
            }
        }
        true
    }

    fn observe(&self, engine: &DeliveryEngine, event: &Event) {
        let mut shared = self.lock();
        if shared.state == RequestState::Destroyed {
            return;
        }
        shared.offset = engine.offset();
        shared.status = engine.status();
        if matches!(event, Event::Stream(_)) && shared.state == RequestState::Sending {
            shared.state = RequestState::Streaming;
        }
    }

    /// Terminal step before `end` is emitted.
    fn finish(&self, error: Option<&NetError>) {
        let transport = {
            let mut shared = self.lock();
            if shared.state == RequestState::Destroyed {
                return;
            }
            shared.state = match error {
                None => RequestState::Completed,
                Some(_) => RequestState::Errored,
            };
            shared.driver = None;
            shared.transport.take()
        };
        drop(transport);
        self.registry.remove(self.id);
        tracing::debug!(id = self.id, error = ?error, "request ended");
    }
}

/// Default content type first, then option headers, then queued ones.
fn apply_headers(
    transport: &mut dyn Transport,
    prepared: &PreparedRequest,
    queued: &[(String, Value)],
) {
    transport.set_header("Content-Type", &Value::from(DEFAULT_CONTENT_TYPE));
    for (name, value) in prepared.options.headers.iter().chain(queued) {
        transport.set_header(name, value);
    }
}

async fn drive(
    inner: Arc<Inner>,
    kind: TransportKind,
    sent: bool,
    mut engine: DeliveryEngine,
    mut signals: SignalReceiver,
) {
    // fetch has sent once its response arrives.
    let mut send_pending = sent && kind == TransportKind::Fetch;
    if sent && !send_pending && !inner.publish(&Event::Send) {
        return;
    }

    while !engine.is_finished() {
        let events = match signals.recv().await {
            Some(signal) => {
                if inner.is_destroyed() {
                    tracing::trace!(id = inner.id, ?signal, "signal after destroy ignored");
                    return;
                }
                if send_pending && signal == ReadySignal::Connected {
                    send_pending = false;
                    if !inner.publish(&Event::Send) {
                        return;
                    }
                }
                engine.on_signal(signal)
            }
            None => engine.on_disconnect(),
        };

        for event in events {
            inner.observe(&engine, &event);
            if let Event::End(error) = &event {
                inner.finish(error.as_ref());
            }
            if !inner.publish(&event) {
                return;
            }
        }
    }
}
