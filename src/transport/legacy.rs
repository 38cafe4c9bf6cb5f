use super::classic::ClassicTransport;
use super::probe::Capabilities;
use super::{PreparedRequest, SliceMode, Transport, TransportKind};
use crate::base::neterror::NetError;
use crate::host::{SignalSender, XhrObject};
use crate::http::options::header_text;
use crate::http::payload::Payload;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// ActiveX XMLHTTP object. Same contract as the classic transport.
///
/// ActiveX raises "Type Mismatch" for any header value that is not a
/// string, so every value is converted to text before assignment.
pub struct LegacyTransport {
    inner: ClassicTransport,
}

impl LegacyTransport {
    pub fn new(xhr: Box<dyn XhrObject>, capabilities: Arc<Capabilities>) -> Self {
        Self {
            inner: ClassicTransport::new(xhr, capabilities),
        }
    }
}

impl Transport for LegacyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Legacy
    }

    fn slicing(&self) -> SliceMode {
        self.inner.slicing()
    }

    fn open(&mut self, request: &PreparedRequest) -> Result<(), NetError> {
        self.inner.open(request)
    }

    fn set_header(&mut self, name: &str, value: &Value) {
        if let Some(text) = header_text(value) {
            self.inner.set_header(name, &Value::String(text));
        }
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }

    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), NetError> {
        self.inner.send(body, signals)
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}
