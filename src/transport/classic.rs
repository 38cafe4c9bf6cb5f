use super::credentials::resolve_credentials;
use super::probe::{Capabilities, ResponseStrategy};
use super::{PreparedRequest, SliceMode, Transport, TransportKind};
use crate::base::context::HostResultExt;
use crate::base::neterror::NetError;
use crate::host::{SignalSender, XhrObject};
use crate::http::options::{header_text, CredentialsMode};
use crate::http::payload::Payload;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Pass-through to an XMLHttpRequest object.
pub struct ClassicTransport {
    xhr: Box<dyn XhrObject>,
    capabilities: Arc<Capabilities>,
    slicing: SliceMode,
}

impl ClassicTransport {
    pub fn new(xhr: Box<dyn XhrObject>, capabilities: Arc<Capabilities>) -> Self {
        Self {
            xhr,
            capabilities,
            slicing: SliceMode::Cumulative,
        }
    }

    fn apply_strategy(&mut self, strategy: ResponseStrategy) {
        match strategy {
            ResponseStrategy::Default => {}
            ResponseStrategy::Multipart => match self.xhr.set_multipart(true) {
                Ok(()) => self.slicing = SliceMode::Delta,
                Err(e) => tracing::warn!(error = %e, "multipart mode rejected"),
            },
            ResponseStrategy::ResponseType(response_type) => {
                if let Err(e) = self.xhr.set_response_type(response_type.as_str()) {
                    tracing::warn!(
                        response_type = response_type.as_str(),
                        error = %e,
                        "response type rejected"
                    );
                }
            }
        }
    }
}

impl Transport for ClassicTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Classic
    }

    fn slicing(&self) -> SliceMode {
        self.slicing
    }

    fn open(&mut self, request: &PreparedRequest) -> Result<(), NetError> {
        let options = &request.options;
        self.xhr
            .open(options.method.as_str(), request.url.as_str(), true)
            .transport_context("open")?;

        // responseType may only be assigned once the object is open.
        self.slicing = SliceMode::Cumulative;
        let strategy = self
            .capabilities
            .select_strategy(options.streaming, options.body.is_binary());
        self.apply_strategy(strategy);

        if self.xhr.supports_credentials() {
            let credentials = resolve_credentials(
                options.credentials,
                options.mode,
                &request.url,
                request.document_url.as_ref(),
            );
            if let Err(e) = self
                .xhr
                .set_with_credentials(credentials == CredentialsMode::Include)
            {
                tracing::warn!(error = %e, "withCredentials not set");
            }
        }

        if let Some(timeout) = options.timeout {
            self.set_timeout(timeout);
        }

        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &Value) {
        if header_text(value).is_none() {
            return;
        }
        if let Err(e) = self
            .xhr
            .set_request_header(name, value)
            .header_context(name)
        {
            tracing::warn!(error = %e, "header not set");
        }
    }

    fn set_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.xhr.set_timeout(timeout) {
            tracing::debug!(error = %e, "timeout not supported by transport");
        }
    }

    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), NetError> {
        self.xhr.send(body, signals).transport_context("send")
    }

    fn abort(&mut self) {
        self.xhr.abort();
    }
}
