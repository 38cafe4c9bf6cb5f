//! Transport adapters.
//!
//! Every request drives exactly one [`Transport`]. The rest of the crate is
//! written against this trait and never against a concrete host object:
//! - [`ClassicTransport`]: XMLHttpRequest
//! - [`LegacyTransport`]: ActiveX XMLHTTP objects
//! - [`FetchTransport`]: fetch with a pull-based body reader
//!
//! Which one is built follows from the [`Capabilities`] probe.

pub mod classic;
pub mod credentials;
pub mod fetch;
pub mod legacy;
pub mod probe;

pub use classic::ClassicTransport;
pub use fetch::FetchTransport;
pub use legacy::LegacyTransport;
pub use probe::{Capabilities, ResponseStrategy, ResponseType, TransportClass};

use crate::base::context::HostResultExt;
use crate::base::neterror::NetError;
use crate::host::{Host, SignalSender};
use crate::http::options::ResolvedOptions;
use crate::http::payload::Payload;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Concrete transport behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Classic,
    Legacy,
    Fetch,
}

/// How progress payloads relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceMode {
    /// Each payload is the whole response so far.
    Cumulative,
    /// Each payload is a self-contained chunk.
    Delta,
}

/// Everything a transport needs to open.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: Url,
    pub options: ResolvedOptions,
    /// The host document, for the same-origin credentials check.
    pub document_url: Option<Url>,
}

/// Uniform adapter over one host transport.
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Decided by `open`; callers read it after opening.
    fn slicing(&self) -> SliceMode;

    fn open(&mut self, request: &PreparedRequest) -> Result<(), NetError>;

    /// Never fails. Values that are `null` or empty are skipped, and
    /// failures from the host are logged and dropped.
    fn set_header(&mut self, name: &str, value: &Value);

    /// Replace the timeout, even once sent. Counted from the send.
    fn set_timeout(&mut self, timeout: Duration);

    /// Hand over the body. Returns immediately.
    fn send(&mut self, body: Option<Payload>, signals: SignalSender) -> Result<(), NetError>;

    fn abort(&mut self);
}

/// Build the transport the probe selected.
pub fn create_transport(
    capabilities: &Arc<Capabilities>,
    host: &dyn Host,
) -> Result<Box<dyn Transport>, NetError> {
    match capabilities.class() {
        TransportClass::Fetch => {
            let api = host.fetch_api().ok_or(NetError::Unsupported)?;
            Ok(Box::new(FetchTransport::new(api)))
        }
        TransportClass::Classic => {
            let xhr = host.create_xhr().transport_context("construct")?;
            Ok(Box::new(ClassicTransport::new(xhr, Arc::clone(capabilities))))
        }
        TransportClass::Legacy(prog_id) => {
            let xhr = host.create_active_x(prog_id).transport_context("construct")?;
            Ok(Box::new(LegacyTransport::new(xhr, Arc::clone(capabilities))))
        }
        TransportClass::Unsupported => Err(NetError::Unsupported),
    }
}
