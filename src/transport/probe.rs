//! Transport capability probe.
//!
//! Decides once which transport a host offers and, for classic XHR, which
//! response types it accepts.

use crate::host::Host;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// ActiveX program ids, in the order they are tried.
pub const DEFAULT_LEGACY_PROG_IDS: [&str; 3] =
    ["MSXML2.XMLHTTP.6.0", "MSXML2.XMLHTTP.3.0", "Microsoft.XMLHTTP"];

/// `responseType` values an XHR object may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseType {
    ArrayBuffer,
    Blob,
    Document,
    Json,
    Text,
    MozBlob,
    MozChunkedText,
    MozChunkedArrayBuffer,
    MsStream,
}

impl ResponseType {
    pub const ALL: [ResponseType; 9] = [
        ResponseType::ArrayBuffer,
        ResponseType::Blob,
        ResponseType::Document,
        ResponseType::Json,
        ResponseType::Text,
        ResponseType::MozBlob,
        ResponseType::MozChunkedText,
        ResponseType::MozChunkedArrayBuffer,
        ResponseType::MsStream,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::ArrayBuffer => "arraybuffer",
            ResponseType::Blob => "blob",
            ResponseType::Document => "document",
            ResponseType::Json => "json",
            ResponseType::Text => "text",
            ResponseType::MozBlob => "moz-blob",
            ResponseType::MozChunkedText => "moz-chunked-text",
            ResponseType::MozChunkedArrayBuffer => "moz-chunked-arraybuffer",
            ResponseType::MsStream => "ms-stream",
        }
    }
}

/// Which transport requests will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportClass {
    /// fetch with readable-stream bodies.
    Fetch,
    /// XMLHttpRequest.
    Classic,
    /// ActiveX object created from this program id.
    Legacy(String),
    /// Nothing usable.
    Unsupported,
}

/// How the classic transport asks for a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStrategy {
    /// Leave `responseType` alone; progress carries cumulative text.
    Default,
    /// Native multipart mode; each part arrives as its own chunk.
    Multipart,
    /// Assign this response type after open.
    ResponseType(ResponseType),
}

/// Result of the probe. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    class: TransportClass,
    response_types: BTreeMap<ResponseType, bool>,
    multipart: bool,
}

impl Capabilities {
    /// Probe `host`.
    ///
    /// fetch with readable streams wins over XHR; ActiveX ids are only
    /// tried when neither exists.
    pub fn detect(host: &dyn Host, legacy_prog_ids: &[Cow<'static, str>]) -> Self {
        let xhr = host.create_xhr().ok();
        let has_fetch = host
            .fetch_api()
            .is_some_and(|api| api.supports_readable_stream());

        let class = if has_fetch {
            TransportClass::Fetch
        } else if xhr.is_some() {
            TransportClass::Classic
        } else {
            legacy_prog_ids
                .iter()
                .find(|id| host.create_active_x(id).is_ok())
                .map(|id| TransportClass::Legacy(id.to_string()))
                .unwrap_or(TransportClass::Unsupported)
        };

        let (response_types, multipart) = if class == TransportClass::Classic {
            let multipart = xhr.as_ref().is_some_and(|x| x.supports_multipart());
            (probe_response_types(host), multipart)
        } else {
            (BTreeMap::new(), false)
        };

        let capabilities = Self {
            class,
            response_types,
            multipart,
        };
        tracing::debug!(
            class = ?capabilities.class,
            multipart = capabilities.multipart,
            streaming = capabilities.streaming_supported(),
            "transport capabilities detected"
        );
        capabilities
    }

    /// Capabilities of an environment without any transport.
    pub fn unsupported() -> Self {
        Self {
            class: TransportClass::Unsupported,
            response_types: BTreeMap::new(),
            multipart: false,
        }
    }

    pub fn class(&self) -> &TransportClass {
        &self.class
    }

    pub fn is_supported(&self) -> bool {
        self.class != TransportClass::Unsupported
    }

    pub fn supports(&self, response_type: ResponseType) -> bool {
        self.response_types
            .get(&response_type)
            .copied()
            .unwrap_or(false)
    }

    pub fn response_types(&self) -> &BTreeMap<ResponseType, bool> {
        &self.response_types
    }

    pub fn multipart(&self) -> bool {
        self.multipart
    }

    /// Whether responses can be delivered before the exchange completes.
    pub fn streaming_supported(&self) -> bool {
        match self.class {
            TransportClass::Fetch => true,
            TransportClass::Classic => {
                self.multipart
                    || self.supports(ResponseType::MozChunkedArrayBuffer)
                    || self.supports(ResponseType::MozChunkedText)
                    || self.supports(ResponseType::MsStream)
            }
            TransportClass::Legacy(_) | TransportClass::Unsupported => false,
        }
    }

    /// Pick how a classic transport should ask for the response.
    pub fn select_strategy(&self, streaming: bool, binary_body: bool) -> ResponseStrategy {
        if !streaming {
            return ResponseStrategy::Default;
        }

        if binary_body {
            if self.supports(ResponseType::MozChunkedArrayBuffer) {
                return ResponseStrategy::ResponseType(ResponseType::MozChunkedArrayBuffer);
            }
            return ResponseStrategy::Default;
        }

        if self.multipart {
            ResponseStrategy::Multipart
        } else if self.supports(ResponseType::MozChunkedText) {
            ResponseStrategy::ResponseType(ResponseType::MozChunkedText)
        } else if self.supports(ResponseType::MsStream) {
            ResponseStrategy::ResponseType(ResponseType::MsStream)
        } else {
            ResponseStrategy::Default
        }
    }
}

fn probe_response_types(host: &dyn Host) -> BTreeMap<ResponseType, bool> {
    ResponseType::ALL
        .iter()
        .map(|&response_type| (response_type, probe_one(host, response_type)))
        .collect()
}

/// Each type gets a fresh object so one failure cannot poison the next.
fn probe_one(host: &dyn Host, response_type: ResponseType) -> bool {
    let Ok(mut xhr) = host.create_xhr() else {
        return false;
    };
    if xhr.open("GET", "/", true).is_err() {
        return false;
    }

    // Assigning before open throws in some engines.
    match xhr.set_response_type(response_type.as_str()) {
        Ok(()) => xhr.has_response() && xhr.response_type() == response_type.as_str(),
        Err(e) => {
            tracing::trace!(response_type = response_type.as_str(), error = %e, "response type rejected");
            false
        }
    }
}
