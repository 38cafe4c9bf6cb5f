//! Request Context - process-scoped state shared by requests.
//!
//! Holds what would otherwise be globals: the host, the cached transport
//! capabilities, the default options, the active registry and the counter
//! that hands out request identities. Tests build as many isolated
//! contexts as they like.

use crate::base::neterror::NetError;
use crate::host::Host;
use crate::http::options::RequestOptions;
use crate::transport::probe::DEFAULT_LEGACY_PROG_IDS;
use crate::transport::{create_transport, Capabilities};
use crate::urlrequest::registry::ActiveRegistry;
use crate::urlrequest::request::Request;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use url::Url;

/// Configuration options for RequestContext.
#[derive(Debug, Clone)]
pub struct RequestContextConfig {
    /// Options every request starts from.
    pub defaults: RequestOptions,

    /// ActiveX program ids tried, in order, when neither fetch nor
    /// XMLHttpRequest exists.
    pub legacy_prog_ids: Vec<Cow<'static, str>>,
}

impl Default for RequestContextConfig {
    fn default() -> Self {
        Self {
            defaults: RequestOptions::defaults(),
            legacy_prog_ids: DEFAULT_LEGACY_PROG_IDS
                .iter()
                .map(|id| Cow::Borrowed(*id))
                .collect(),
        }
    }
}

/// Central state for requests made against one host environment.
pub struct RequestContext {
    host: Arc<dyn Host>,
    legacy_prog_ids: Vec<Cow<'static, str>>,

    /// Probed on first need, then fixed.
    capabilities: OnceLock<Arc<Capabilities>>,

    /// Copied into each request at construction.
    defaults: RwLock<RequestOptions>,

    active: ActiveRegistry,
    requested: AtomicU64,
}

impl RequestContext {
    /// Create a context with default configuration.
    pub fn new(host: impl Host + 'static) -> Self {
        Self::with_config(host, RequestContextConfig::default())
    }

    pub fn with_config(host: impl Host + 'static, config: RequestContextConfig) -> Self {
        Self {
            host: Arc::new(host),
            legacy_prog_ids: config.legacy_prog_ids,
            capabilities: OnceLock::new(),
            defaults: RwLock::new(config.defaults),
            active: ActiveRegistry::new(),
            requested: AtomicU64::new(0),
        }
    }

    /// Transport capabilities of the host, probed once.
    pub fn capabilities(&self) -> &Arc<Capabilities> {
        self.capabilities.get_or_init(|| {
            Arc::new(Capabilities::detect(
                self.host.as_ref(),
                &self.legacy_prog_ids,
            ))
        })
    }

    /// Whether any transport is available.
    pub fn supported(&self) -> bool {
        self.capabilities().is_supported()
    }

    /// Current default options.
    pub fn defaults(&self) -> RequestOptions {
        self.defaults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the defaults. Requests already constructed keep theirs.
    pub fn set_defaults(&self, defaults: RequestOptions) {
        *self.defaults.write().unwrap_or_else(|e| e.into_inner()) = defaults;
    }

    /// Live requests.
    pub fn active(&self) -> &ActiveRegistry {
        &self.active
    }

    /// Requests ever constructed, destroyed ones included.
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    /// Construct a request.
    ///
    /// Relative URLs resolve against the host document. Unless `manual` is
    /// set the request opens immediately, so this must then run inside a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// [`NetError::Unsupported`] when the host has no transport at all;
    /// [`NetError::InvalidUrl`] for an unparsable URL.
    pub fn request(&self, url: &str, options: RequestOptions) -> Result<Request, NetError> {
        let capabilities = self.capabilities();
        if !capabilities.is_supported() {
            return Err(NetError::Unsupported);
        }

        let document_url = self.host.document_url();
        let url = Url::options()
            .base_url(document_url.as_ref())
            .parse(url)
            .map_err(|_| NetError::InvalidUrl)?;

        let options = options.merged_over(&self.defaults());
        let manual = options.manual.unwrap_or(false);
        let transport = create_transport(capabilities, self.host.as_ref())?;

        let id = self.requested.fetch_add(1, Ordering::AcqRel) + 1;
        let request = Request::new(
            id,
            url,
            document_url,
            options,
            transport,
            self.active.clone(),
        );
        self.active.insert(request.clone());
        tracing::debug!(id, url = %request.url(), manual, "request constructed");

        if !manual {
            if let Err(e) = request.open(RequestOptions::new()) {
                self.active.remove(id);
                return Err(e);
            }
        }
        Ok(request)
    }

    /// Destroy every live request. Returns how many were destroyed.
    pub fn destroy_all(&self) -> usize {
        self.active
            .snapshot()
            .iter()
            .filter(|request| request.destroy())
            .count()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("capabilities", &self.capabilities.get())
            .field("legacy_prog_ids", &self.legacy_prog_ids)
            .field("active", &self.active.len())
            .field("requested", &self.requested())
            .finish()
    }
}
