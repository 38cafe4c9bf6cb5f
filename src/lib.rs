//! # requests
//!
//! Streaming HTTP requests behind one event-driven interface, whatever
//! transport the host environment offers: XMLHttpRequest, a legacy ActiveX
//! XMLHTTP object, or fetch with readable-stream bodies.
//!
//! ## Features
//!
//! - **Capability probe**: picks the transport once, including which
//!   streaming response types the XHR object accepts
//! - **Incremental delivery**: `data` notifications carry only new bytes,
//!   whether the transport reports cumulative snapshots or deltas
//! - **Active registry**: every live request is reachable for bulk cleanup
//! - **Native host**: a hyper-based host for processes outside a browser
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use requests::host::NativeHost;
//! use requests::http::RequestOptions;
//! use requests::urlrequest::{Event, RequestContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = RequestContext::new(NativeHost::new());
//!     let request = context
//!         .request("http://127.0.0.1:8080/feed", RequestOptions::new().streaming(true))
//!         .unwrap();
//!
//!     // Anything published before this point is held for the new listener.
//!     let mut events = request.events();
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::Data(chunk) => println!("{:?}", chunk.as_text()),
//!             Event::End(_) => break,
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy and request lifecycle states
//! - [`http`] - Request options, bodies, payloads and status remapping
//! - [`host`] - Host environment traits and the native host
//! - [`transport`] - Capability probe and transport adapters
//! - [`urlrequest`] - Requests, delivery engine, registry and context

pub mod base;
pub mod host;
pub mod http;
pub mod transport;
pub mod urlrequest;

pub use base::neterror::NetError;
pub use urlrequest::{Event, EventKind, Request, RequestContext};
