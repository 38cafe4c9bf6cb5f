pub mod context;
pub mod delivery;
pub mod events;
pub mod registry;
pub mod request;

pub use context::{RequestContext, RequestContextConfig};
pub use delivery::DeliveryEngine;
pub use events::{Event, EventChannel, EventKind};
pub use registry::ActiveRegistry;
pub use request::Request;
