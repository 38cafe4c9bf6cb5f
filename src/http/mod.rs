pub mod options;
pub mod payload;
pub mod requestbody;
pub mod status;

// Re-exports for convenience
pub use options::{CredentialsMode, RequestMode, RequestOptions, ResolvedOptions};
pub use payload::{Payload, TextDecoder};
pub use requestbody::RequestBody;
pub use status::normalize_status;
