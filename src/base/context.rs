//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting host errors into `NetError` variants.

use crate::base::neterror::NetError;
use crate::host::HostError;

/// Extension trait for adding context to host Results.
pub trait HostResultExt<T> {
    /// Convert a host failure during `operation` into a transport error.
    ///
    /// # Example
    /// ```ignore
    /// use requests::base::context::HostResultExt;
    ///
    /// xhr.send(body, signals).transport_context("send")?;
    /// // Error: "Transport error: send: network error: connection refused"
    /// ```
    fn transport_context(self, operation: &str) -> Result<T, NetError>;

    /// Convert a header assignment failure for `name`.
    fn header_context(self, name: &str) -> Result<T, NetError>;
}

impl<T> HostResultExt<T> for Result<T, HostError> {
    fn transport_context(self, operation: &str) -> Result<T, NetError> {
        self.map_err(|e| match e {
            HostError::TimedOut => NetError::TimedOut,
            other => NetError::Transport(format!("{operation}: {other}")),
        })
    }

    fn header_context(self, name: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::HeaderAssignment(format!("{name}: {e}")))
    }
}
