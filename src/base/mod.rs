//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): error taxonomy with net-error style codes
//! - [`RequestState`](loadstate::RequestState): request lifecycle states
//! - [`run_until_deadline`](deadline::run_until_deadline): timeouts that can change mid-flight

pub mod context;
pub mod deadline;
pub mod loadstate;
pub mod neterror;
