use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Environment Errors
    #[error("No transport available in this environment")]
    Unsupported,
    #[error("No async runtime available")]
    NoRuntime,

    // Request Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid request options: {0}")]
    InvalidOptions(String),
    #[error("Method not supported")]
    MethodNotSupported,
    #[error("Request already opened")]
    AlreadyOpened,
    #[error("Request destroyed")]
    Destroyed,
    #[error("Header assignment failed: {0}")]
    HeaderAssignment(String),

    // Transport Errors
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request timed out")]
    TimedOut,
    #[error("Stream read failed: {0}")]
    StreamRead(String),
    #[error("Connection closed")]
    ConnectionClosed,
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Transport(_) => -2,
            NetError::Destroyed => -3,
            NetError::InvalidOptions(_) => -4,
            NetError::TimedOut => -7,
            NetError::Unsupported => -11,
            NetError::AlreadyOpened => -12,
            NetError::NoRuntime => -13,
            NetError::ConnectionClosed => -100,
            NetError::InvalidUrl => -300,
            NetError::MethodNotSupported => -322,
            NetError::StreamRead(_) => -330,
            NetError::HeaderAssignment(_) => -902,
        }
    }

    /// Failures of the underlying exchange. These reach callers as `error`
    /// notifications, never as return values.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            NetError::Transport(_)
                | NetError::TimedOut
                | NetError::StreamRead(_)
                | NetError::ConnectionClosed
        )
    }
}
