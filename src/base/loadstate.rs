/// The lifecycle state of a Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// Constructed, not yet opened.
    #[default]
    Constructed,

    /// Constructed with `manual`, waiting for an explicit open.
    Pending,

    /// Opening the transport and applying headers.
    Opening,

    /// Body handed to the transport, waiting for the first signal.
    Sending,

    /// Response data is arriving.
    Streaming,

    /// The exchange finished and `end` fired without an error.
    Completed,

    /// The exchange failed and `end` fired with an error.
    Errored,

    /// `destroy` ran.
    Destroyed,
}

impl RequestState {
    /// Whether `open` may still be called.
    pub fn can_open(self) -> bool {
        matches!(self, RequestState::Constructed | RequestState::Pending)
    }

    /// Whether the request reached `end` or was destroyed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Completed | RequestState::Errored | RequestState::Destroyed
        )
    }
}
