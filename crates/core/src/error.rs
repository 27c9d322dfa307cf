//! Client Error Taxonomy
//!
//! Every operation that talks to the tutoring service, or refuses to, reports
//! failure through [`ClientError`]. The variants mirror how the views react:
//! precondition violations never leave the client, everything else is shown
//! in the view's error slot and can be retried by repeating the action.

/// Errors produced by the view-models and the `TutorService` implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// A local precondition failed (empty input, missing session, wrong state).
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The request never produced an HTTP response.
    #[error("Transport failure: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("Service returned {status}: {message}")]
    Backend { status: u16, message: String },
    /// The service answered, but not with the shape the client expects.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// The text shown to the user in an error slot.
    ///
    /// Backend errors show the server-provided message verbatim; everything
    /// else falls back to `fallback` so transport noise is not printed raw.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Backend { message, .. } if !message.trim().is_empty() => message.clone(),
            ClientError::Precondition(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Whether repeating the same action could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ClientError::Precondition(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
