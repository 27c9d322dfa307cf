use crate::models::{FileRefs, SessionHandle, SessionId};

/// Where the flow goes next, with the minimal context the next view needs.
///
/// Views never share state; each navigating operation returns a `Route`
/// and the runtime constructs the next view from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The entry point: choose files to upload.
    Welcome,
    /// Pick a topic for the uploaded files.
    Topics { file_refs: FileRefs },
    /// Browse the vault, optionally starting at one file.
    Vault {
        file_refs: FileRefs,
        selected: Option<String>,
    },
    /// Teach the topic of an active session.
    Chat(SessionHandle),
    /// Grade a finished session.
    Evaluate(EvaluationHandoff),
}

/// What the session controller hands to the evaluation presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationHandoff {
    pub session_id: Option<SessionId>,
    pub file_refs: FileRefs,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Welcome => "welcome",
            Route::Topics { .. } => "topics",
            Route::Vault { .. } => "vault",
            Route::Chat(_) => "chat",
            Route::Evaluate(_) => "evaluate",
        }
    }
}
