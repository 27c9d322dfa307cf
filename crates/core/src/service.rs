//! Tutoring Service Contract
//!
//! The client never implements topic extraction, question generation,
//! highlighting or grading itself. It reaches them through [`TutorService`],
//! which the HTTP client implements against the real backend and
//! [`crate::offline::OfflineTutorService`] implements in-process for
//! development without a server.

use crate::error::Result;
use crate::models::{
    AnalysisResult, EvaluationResult, FileRefs, NoteContent, SessionId, TurnReply, UploadedFile,
};
use crate::upload::LocalFile;
use async_trait::async_trait;

/// Defines every call the client makes to the tutoring backend.
///
/// Implementations must not retry on their own; all retries are initiated by
/// the user repeating an action.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TutorService: Send + Sync {
    /// Uploads one or more files and returns the server-assigned filenames.
    async fn upload_notes(&self, files: Vec<LocalFile>) -> Result<Vec<String>>;

    /// Lists every file in the vault.
    async fn list_vault(&self) -> Result<Vec<UploadedFile>>;

    /// Fetches the content of one note.
    async fn fetch_note(&self, filename: &str) -> Result<NoteContent>;

    /// Produces a summary and highlighted markup for a text note.
    async fn analyze_note(&self, filename: &str) -> Result<AnalysisResult>;

    /// Proposes topics for the given files, in the server's order.
    async fn list_topics(&self, filenames: &FileRefs) -> Result<Vec<String>>;

    /// Starts a teaching session on `topic` backed by `filenames`.
    async fn start_session(&self, topic: &str, filenames: &FileRefs) -> Result<SessionId>;

    /// Requests the opening question of a session (no answer payload).
    async fn first_question(&self, session_id: &SessionId) -> Result<TurnReply>;

    /// Sends the user's answer and returns the next question or the finish notice.
    async fn submit_answer(&self, session_id: &SessionId, answer: &str) -> Result<TurnReply>;

    /// Extends a finished session with more questions under the same id.
    async fn continue_session(&self, session_id: &SessionId) -> Result<()>;

    /// Grades a session.
    async fn evaluate(&self, session_id: &SessionId) -> Result<EvaluationResult>;
}
