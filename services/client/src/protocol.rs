//! Wire format of the tutoring backend's JSON API.
//!
//! Request bodies borrow from the caller; response bodies are validated here
//! before they become domain values, so a reply that fits neither shape is a
//! `MalformedResponse` rather than a half-filled struct.

use serde::{Deserialize, Serialize};
use teachit_core::error::{ClientError, Result};
use teachit_core::models::{SessionId, TurnReply, UploadedFile};

#[derive(Serialize, Debug)]
pub struct FilenameRequest<'a> {
    pub filename: &'a str,
}

#[derive(Serialize, Debug)]
pub struct TopicsRequest<'a> {
    pub filenames: &'a [String],
}

#[derive(Serialize, Debug)]
pub struct StartSessionRequest<'a> {
    pub topic: &'a str,
    pub filenames: &'a [String],
}

/// Body of `/api/chat`. Without an answer the service replies with the
/// current question.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub struct SessionRequest<'a> {
    pub session_id: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct UploadResponse {
    pub filenames: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct VaultListResponse {
    pub files: Vec<UploadedFile>,
}

#[derive(Deserialize, Debug)]
pub struct TopicsResponse {
    pub topics: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
}

/// Either `{ question }` or `{ finished: true, message }`.
#[derive(Deserialize, Debug, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatResponse {
    /// The `finished` flag takes precedence over a question in the same body.
    pub fn into_reply(self) -> Result<TurnReply> {
        match (self.finished, self.question, self.message) {
            (true, _, Some(message)) => Ok(TurnReply::Finished { message }),
            (true, _, None) => Err(ClientError::MalformedResponse(
                "finished reply without a message".to_string(),
            )),
            (false, Some(question), _) => Ok(TurnReply::Question(question)),
            (false, None, _) => Err(ClientError::MalformedResponse(
                "chat reply had neither a question nor a finished flag".to_string(),
            )),
        }
    }
}

/// Error body of a non-2xx response.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|message| !message.trim().is_empty())
    }
}
