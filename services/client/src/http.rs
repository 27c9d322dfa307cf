//! HTTP implementation of [`TutorService`] on top of `reqwest`.

use crate::config::Config;
use crate::protocol::{
    ChatRequest, ChatResponse, ErrorBody, FilenameRequest, SessionRequest, StartSessionRequest,
    StartSessionResponse, TopicsRequest, TopicsResponse, UploadResponse, VaultListResponse,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use teachit_core::error::{ClientError, Result};
use teachit_core::models::{
    AnalysisResult, EvaluationResult, FileRefs, NoteContent, SessionId, TurnReply, UploadedFile,
};
use teachit_core::service::TutorService;
use teachit_core::upload::LocalFile;
use tracing::{debug, instrument};

/// Talks to the tutoring backend at a fixed origin.
#[derive(Clone, Debug)]
pub struct HttpTutorService {
    client: reqwest::Client,
    base_url: String,
}

fn transport(error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Transport(format!("request timed out: {}", error))
    } else {
        ClientError::Transport(error.to_string())
    }
}

impl HttpTutorService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and turns non-2xx statuses into [`ClientError::Backend`].
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        debug!(url = %response.url(), %status, "Response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string())
            });
        Err(ClientError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.send(self.client.post(&url).json(body)).await?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.send(self.client.get(&url)).await?;
        Self::decode(response).await
    }

    async fn chat(&self, session_id: &SessionId, answer: Option<&str>) -> Result<TurnReply> {
        let body = ChatRequest {
            session_id: session_id.as_str(),
            answer,
        };
        let response: ChatResponse = self.post_json("/api/chat", &body).await?;
        response.into_reply()
    }
}

#[async_trait]
impl TutorService for HttpTutorService {
    #[instrument(skip_all, fields(count = files.len()))]
    async fn upload_notes(&self, files: Vec<LocalFile>) -> Result<Vec<String>> {
        let form = files
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, file| {
                let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.filename);
                form.part("file", part)
            });

        let url = self.url("/api/upload");
        debug!(%url, "POST multipart");
        let response = self.send(self.client.post(&url).multipart(form)).await?;
        let body: UploadResponse = Self::decode(response).await?;
        Ok(body.filenames)
    }

    #[instrument(skip(self))]
    async fn list_vault(&self) -> Result<Vec<UploadedFile>> {
        let body: VaultListResponse = self.get_json("/api/notes/list").await?;
        Ok(body.files)
    }

    #[instrument(skip(self))]
    async fn fetch_note(&self, filename: &str) -> Result<NoteContent> {
        self.post_json("/api/notes", &FilenameRequest { filename }).await
    }

    #[instrument(skip(self))]
    async fn analyze_note(&self, filename: &str) -> Result<AnalysisResult> {
        self.post_json("/api/notes/analyze", &FilenameRequest { filename })
            .await
    }

    #[instrument(skip_all, fields(files = file_refs.as_slice().len()))]
    async fn list_topics(&self, file_refs: &FileRefs) -> Result<Vec<String>> {
        let body = TopicsRequest {
            filenames: file_refs.as_slice(),
        };
        let response: TopicsResponse = self.post_json("/api/topics", &body).await?;
        Ok(response.topics)
    }

    #[instrument(skip(self, file_refs))]
    async fn start_session(&self, topic: &str, file_refs: &FileRefs) -> Result<SessionId> {
        let body = StartSessionRequest {
            topic,
            filenames: file_refs.as_slice(),
        };
        let response: StartSessionResponse = self.post_json("/api/start_session", &body).await?;
        Ok(response.session_id)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn first_question(&self, session_id: &SessionId) -> Result<TurnReply> {
        self.chat(session_id, None).await
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn submit_answer(&self, session_id: &SessionId, answer: &str) -> Result<TurnReply> {
        self.chat(session_id, Some(answer)).await
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn continue_session(&self, session_id: &SessionId) -> Result<()> {
        let url = self.url("/api/continue_session");
        debug!(%url, "POST");
        let body = SessionRequest {
            session_id: session_id.as_str(),
        };
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn evaluate(&self, session_id: &SessionId) -> Result<EvaluationResult> {
        let body = SessionRequest {
            session_id: session_id.as_str(),
        };
        self.post_json("/api/evaluate", &body).await
    }
}
