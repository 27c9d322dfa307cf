//! In-process tutoring backend for development and demos.
//!
//! Keeps uploads and sessions in memory and answers deterministically:
//! three questions per session, three more per continuation, and a fixed
//! sample grade. Nothing here tries to be a real tutor.

use crate::error::{ClientError, Result};
use crate::models::{
    AnalysisResult, DetailStatus, EvaluationDetail, EvaluationResult, FileRefs, NoteContent,
    NoteFormat, SessionId, TurnReply, UploadedFile,
};
use crate::service::TutorService;
use crate::upload::LocalFile;
use async_trait::async_trait;
use base64::Engine;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::info;

/// Questions asked per session before the finish notice, and added per continuation.
pub const QUESTIONS_PER_ROUND: u32 = 3;

pub const FINISHED_MESSAGE: &str = "Good job! Ready for evaluation?";

struct StoredNote {
    format: NoteFormat,
    bytes: Vec<u8>,
}

struct OfflineSession {
    topic: String,
    answered: u32,
    target: u32,
}

#[derive(Default)]
struct OfflineState {
    notes: BTreeMap<String, StoredNote>,
    sessions: HashMap<SessionId, OfflineSession>,
    next_session: u64,
}

/// A `TutorService` that never leaves the process.
#[derive(Default)]
pub struct OfflineTutorService {
    state: Mutex<OfflineState>,
}

impl OfflineTutorService {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::Backend {
        status: 404,
        message: format!("{} not found", what),
    }
}

fn bad_request(message: &str) -> ClientError {
    ClientError::Backend {
        status: 400,
        message: message.to_string(),
    }
}

/// Reduces a client-supplied name to a safe flat filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
}

fn mime_type(format: &NoteFormat) -> &'static str {
    match format {
        NoteFormat::Png => "image/png",
        NoteFormat::Gif => "image/gif",
        NoteFormat::Webp => "image/webp",
        NoteFormat::Bmp => "image/bmp",
        _ => "image/jpeg",
    }
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn question_for(topic: &str, index: u32) -> String {
    let templates = [
        format!("Explain the first concept of {}.", topic),
        format!("How does {} relate to everyday life?", topic),
        format!("What is the most critical part of {}?", topic),
        format!("Can you give an example of {} in action?", topic),
        format!("What are common misconceptions about {}?", topic),
        format!("How would you explain {} to a 5 year old?", topic),
    ];
    templates[index as usize % templates.len()].clone()
}

/// Marks up a text note line by line with the four highlight categories.
fn highlight_lines(text: &str) -> String {
    let mut html = String::new();
    for (index, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
        let lower = line.to_lowercase();
        let category = if index == 0 {
            Some("concept")
        } else if lower.starts_with("e.g.") || lower.starts_with("for example") {
            Some("example")
        } else if lower.contains(" is ") || lower.contains(" are ") {
            Some("definition")
        } else if lower.contains("important") || line.ends_with('!') {
            Some("important")
        } else {
            None
        };
        let escaped = escape_markup(line);
        match category {
            Some(category) => html.push_str(&format!(
                "<p><span class=\"highlight-{}\">{}</span></p>",
                category, escaped
            )),
            None => html.push_str(&format!("<p>{}</p>", escaped)),
        }
    }
    html
}

fn summarize(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let first_sentence = match flat.find(". ") {
        Some(idx) => &flat[..=idx],
        None => flat.as_str(),
    };
    first_sentence.chars().take(200).collect()
}

impl OfflineState {
    fn next_reply(&mut self, session_id: &SessionId) -> Result<TurnReply> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| not_found("Session"))?;
        if session.answered >= session.target {
            return Ok(TurnReply::Finished {
                message: FINISHED_MESSAGE.to_string(),
            });
        }
        Ok(TurnReply::Question(question_for(
            &session.topic,
            session.answered,
        )))
    }
}

#[async_trait]
impl TutorService for OfflineTutorService {
    async fn upload_notes(&self, files: Vec<LocalFile>) -> Result<Vec<String>> {
        if files.is_empty() {
            return Err(bad_request("No file part"));
        }
        let mut state = self.state.lock().await;
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            let filename = sanitize_filename(&file.filename);
            if filename.is_empty() {
                return Err(bad_request("No selected file"));
            }
            let format = NoteFormat::from_filename(&filename);
            state.notes.insert(
                filename.clone(),
                StoredNote {
                    format,
                    bytes: file.bytes,
                },
            );
            names.push(filename);
        }
        info!(count = names.len(), "Stored uploaded notes offline");
        Ok(names)
    }

    async fn list_vault(&self) -> Result<Vec<UploadedFile>> {
        let state = self.state.lock().await;
        Ok(state
            .notes
            .iter()
            .map(|(filename, note)| UploadedFile {
                filename: filename.clone(),
                format: note.format.clone(),
                size_bytes: note.bytes.len() as u64,
            })
            .collect())
    }

    async fn fetch_note(&self, filename: &str) -> Result<NoteContent> {
        let state = self.state.lock().await;
        let note = state.notes.get(filename).ok_or_else(|| not_found("File"))?;
        let content = match &note.format {
            format if format.is_image() => format!(
                "data:{};base64,{}",
                mime_type(format),
                base64::engine::general_purpose::STANDARD.encode(&note.bytes)
            ),
            NoteFormat::Docx => format!("[{} cannot be converted offline]", filename),
            _ => String::from_utf8_lossy(&note.bytes).into_owned(),
        };
        Ok(NoteContent {
            filename: filename.to_string(),
            format: note.format.clone(),
            content,
        })
    }

    async fn analyze_note(&self, filename: &str) -> Result<AnalysisResult> {
        let state = self.state.lock().await;
        let note = state.notes.get(filename).ok_or_else(|| not_found("File"))?;
        if !matches!(note.format, NoteFormat::Txt | NoteFormat::Md) {
            return Err(bad_request(
                "Analysis is only available for plain text notes offline",
            ));
        }
        let text = String::from_utf8_lossy(&note.bytes);
        Ok(AnalysisResult {
            summary: summarize(&text),
            highlighted_markup: highlight_lines(&text),
        })
    }

    async fn list_topics(&self, filenames: &FileRefs) -> Result<Vec<String>> {
        if filenames.is_empty() {
            return Err(bad_request("No files provided"));
        }
        Ok(filenames
            .as_slice()
            .iter()
            .flat_map(|name| {
                let stem = stem(name);
                [
                    format!("Core concepts of {}", stem),
                    format!("Applying {}", stem),
                ]
            })
            .collect())
    }

    async fn start_session(&self, topic: &str, _filenames: &FileRefs) -> Result<SessionId> {
        let mut state = self.state.lock().await;
        state.next_session += 1;
        let session_id = SessionId::new(format!("offline_{}", state.next_session));
        state.sessions.insert(
            session_id.clone(),
            OfflineSession {
                topic: topic.to_string(),
                answered: 0,
                target: QUESTIONS_PER_ROUND,
            },
        );
        info!(%session_id, %topic, "Started offline session");
        Ok(session_id)
    }

    async fn first_question(&self, session_id: &SessionId) -> Result<TurnReply> {
        self.state.lock().await.next_reply(session_id)
    }

    async fn submit_answer(&self, session_id: &SessionId, answer: &str) -> Result<TurnReply> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("Session"))?;
        if !answer.trim().is_empty() {
            session.answered += 1;
        }
        state.next_reply(session_id)
    }

    async fn continue_session(&self, session_id: &SessionId) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("Session"))?;
        session.target += QUESTIONS_PER_ROUND;
        Ok(())
    }

    async fn evaluate(&self, session_id: &SessionId) -> Result<EvaluationResult> {
        let state = self.state.lock().await;
        if !state.sessions.contains_key(session_id) {
            return Err(not_found("Session"));
        }
        Ok(EvaluationResult {
            grade: "B+".to_string(),
            comments: "You explained the basics well, but missed some details on the advanced concepts."
                .to_string(),
            details: vec![
                EvaluationDetail {
                    point: "Clarity".to_string(),
                    status: DetailStatus::Correct,
                },
                EvaluationDetail {
                    point: "Depth".to_string(),
                    status: DetailStatus::Partial,
                },
                EvaluationDetail {
                    point: "Examples".to_string(),
                    status: DetailStatus::Correct,
                },
            ],
        })
    }
}
