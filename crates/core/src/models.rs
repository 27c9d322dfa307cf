//! Client Data Model
//!
//! Transient view-models held by the client. The tutoring service is the
//! source of truth for all of them; the client only keeps what the current
//! view needs and replaces it wholesale on every fetch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared format of a note, normalized from the service's format tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteFormat {
    Txt,
    Md,
    Csv,
    Docx,
    Image,
    Jpg,
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    /// Any tag the client has no dedicated handling for, lower-cased.
    Other(String),
}

impl NoteFormat {
    /// Parses a format tag. Comparison is case-insensitive and ignores
    /// surrounding whitespace; a leading dot is accepted so extensions parse too.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "txt" => NoteFormat::Txt,
            "md" => NoteFormat::Md,
            "csv" => NoteFormat::Csv,
            "docx" => NoteFormat::Docx,
            "image" => NoteFormat::Image,
            "jpg" => NoteFormat::Jpg,
            "jpeg" => NoteFormat::Jpeg,
            "png" => NoteFormat::Png,
            "gif" => NoteFormat::Gif,
            "webp" => NoteFormat::Webp,
            "bmp" => NoteFormat::Bmp,
            _ => NoteFormat::Other(normalized),
        }
    }

    /// Derives the format from a file name's extension.
    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_tag(ext),
            _ => NoteFormat::Other(String::new()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            NoteFormat::Txt => "txt",
            NoteFormat::Md => "md",
            NoteFormat::Csv => "csv",
            NoteFormat::Docx => "docx",
            NoteFormat::Image => "image",
            NoteFormat::Jpg => "jpg",
            NoteFormat::Jpeg => "jpeg",
            NoteFormat::Png => "png",
            NoteFormat::Gif => "gif",
            NoteFormat::Webp => "webp",
            NoteFormat::Bmp => "bmp",
            NoteFormat::Other(tag) => tag,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            NoteFormat::Image
                | NoteFormat::Jpg
                | NoteFormat::Jpeg
                | NoteFormat::Png
                | NoteFormat::Gif
                | NoteFormat::Webp
                | NoteFormat::Bmp
        )
    }

    /// Formats that can be analyzed and shown in study mode.
    pub fn is_text_like(&self) -> bool {
        matches!(self, NoteFormat::Txt | NoteFormat::Md | NoteFormat::Docx)
    }

    /// Formats the upload endpoint accepts.
    pub fn is_uploadable(&self) -> bool {
        matches!(
            self,
            NoteFormat::Txt
                | NoteFormat::Md
                | NoteFormat::Csv
                | NoteFormat::Docx
                | NoteFormat::Jpg
                | NoteFormat::Jpeg
                | NoteFormat::Png
                | NoteFormat::Gif
                | NoteFormat::Webp
        )
    }
}

impl From<String> for NoteFormat {
    fn from(tag: String) -> Self {
        NoteFormat::from_tag(&tag)
    }
}

impl From<NoteFormat> for String {
    fn from(format: NoteFormat) -> Self {
        format.as_tag().to_string()
    }
}

impl fmt::Display for NoteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One entry of the vault listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub format: NoteFormat,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

impl UploadedFile {
    /// Size in kilobytes with one decimal, e.g. `"1.5 KB"`.
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size_bytes as f64 / 1024.0)
    }
}

/// The raw content of one note: text, a data URI (images) or delimited text (csv).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub filename: String,
    pub format: NoteFormat,
    pub content: String,
}

/// The result of analyzing a text note for study mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    /// Highlighted markup as produced by the service. Never rendered as-is;
    /// see [`crate::study::parse_highlights`].
    #[serde(rename = "highlighted_html")]
    pub highlighted_markup: String,
}

/// The opaque identifier the service assigns to a teaching session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned names of the files a flow operates on, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRefs(Vec<String>);

impl FileRefs {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

/// Everything the session controller needs, handed over by the topic selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub topic: String,
    pub file_refs: FileRefs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The simulated student asking the questions.
    Teacher,
    /// The learner explaining the topic.
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn teacher(content: impl Into<String>) -> Self {
        Self {
            role: Role::Teacher,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// What the service answered to a chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnReply {
    /// The next question of the dialogue.
    Question(String),
    /// The session reached its question budget.
    Finished { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Correct,
    Partial,
    Wrong,
}

impl fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailStatus::Correct => write!(f, "correct"),
            DetailStatus::Partial => write!(f, "partial"),
            DetailStatus::Wrong => write!(f, "wrong"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    pub point: String,
    pub status: DetailStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub grade: String,
    pub comments: String,
    pub details: Vec<EvaluationDetail>,
}
