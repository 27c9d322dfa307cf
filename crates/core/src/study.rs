//! Study Analysis View
//!
//! Requests an analysis (summary + highlights) for the selected text note and
//! toggles between the literal and the annotated presentation.
//!
//! The service returns highlights as markup. That markup is never handed to
//! a renderer: [`parse_highlights`] turns it into [`HighlightSpan`]s carrying
//! plain text and a category, so a renderer can only ever style text.

use crate::error::{ClientError, Result};
use crate::models::{AnalysisResult, NoteContent};
use crate::render::printable;
use crate::resource::{Resource, Tracked};
use crate::service::TutorService;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{info, warn};

pub const ANALYSIS_FAILED: &str = "Failed to analyze notes";

/// The closed set of highlight categories the service may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightCategory {
    Definition,
    Concept,
    Important,
    Example,
}

impl HighlightCategory {
    /// Every category, in legend order.
    pub const ALL: [HighlightCategory; 4] = [
        HighlightCategory::Definition,
        HighlightCategory::Concept,
        HighlightCategory::Important,
        HighlightCategory::Example,
    ];

    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "definition" => Some(HighlightCategory::Definition),
            "concept" => Some(HighlightCategory::Concept),
            "important" => Some(HighlightCategory::Important),
            "example" => Some(HighlightCategory::Example),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HighlightCategory::Definition => "Definition",
            HighlightCategory::Concept => "Key Concept",
            HighlightCategory::Important => "Important",
            HighlightCategory::Example => "Example",
        }
    }
}

impl fmt::Display for HighlightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A run of text, highlighted or plain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub category: Option<HighlightCategory>,
    pub text: String,
}

impl HighlightSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            category: None,
            text: text.into(),
        }
    }

    pub fn highlighted(category: HighlightCategory, text: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            text: text.into(),
        }
    }
}

static HIGHLIGHT_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<span\s+class\s*=\s*["']highlight-(definition|concept|important|example)["'][^>]*>"#,
    )
    .expect("highlight pattern is valid")
});

static SPAN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<span\b[^>]*>|</span\s*>").expect("span pattern is valid"));

static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|tr)\s*>").expect("block pattern is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Reduces a markup fragment to the text a reader would see.
fn markup_to_text(fragment: &str) -> String {
    let with_breaks = BLOCK_BREAK_RE.replace_all(fragment, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    printable(&decode_entities(&stripped)).into_owned()
}

/// Finds the `</span>` that closes a span opened just before `from`, counting
/// nested spans. Returns where the inner text ends and where the closer ends.
/// An unclosed span runs to the end of the markup.
fn closing_span(markup: &str, from: usize) -> (usize, usize) {
    let mut depth = 1usize;
    for tag in SPAN_TAG_RE.find_iter(&markup[from..]) {
        if tag.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return (from + tag.start(), from + tag.end());
            }
        } else {
            depth += 1;
        }
    }
    (markup.len(), markup.len())
}

fn push_span(spans: &mut Vec<HighlightSpan>, category: Option<HighlightCategory>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.category.is_none() && category.is_none() {
            last.text.push_str(&text);
            return;
        }
    }
    spans.push(HighlightSpan { category, text });
}

/// Converts highlighted markup into typed spans.
///
/// `<span class="highlight-…">` regions become categorized spans. A region
/// ends at its own `</span>`, so nested spans inside it keep its category.
/// Every other tag is dropped (block-level closers become line breaks), the
/// common HTML entities are decoded and terminal control sequences are
/// removed, so no markup survives into the output.
pub fn parse_highlights(markup: &str) -> Vec<HighlightSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(captures) = HIGHLIGHT_OPEN_RE.captures(&markup[cursor..]) {
        let Some(open) = captures.get(0) else {
            break;
        };
        let start = cursor + open.start();
        let inner_start = cursor + open.end();
        push_span(&mut spans, None, markup_to_text(&markup[cursor..start]));

        let category = captures
            .get(1)
            .and_then(|m| HighlightCategory::from_class(&m.as_str().to_lowercase()));
        let (inner_end, next) = closing_span(markup, inner_start);
        push_span(&mut spans, category, markup_to_text(&markup[inner_start..inner_end]));

        cursor = next;
    }
    push_span(&mut spans, None, markup_to_text(&markup[cursor..]));

    if let Some(last) = spans.last_mut() {
        if last.category.is_none() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
    }
    spans.retain(|span| !span.text.is_empty());
    spans
}

/// The annotated presentation of a note in study mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPresentation {
    pub summary: String,
    pub spans: Vec<HighlightSpan>,
    /// Always every category, whether or not it occurs in `spans`.
    pub legend: [HighlightCategory; 4],
}

impl StudyPresentation {
    pub fn from_analysis(analysis: &AnalysisResult) -> Self {
        Self {
            summary: analysis.summary.clone(),
            spans: parse_highlights(&analysis.highlighted_markup),
            legend: legend(),
        }
    }
}

pub fn legend() -> [HighlightCategory; 4] {
    HighlightCategory::ALL
}

/// Study-mode state for the currently selected note.
#[derive(Debug, Default)]
pub struct StudyAnalysisView {
    analysis: Tracked<AnalysisResult>,
    study_mode: bool,
}

impl StudyAnalysisView {
    pub fn new() -> Self {
        Self {
            analysis: Tracked::new(),
            study_mode: false,
        }
    }

    /// Requests a fresh analysis of `note` and enters study mode on success.
    pub async fn analyze(&mut self, service: &dyn TutorService, note: &NoteContent) -> Result<()> {
        if !note.format.is_text_like() {
            return Err(ClientError::precondition(format!(
                "Study mode is not available for {} notes",
                note.format
            )));
        }

        self.study_mode = false;
        let ticket = self.analysis.begin();
        let result = service.analyze_note(&note.filename).await;
        if let Err(e) = &result {
            warn!(filename = %note.filename, error = %e, "Failed to analyze note");
        }
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        if self.analysis.settle(ticket, result, ANALYSIS_FAILED) && outcome.is_ok() {
            info!(filename = %note.filename, "Entered study mode");
            self.study_mode = true;
        }
        outcome
    }

    /// Leaves study mode and forgets the analysis.
    pub fn exit_study_mode(&mut self) {
        self.analysis.reset();
        self.study_mode = false;
    }

    pub fn is_active(&self) -> bool {
        self.study_mode && self.analysis.ready().is_some()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.ready()
    }

    pub fn error(&self) -> Option<&str> {
        match self.analysis.state() {
            Resource::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn presentation(&self) -> Option<StudyPresentation> {
        if !self.study_mode {
            return None;
        }
        self.analysis().map(StudyPresentation::from_analysis)
    }
}
