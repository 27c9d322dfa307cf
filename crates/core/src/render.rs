//! Content Renderer
//!
//! Maps a note to exactly one presentation. The choice depends only on the
//! declared format, whether study mode is on, and whether an analysis is
//! present. The payload is never inspected to guess a format.

use crate::models::{AnalysisResult, NoteContent, NoteFormat};
use crate::study::StudyPresentation;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// How a note is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The payload is an image source (usually a data URI).
    Image,
    /// The payload is comma-separated rows.
    Table,
    /// The payload is shown through the study analysis.
    Study,
    /// The payload is shown as preformatted text.
    Literal,
}

/// Picks the presentation for a note. First match wins:
/// image formats, then csv, then text formats with an active analysis,
/// then literal text for everything else.
pub fn select_strategy(
    format: &NoteFormat,
    study_mode_active: bool,
    analysis_present: bool,
) -> Strategy {
    if format.is_image() {
        Strategy::Image
    } else if *format == NoteFormat::Csv {
        Strategy::Table
    } else if format.is_text_like() && study_mode_active && analysis_present {
        Strategy::Study
    } else {
        Strategy::Literal
    }
}

/// A csv payload split into cells. Row 0 is the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvGrid {
    pub rows: Vec<Vec<String>>,
}

impl CsvGrid {
    pub fn is_header(&self, row_index: usize) -> bool {
        row_index == 0 && !self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Splits `text` into a grid: one row per non-blank line, one cell per comma.
///
/// Quoting and escaping are not supported; a quoted comma splits the cell.
pub fn parse_csv_grid(text: &str) -> CsvGrid {
    let rows = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect();
    CsvGrid { rows }
}

/// A note ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Image { source: String, alt: String },
    Table(CsvGrid),
    Study(StudyPresentation),
    Literal(String),
}

impl Rendered {
    pub fn strategy(&self) -> Strategy {
        match self {
            Rendered::Image { .. } => Strategy::Image,
            Rendered::Table(_) => Strategy::Table,
            Rendered::Study(_) => Strategy::Study,
            Rendered::Literal(_) => Strategy::Literal,
        }
    }
}

static ESCAPE_SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[@-_]")
        .expect("escape sequence pattern is valid")
});

/// Removes terminal escape sequences and control characters from text that
/// came from the service. Line breaks and tabs are kept.
pub fn printable(text: &str) -> Cow<'_, str> {
    let keep = |c: char| !c.is_control() || c == '\n' || c == '\t';
    if text.chars().all(keep) {
        return Cow::Borrowed(text);
    }
    let without_sequences = ESCAPE_SEQUENCE_RE.replace_all(text, "");
    Cow::Owned(without_sequences.chars().filter(|c| keep(*c)).collect())
}

pub fn render(
    note: &NoteContent,
    study_mode_active: bool,
    analysis: Option<&AnalysisResult>,
) -> Rendered {
    match (
        select_strategy(&note.format, study_mode_active, analysis.is_some()),
        analysis,
    ) {
        (Strategy::Image, _) => Rendered::Image {
            source: note.content.clone(),
            alt: note.filename.clone(),
        },
        (Strategy::Table, _) => Rendered::Table(parse_csv_grid(&note.content)),
        (Strategy::Study, Some(analysis)) => {
            Rendered::Study(StudyPresentation::from_analysis(analysis))
        }
        _ => Rendered::Literal(note.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(format: &str, content: &str) -> NoteContent {
        NoteContent {
            filename: format!("note.{}", format),
            format: NoteFormat::from_tag(format),
            content: content.to_string(),
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            summary: "Short summary.".to_string(),
            highlighted_markup: r#"<span class="highlight-concept">Key</span> idea"#.to_string(),
        }
    }

    #[test]
    fn test_images_always_render_as_images() {
        for tag in ["image", "JPG", "jpeg", "png", "gif", "webp", "bmp"] {
            for (study, present) in [(false, false), (true, true), (true, false)] {
                assert_eq!(
                    select_strategy(&NoteFormat::from_tag(tag), study, present),
                    Strategy::Image
                );
            }
        }
    }

    #[test]
    fn test_csv_always_renders_as_table() {
        for (study, present) in [(false, false), (true, true), (false, true)] {
            assert_eq!(
                select_strategy(&NoteFormat::from_tag("CSV"), study, present),
                Strategy::Table
            );
        }
    }

    #[test]
    fn test_text_formats_need_study_mode_and_analysis() {
        for tag in ["txt", "md", "docx"] {
            let format = NoteFormat::from_tag(tag);
            assert_eq!(select_strategy(&format, true, true), Strategy::Study);
            assert_eq!(select_strategy(&format, true, false), Strategy::Literal);
            assert_eq!(select_strategy(&format, false, true), Strategy::Literal);
        }
    }

    #[test]
    fn test_unknown_formats_render_literally() {
        assert_eq!(
            select_strategy(&NoteFormat::from_tag("pdf"), true, true),
            Strategy::Literal
        );
    }

    #[test]
    fn test_csv_grid_drops_blank_lines() {
        let grid = parse_csv_grid("a,b\n1,2\n\n3,4");
        assert_eq!(
            grid.rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ]
        );
        assert!(grid.is_header(0));
        assert!(!grid.is_header(1));
        assert_eq!(grid.header().unwrap(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_csv_split_is_naive() {
        let grid = parse_csv_grid("name,quote\r\nAda,\"Hello, world\"\n   \n");
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[1], vec!["Ada", "\"Hello", "world\""]);
        assert_eq!(grid.column_count(), 3);
    }

    #[test]
    fn test_render_image_uses_payload_as_source() {
        let rendered = render(&note("png", "data:image/png;base64,AAAA"), true, Some(&analysis()));
        assert_eq!(
            rendered,
            Rendered::Image {
                source: "data:image/png;base64,AAAA".to_string(),
                alt: "note.png".to_string(),
            }
        );
    }

    #[test]
    fn test_render_study_view() {
        let rendered = render(&note("md", "# Key idea"), true, Some(&analysis()));
        match rendered {
            Rendered::Study(presentation) => {
                assert_eq!(presentation.summary, "Short summary.");
                assert_eq!(presentation.spans.len(), 2);
            }
            other => panic!("Expected study view, got {:?}", other),
        }
    }

    #[test]
    fn test_render_text_without_analysis_is_literal() {
        let rendered = render(&note("txt", "<b>raw</b>"), false, None);
        assert_eq!(rendered, Rendered::Literal("<b>raw</b>".to_string()));
        assert_eq!(rendered.strategy(), Strategy::Literal);
    }

    #[test]
    fn test_printable_drops_escape_sequences() {
        assert_eq!(printable("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(printable("\x1b]0;pwned\x07Key\x1b[2J idea"), "Key idea");
        assert_eq!(printable("bell\x07 and \u{9b}31m c1"), "bell and 31m c1");
    }

    #[test]
    fn test_printable_keeps_layout_characters() {
        let text = "name\tgrade\nAda\tA";
        assert!(matches!(printable(text), Cow::Borrowed(_)));
        assert_eq!(printable("line\r\nnext"), "line\nnext");
    }
}
