//! Plain-text views for the console.
//!
//! Each function draws one piece of a screen into any [`Write`]. Colour comes
//! from `colored` and disappears when colouring is off (for example when
//! `NO_COLOR` is set), so the text itself never depends on it. Text that came
//! from the service goes through [`printable`] before it is written, so it
//! cannot carry escape sequences of its own.

use colored::{ColoredString, Colorize};
use std::io::{self, Write};
use teachit_core::models::{DetailStatus, EvaluationResult, Message, Role, UploadedFile};
use teachit_core::render::{CsvGrid, Rendered, printable};
use teachit_core::study::{HighlightCategory, HighlightSpan, StudyPresentation};

fn paint(category: HighlightCategory, text: &str) -> ColoredString {
    match category {
        HighlightCategory::Definition => text.blue().bold(),
        HighlightCategory::Concept => text.green().bold(),
        HighlightCategory::Important => text.red().bold(),
        HighlightCategory::Example => text.yellow(),
    }
}

pub fn heading(out: &mut impl Write, title: &str) -> io::Result<()> {
    let title = printable(title);
    writeln!(out)?;
    writeln!(out, "{}", title.bold())?;
    writeln!(out, "{}", "-".repeat(title.chars().count()))
}

pub fn error(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "error:".red().bold(), printable(message))
}

pub fn hint(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{}", message.dimmed())
}

pub fn topics(out: &mut impl Write, topics: &[String]) -> io::Result<()> {
    if topics.is_empty() {
        return writeln!(out, "No topics were suggested for these notes.");
    }
    for (index, topic) in topics.iter().enumerate() {
        writeln!(out, "  {:>2}. {}", index + 1, printable(topic))?;
    }
    Ok(())
}

pub fn message(out: &mut impl Write, message: &Message) -> io::Result<()> {
    let content = printable(&message.content);
    match message.role {
        Role::Teacher => writeln!(out, "{} {}", "Teacher:".cyan().bold(), content),
        Role::User => writeln!(out, "{} {}", "You:".bold(), content),
    }
}

fn status_mark(status: DetailStatus) -> ColoredString {
    match status {
        DetailStatus::Correct => "correct".green(),
        DetailStatus::Partial => "partial".yellow(),
        DetailStatus::Wrong => "wrong".red(),
    }
}

pub fn evaluation(out: &mut impl Write, evaluation: &EvaluationResult) -> io::Result<()> {
    writeln!(out, "Grade: {}", printable(&evaluation.grade).bold())?;
    writeln!(out, "{}", printable(&evaluation.comments))?;
    if !evaluation.details.is_empty() {
        writeln!(out)?;
    }
    for detail in &evaluation.details {
        writeln!(
            out,
            "  [{}] {}",
            status_mark(detail.status),
            printable(&detail.point)
        )?;
    }
    Ok(())
}

pub fn vault_files(
    out: &mut impl Write,
    files: &[UploadedFile],
    selected: Option<&str>,
) -> io::Result<()> {
    if files.is_empty() {
        return writeln!(out, "The vault is empty. Upload notes first.");
    }
    for (index, file) in files.iter().enumerate() {
        let marker = if selected == Some(file.filename.as_str()) {
            ">"
        } else {
            " "
        };
        writeln!(
            out,
            "{} {:>2}. {} ({}, {})",
            marker,
            index + 1,
            printable(&file.filename),
            printable(&file.format.to_string()),
            file.size_label()
        )?;
    }
    Ok(())
}

fn table(out: &mut impl Write, grid: &CsvGrid) -> io::Result<()> {
    let rows: Vec<Vec<String>> = grid
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| printable(cell).into_owned()).collect())
        .collect();
    let widths: Vec<usize> = (0..grid.column_count())
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for (index, row) in rows.iter().enumerate() {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ");
        if grid.is_header(index) {
            writeln!(out, "{}", line.trim_end().bold())?;
            let rule = widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("-+-");
            writeln!(out, "{}", rule)?;
        } else {
            writeln!(out, "{}", line.trim_end())?;
        }
    }
    Ok(())
}

fn spans(out: &mut impl Write, spans: &[HighlightSpan]) -> io::Result<()> {
    for span in spans {
        match span.category {
            Some(category) => write!(out, "{}", paint(category, &printable(&span.text)))?,
            None => write!(out, "{}", printable(&span.text))?,
        }
    }
    writeln!(out)
}

fn study(out: &mut impl Write, presentation: &StudyPresentation) -> io::Result<()> {
    writeln!(out, "{}", "Summary".bold())?;
    writeln!(out, "{}", printable(&presentation.summary))?;
    writeln!(out)?;
    spans(out, &presentation.spans)?;
    writeln!(out)?;
    let legend = presentation
        .legend
        .iter()
        .map(|category| paint(*category, category.label()).to_string())
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "Legend: {}", legend)
}

/// Draws a note as chosen by the content renderer.
pub fn rendered(out: &mut impl Write, rendered: &Rendered) -> io::Result<()> {
    match rendered {
        Rendered::Image { source, alt } => {
            let kind = source
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .unwrap_or("image");
            writeln!(
                out,
                "[image: {}] ({}, {} bytes)",
                printable(alt),
                printable(kind),
                source.len()
            )
        }
        Rendered::Table(grid) => table(out, grid),
        Rendered::Study(presentation) => study(out, presentation),
        Rendered::Literal(text) => writeln!(out, "{}", printable(text)),
    }
}
