//! Rendering and formatting shared by the query and admin front ends.
//!
//! Everything that ends up in markup goes through [`escape_html`]; answer
//! text, filenames and error messages are never interpreted as markup.
//!
//! Answer text is split into [`AnswerMarkup`] blocks: paragraphs are
//! separated by blank lines, and lines that start with an ordinal such as
//! `"1. "` become list items. The block structure is lossless, so
//! [`AnswerMarkup::text`] always reproduces the original answer.

use crate::models::{Answer, Document, Source, SourceType};
use serde::Serialize;

// ============ Escaping ============

/// Escape the five markup-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_html`]. Unknown entities are left untouched.
pub fn unescape_html(text: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ============ Answer markup ============

/// A run of consecutive lines of the same kind inside one paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "lines", rename_all = "snake_case")]
pub enum Run {
    Text(Vec<String>),
    OrdinalList(Vec<String>),
}

impl Run {
    fn lines(&self) -> &[String] {
        match self {
            Run::Text(lines) | Run::OrdinalList(lines) => lines,
        }
    }
}

/// Answer text split into paragraphs of text and ordinal-list runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerMarkup {
    pub paragraphs: Vec<Vec<Run>>,
}

impl AnswerMarkup {
    pub fn parse(answer: &str) -> Self {
        let paragraphs = answer
            .split("\n\n")
            .map(|paragraph| {
                let mut runs: Vec<Run> = Vec::new();
                for line in paragraph.split('\n') {
                    let ordinal = is_ordinal_line(line);
                    match runs.last_mut() {
                        Some(Run::OrdinalList(lines)) if ordinal => lines.push(line.to_string()),
                        Some(Run::Text(lines)) if !ordinal => lines.push(line.to_string()),
                        _ if ordinal => runs.push(Run::OrdinalList(vec![line.to_string()])),
                        _ => runs.push(Run::Text(vec![line.to_string()])),
                    }
                }
                runs
            })
            .collect();
        Self { paragraphs }
    }

    /// Reassemble the original answer text.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|runs| {
                runs.iter()
                    .map(|run| run.lines().join("\n"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render as HTML: `<p>` per text run (lines joined by `<br>`) and an
    /// `<ol>` per ordinal run with the ordinal moved into the list numbering.
    /// Blank paragraphs and blank lines at the edges of a text run are skipped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for runs in &self.paragraphs {
            for run in runs {
                match run {
                    Run::Text(lines) => {
                        let lines = trim_blank_lines(lines);
                        if lines.is_empty() {
                            continue;
                        }
                        let body: Vec<String> = lines.iter().map(|l| escape_html(l)).collect();
                        html.push_str("<p>");
                        html.push_str(&body.join("<br>"));
                        html.push_str("</p>");
                    }
                    Run::OrdinalList(lines) => {
                        let start = lines.first().and_then(|l| split_ordinal(l)).map_or(1, |(n, _)| n);
                        if start == 1 {
                            html.push_str("<ol class=\"answer-list\">");
                        } else {
                            html.push_str(&format!("<ol class=\"answer-list\" start=\"{}\">", start));
                        }
                        for line in lines {
                            let item = split_ordinal(line).map_or(line.as_str(), |(_, rest)| rest);
                            html.push_str("<li>");
                            html.push_str(&escape_html(item));
                            html.push_str("</li>");
                        }
                        html.push_str("</ol>");
                    }
                }
            }
        }
        html
    }

    /// Render for a terminal: list items indented, paragraphs separated by a
    /// blank line.
    pub fn to_terminal(&self) -> String {
        self.paragraphs
            .iter()
            .filter(|runs| runs.iter().any(|run| run.lines().iter().any(|l| !l.trim().is_empty())))
            .map(|runs| {
                let mut out: Vec<String> = Vec::new();
                for run in runs {
                    match run {
                        Run::Text(lines) => out.extend(lines.iter().cloned()),
                        Run::OrdinalList(lines) => {
                            out.extend(lines.iter().map(|l| format!("  {}", l.trim_start())))
                        }
                    }
                }
                out.join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// `true` for lines shaped like `"12. text"` (leading whitespace allowed).
fn is_ordinal_line(line: &str) -> bool {
    split_ordinal(line).is_some()
}

/// Split `"  12. text"` into `(12, "text")`.
fn split_ordinal(line: &str) -> Option<(u64, &str)> {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = trimmed[digits..].strip_prefix('.')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let number = trimmed[..digits].parse().unwrap_or(u64::MAX);
    Some((number, rest.trim_start()))
}

/// Drop blank lines at both ends of a text run.
fn trim_blank_lines(lines: &[String]) -> &[String] {
    let blank = |l: &String| l.trim().is_empty();
    let start = lines.iter().position(|l| !blank(l)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !blank(l)).map_or(start, |i| i + 1);
    &lines[start..end]
}

// ============ Number formatting ============

/// Seconds with exactly two decimals (`1.2` → `"1.20"`).
pub fn format_seconds(secs: f64) -> String {
    let secs = if secs.is_finite() { secs } else { 0.0 };
    format!("{:.2}", secs)
}

/// Processing time as displayed next to an answer (`"1.20s"`).
pub fn format_processing_time(secs: f64) -> String {
    format!("{}s", format_seconds(secs))
}

/// Base-1024 file size rounded to two decimals, trailing zeros dropped.
///
/// `0` → `"0 Bytes"`, `1536` → `"1.5 KB"`, `1048576` → `"1 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

// ============ Badges and icons ============

/// Badge category shown next to a document in the admin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Pdf,
    Word,
    Excel,
}

impl Badge {
    pub fn label(self) -> &'static str {
        match self {
            Badge::Pdf => "PDF",
            Badge::Word => "WORD",
            Badge::Excel => "EXCEL",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Badge::Pdf => "badge-pdf",
            Badge::Word => "badge-word",
            Badge::Excel => "badge-excel",
        }
    }
}

/// Map a file extension to its badge by prefix. Unrecognized extensions get
/// the pdf badge.
pub fn badge_for_extension(ext: &str) -> Badge {
    let ext = ext.trim().to_ascii_lowercase();
    let ext = ext.strip_prefix('.').unwrap_or(&ext);
    if ext.starts_with("pdf") {
        Badge::Pdf
    } else if ext.starts_with("doc") {
        Badge::Word
    } else if ext.starts_with("xls") {
        Badge::Excel
    } else {
        Badge::Pdf
    }
}

/// Icon class for a cited source; unknown kinds get the generic file icon.
pub fn source_icon(kind: &SourceType) -> &'static str {
    match kind {
        SourceType::Pdf => "fa-file-pdf",
        SourceType::Word => "fa-file-word",
        SourceType::Excel => "fa-file-excel",
        SourceType::Other(_) => "fa-file",
    }
}

/// Short bracketed tag used in terminal output.
pub fn source_tag(kind: &SourceType) -> &'static str {
    match kind {
        SourceType::Pdf => "[pdf]",
        SourceType::Word => "[word]",
        SourceType::Excel => "[excel]",
        SourceType::Other(_) => "[file]",
    }
}

// ============ Answer views ============

/// An answer prepared for display.
///
/// The chat transcript shows a limited number of compact source tags; the
/// single-shot panel shows every source with its excerpt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerView {
    pub answer: Answer,
    pub markup: AnswerMarkup,
    pub sources: Vec<Source>,
    pub show_excerpts: bool,
    pub processing_time: String,
}

impl AnswerView {
    /// Compact view: at most `source_limit` sources, no excerpts.
    pub fn compact(answer: Answer, source_limit: usize) -> Self {
        let sources = answer.sources.iter().take(source_limit).cloned().collect();
        Self::build(answer, sources, false)
    }

    /// Full view: every source with its excerpt.
    pub fn full(answer: Answer) -> Self {
        let sources = answer.sources.clone();
        Self::build(answer, sources, true)
    }

    fn build(answer: Answer, sources: Vec<Source>, show_excerpts: bool) -> Self {
        Self {
            markup: AnswerMarkup::parse(&answer.answer),
            processing_time: format_processing_time(answer.processing_time),
            sources,
            show_excerpts,
            answer,
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"answer\">");
        html.push_str(&self.markup.to_html());
        html.push_str("</div>");

        if !self.sources.is_empty() {
            html.push_str("<div class=\"sources\">");
            for source in &self.sources {
                if self.show_excerpts {
                    html.push_str("<div class=\"source-item\">");
                    html.push_str(&source_heading_html(source));
                    if let Some(content) = &source.content {
                        html.push_str("<p class=\"source-content\">");
                        html.push_str(&escape_html(content));
                        html.push_str("</p>");
                    }
                    html.push_str("</div>");
                } else {
                    html.push_str(&format!(
                        "<span class=\"source-tag\">{}</span>",
                        source_heading_html(source)
                    ));
                }
            }
            html.push_str("</div>");
        }

        html.push_str(&format!(
            "<div class=\"processing-time\">{}</div>",
            escape_html(&self.processing_time)
        ));
        html
    }

    pub fn to_terminal(&self) -> String {
        let mut out = self.markup.to_terminal();
        if !self.sources.is_empty() {
            out.push_str("\n\nSources:");
            for source in &self.sources {
                out.push_str(&format!("\n  {} {}", source_tag(&source.kind), source.filename));
                if self.show_excerpts {
                    if let Some(content) = &source.content {
                        out.push_str(&format!("\n      {}", content.replace('\n', " ")));
                    }
                }
            }
        }
        out.push_str(&format!("\n\n({})", self.processing_time));
        out
    }
}

fn source_heading_html(source: &Source) -> String {
    format!(
        "<i class=\"fas {}\"></i> {}",
        source_icon(&source.kind),
        escape_html(&source.filename)
    )
}

// ============ Chat bubbles and alerts ============

pub fn user_bubble_html(question: &str) -> String {
    format!(
        "<div class=\"message user-message\"><div class=\"message-content\">{}</div></div>",
        escape_html(question)
    )
}

pub fn assistant_bubble_html(view: &AnswerView) -> String {
    format!(
        "<div class=\"message assistant-message\"><div class=\"message-content\">{}</div></div>",
        view.to_html()
    )
}

/// Error bubble/alert; visually distinct from a normal answer.
pub fn error_alert_html(message: &str) -> String {
    format!(
        "<div class=\"message error-message\" role=\"alert\">{}</div>",
        escape_html(message)
    )
}

// ============ Document table ============

pub fn format_upload_date(doc: &Document) -> String {
    doc.upload_date.format("%Y-%m-%d %H:%M").to_string()
}

/// Admin document table, or the explicit placeholder when empty.
pub fn document_table_html(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "<p class=\"empty-state\">No documents uploaded yet.</p>".to_string();
    }
    let mut html = String::from(
        "<table class=\"documents\"><thead><tr><th>Filename</th><th>Type</th>\
         <th>Size</th><th>Uploaded</th><th>Status</th><th></th></tr></thead><tbody>",
    );
    for doc in docs {
        let badge = badge_for_extension(&doc.file_type);
        let filename = escape_html(&doc.filename);
        html.push_str(&format!(
            "<tr><td>{filename}</td><td><span class=\"badge {}\">{}</span></td>\
             <td>{}</td><td>{}</td><td>{}</td>\
             <td><button class=\"delete\" data-filename=\"{filename}\">Delete</button></td></tr>",
            badge.css_class(),
            badge.label(),
            format_file_size(doc.size),
            format_upload_date(doc),
            if doc.indexed { "Indexed" } else { "Pending" },
        ));
    }
    html.push_str("</tbody></table>");
    html
}

pub fn document_table_text(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No documents uploaded yet.".to_string();
    }
    let mut out = format!(
        "{:<40} {:<6} {:>10}  {:<16}  {}",
        "FILENAME", "TYPE", "SIZE", "UPLOADED", "STATUS"
    );
    for doc in docs {
        out.push_str(&format!(
            "\n{:<40} {:<6} {:>10}  {:<16}  {}",
            doc.filename,
            badge_for_extension(&doc.file_type).label(),
            format_file_size(doc.size),
            format_upload_date(doc),
            if doc.indexed { "indexed" } else { "pending" },
        ));
    }
    out
}
