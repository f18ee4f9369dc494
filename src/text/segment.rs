//! Splitting a document into independently playable sections
//!
//! Sections start at second-level (`## `) headings. First-level and deeper
//! headings are ordinary content. Anything before the first `## ` becomes an
//! implicit "Introduction" section when it is not blank.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Header given to content that precedes the first section heading
pub const INTRODUCTION: &str = "Introduction";

/// Opaque section identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SectionId(Uuid);

impl SectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logical section of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Opaque identifier, unique per segmentation
    pub id: SectionId,
    /// Heading text without the `## ` marker
    pub header: String,
    /// Lines between this heading and the next, trimmed
    pub raw_text: String,
    /// Position in the document, strictly increasing
    pub order_index: usize,
    /// Whether this is the implicit leading section
    pub implicit: bool,
}

impl Section {
    /// Text to be spoken: the header line (unless implicit) followed by the body
    #[must_use]
    pub fn spoken_text(&self) -> String {
        if self.implicit || self.header.is_empty() {
            self.raw_text.clone()
        } else if self.raw_text.is_empty() {
            self.header.clone()
        } else {
            format!("{}\n{}", self.header, self.raw_text)
        }
    }
}

/// Return the header text if `line` is a second-level heading
fn section_heading(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("##")?;
    if rest.starts_with('#') || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let header = rest.trim().trim_end_matches('#').trim_end();
    (!header.is_empty()).then_some(header)
}

/// Close the running section, dropping a blank implicit introduction
fn flush_section(header: Option<String>, body: &mut Vec<&str>, sections: &mut Vec<Section>) {
    let raw_text = body.join("\n").trim().to_string();
    body.clear();

    let (header, implicit) = match header {
        Some(h) => (h, false),
        None if raw_text.is_empty() => return,
        None => (INTRODUCTION.to_string(), true),
    };

    let order_index = sections.len();
    sections.push(Section {
        id: SectionId::new(),
        header,
        raw_text,
        order_index,
        implicit,
    });
}

/// Split `text` into sections at `## ` headings, in document order
#[must_use]
pub fn segment(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut header: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(next) = section_heading(line) {
            flush_section(header.take(), &mut body, &mut sections);
            header = Some(next.to_string());
        } else {
            body.push(line);
        }
    }
    flush_section(header, &mut body, &mut sections);

    tracing::debug!(sections = sections.len(), "segmented document");
    sections
}

/// Resolve a free-text header query to a section
///
/// Matching is case-insensitive substring containment in either direction.
/// When several headers match, the first one in document order wins.
#[must_use]
pub fn find_by_header<'a>(sections: &'a [Section], query: &str) -> Option<&'a Section> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    sections.iter().find(|s| {
        let header = s.header.to_lowercase();
        !header.is_empty() && (header.contains(&query) || query.contains(&header))
    })
}
