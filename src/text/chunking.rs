//! Byte-bounded chunk planning for speech synthesis
//!
//! The synthesis endpoint rejects requests over 5000 bytes, so each section
//! is split into chunks of at most `max_bytes` UTF-8 bytes. Breaks prefer
//! logical boundaries: headings, then paragraphs, then sentences, then words.
//! A single word longer than the budget is truncated to half the budget,
//! which is the only lossy case.

use super::heading;

/// Default chunk budget (margin under the endpoint's 5000-byte cap)
pub const DEFAULT_MAX_BYTES: usize = 3000;

/// One unit of synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    text: String,
}

impl Chunk {
    fn new(text: String) -> Self {
        Self { text }
    }

    /// Chunk text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in UTF-8 bytes, the unit the endpoint limit is measured in
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.text.len()
    }

    /// Consume the chunk, returning its text
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

type Fallback = fn(&str, usize) -> Vec<String>;

/// Plan the chunks for `text`, each at most `max_bytes` bytes.
///
/// When `max_bytes` is 0, [`DEFAULT_MAX_BYTES`] is used.
/// Every returned chunk is non-empty.
///
/// # Examples
///
/// ```
/// use recital::text::chunking::plan;
///
/// let chunks = plan("short", 100);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text(), "short");
/// ```
#[must_use]
pub fn plan(text: &str, max_bytes: usize) -> Vec<Chunk> {
    let limit = if max_bytes == 0 {
        DEFAULT_MAX_BYTES
    } else {
        max_bytes
    };

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.len() <= limit {
        return vec![Chunk::new(text.to_string())];
    }

    let (strategy, pieces) = match split_by_headings(text, limit) {
        Some(pieces) if pieces.iter().all(|p| p.len() <= limit) => ("heading", pieces),
        _ => ("sentence", split_by_sentences(text, limit)),
    };

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .map(Chunk::new)
        .collect();

    tracing::debug!(
        strategy,
        chunks = chunks.len(),
        bytes = text.len(),
        limit,
        "planned chunks"
    );

    chunks
}

/// Heading-level splitting.
///
/// Each heading-like line starts a new chunk that runs until the next
/// heading. Returns `None` when no internal structure is found. Oversized
/// groups fall through to paragraph and then sentence splitting.
fn split_by_headings(text: &str, limit: usize) -> Option<Vec<String>> {
    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if heading::is_heading(line) && current.iter().any(|l| !l.trim().is_empty()) {
            groups.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let groups: Vec<String> = groups
        .iter()
        .map(|lines| lines.join("\n").trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();

    if groups.len() < 2 {
        return None;
    }

    let mut chunks = Vec::new();
    for group in groups {
        if group.len() <= limit {
            chunks.push(group);
        } else {
            chunks.extend(split_by_paragraphs(&group, limit));
        }
    }

    Some(chunks)
}

/// Paragraph-level splitting on blank lines, falling back to sentences
fn split_by_paragraphs(text: &str, limit: usize) -> Vec<String> {
    let segments: Vec<&str> = text.split("\n\n").collect();
    assemble_chunks(&segments, limit, "\n\n", split_by_sentences)
}

/// Sentence-level splitting, falling back to words
fn split_by_sentences(text: &str, limit: usize) -> Vec<String> {
    let segments = split_on_sentences(text);
    assemble_chunks(&segments, limit, " ", split_by_words)
}

/// Word-level splitting, falling back to truncation
fn split_by_words(text: &str, limit: usize) -> Vec<String> {
    let segments: Vec<&str> = text.split_whitespace().collect();
    assemble_chunks(&segments, limit, " ", truncate_word)
}

/// Keep the first `floor(limit / 2)` bytes of an oversized word
fn truncate_word(word: &str, limit: usize) -> Vec<String> {
    let mut end = (limit / 2).min(word.len());
    while end > 0 && !word.is_char_boundary(end) {
        end -= 1;
    }

    tracing::warn!(
        word_bytes = word.len(),
        kept = end,
        limit,
        "truncating word longer than chunk budget"
    );

    if end == 0 {
        Vec::new()
    } else {
        vec![word[..end].to_string()]
    }
}

/// Split text after sentence-ending punctuation followed by whitespace.
///
/// The punctuation stays attached to the preceding segment.
#[must_use]
fn split_on_sentences(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    let mut i = 0;
    while i < bytes.len().saturating_sub(1) {
        let is_sentence_end =
            matches!(bytes[i], b'.' | b'!' | b'?') && bytes[i + 1].is_ascii_whitespace();

        if is_sentence_end {
            let end = i + 2;
            let seg = &text[start..end];
            if !seg.trim().is_empty() {
                segments.push(seg);
            }
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }

    if start < text.len() {
        let seg = &text[start..];
        if !seg.trim().is_empty() {
            segments.push(seg);
        }
    }

    segments
}

/// Greedily pack segments into chunks that fit within `limit`.
///
/// A segment that alone exceeds the limit is split with `fallback`.
fn assemble_chunks(
    segments: &[&str],
    limit: usize,
    separator: &str,
    fallback: Fallback,
) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for &segment in segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + separator.len() + trimmed.len()
        };

        if needed <= limit {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(trimmed);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if trimmed.len() <= limit {
            current.push_str(trimmed);
        } else {
            chunks.extend(fallback(trimmed, limit));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
