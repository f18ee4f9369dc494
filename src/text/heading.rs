//! Heading detection heuristics
//!
//! Legislative analyses rarely use consistent markdown, so "is this line a
//! heading" is answered by a short ordered list of named rules. The first
//! rule that matches wins; [`matching_rule`] reports which one for logging.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::PAUSE_TOKEN;

/// Lines at or above this many bytes are never treated as short headings
pub const MAX_HEADING_LEN: usize = 100;

/// Words allowed to stay lowercase inside a title-case line
const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to", "vs",
    "with",
];

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid regex"));

static NUMBERED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{1,3})*\.\s+\S").expect("valid regex"));

/// A named "looks like a heading" predicate
#[derive(Debug, Clone, Copy)]
pub struct HeadingRule {
    /// Stable rule name, used in logs and tests
    pub name: &'static str,
    /// Predicate over a single trimmed line
    pub matches: fn(&str) -> bool,
}

/// Heading rules in priority order
pub const HEADING_RULES: &[HeadingRule] = &[
    HeadingRule {
        name: "markdown",
        matches: is_markdown_heading,
    },
    HeadingRule {
        name: "numbered",
        matches: is_numbered_title,
    },
    HeadingRule {
        name: "all-caps",
        matches: is_all_caps,
    },
    HeadingRule {
        name: "colon-terminated",
        matches: is_colon_terminated,
    },
    HeadingRule {
        name: "title-case",
        matches: is_title_case,
    },
];

/// Return the first rule that classifies `line` as a heading
///
/// A trailing pause marker is ignored, so lines already annotated for
/// speech classify the same as the plain text.
#[must_use]
pub fn matching_rule(line: &str) -> Option<&'static HeadingRule> {
    let line = line.trim().trim_end_matches(PAUSE_TOKEN).trim_end();
    if line.is_empty() {
        return None;
    }
    HEADING_RULES.iter().find(|rule| (rule.matches)(line))
}

/// Whether `line` looks like a heading under any rule
#[must_use]
pub fn is_heading(line: &str) -> bool {
    matching_rule(line).is_some()
}

/// `# Title` through `###### Title`
#[must_use]
pub fn is_markdown_heading(line: &str) -> bool {
    MARKDOWN_HEADING.is_match(line)
}

/// `1. Title`, `2.3. Title`
#[must_use]
pub fn is_numbered_title(line: &str) -> bool {
    line.len() < MAX_HEADING_LEN && NUMBERED_TITLE.is_match(line)
}

/// `SEC. 101. SHORT TITLE`
#[must_use]
pub fn is_all_caps(line: &str) -> bool {
    if line.len() >= MAX_HEADING_LEN {
        return false;
    }
    let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
    if letters.peek().is_none() {
        return false;
    }
    let mut count = 0usize;
    for c in letters {
        if !c.is_uppercase() {
            return false;
        }
        count += 1;
    }
    count >= 2
}

/// `Fiscal Effect:`
#[must_use]
pub fn is_colon_terminated(line: &str) -> bool {
    line.len() < MAX_HEADING_LEN
        && line.ends_with(':')
        && line.chars().next().is_some_and(char::is_uppercase)
}

/// `Arguments in Support`, a short line with no sentence punctuation
#[must_use]
pub fn is_title_case(line: &str) -> bool {
    if line.len() >= MAX_HEADING_LEN || line.ends_with(['.', '!', '?', ',', ';']) {
        return false;
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 12 {
        return false;
    }

    let starts_upper = |w: &str| w.chars().next().is_some_and(char::is_uppercase);
    if !starts_upper(words[0]) {
        return false;
    }

    words.iter().skip(1).all(|w| {
        let Some(first) = w.chars().next() else {
            return true;
        };
        if !first.is_alphabetic() {
            return true;
        }
        first.is_uppercase() || MINOR_WORDS.contains(&w.to_lowercase().as_str())
    })
}
