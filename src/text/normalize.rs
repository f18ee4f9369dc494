//! Markdown cleanup for speech
//!
//! Synthesizers read markup literally ("hash hash Summary", "quote bold
//! quote"), so [`normalize`] strips it down to the words, and
//! [`add_pauses`] marks heading and sentence boundaries with an SSML
//! `<break/>` so the voice phrases structured documents naturally.

use std::sync::LazyLock;

use regex::Regex;

use super::heading;

/// Pause marker understood by SSML-aware synthesizers
pub const PAUSE_TOKEN: &str = "<break/>";

/// Double-quote glyphs that synthesizers tend to read as "inches"
const QUOTE_GLYPHS: &[char] = &['"', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2033}', '\u{00AB}', '\u{00BB}'];

static HORIZONTAL_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").expect("valid regex")
});

static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s*").expect("valid regex"));

static CLOSING_HASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+#+\s*$").expect("valid regex"));

static BLOCK_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:>\s?)+").expect("valid regex"));

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+").expect("valid regex"));

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

static UNDERSCORE_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_+|_+\b").expect("valid regex"));

static ELLIPSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{3,}|\u{2026}").expect("valid regex"));

static DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\u{2014}\u{2013}]\s*").expect("valid regex"));

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])\s+(\S)").expect("valid regex"));

/// Strip markdown and troublesome glyphs, keeping the words in order
///
/// Fenced code blocks are dropped whole; link and image text is kept.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || HORIZONTAL_RULE.is_match(line) {
            continue;
        }
        lines.push(normalize_line(line));
    }

    collapse_blank_lines(&lines)
}

fn normalize_line(line: &str) -> String {
    let mut out = line.to_string();

    if HEADING_MARKER.is_match(&out) {
        out = HEADING_MARKER.replace(&out, "").into_owned();
        out = CLOSING_HASHES.replace(&out, "").into_owned();
    }
    out = BLOCK_QUOTE.replace(&out, "").into_owned();
    out = BULLET.replace(&out, "").into_owned();

    out = IMAGE.replace_all(&out, "$1").into_owned();
    out = LINK.replace_all(&out, "$1").into_owned();

    out = out.replace(['*', '`'], "").replace("~~", "");
    out = UNDERSCORE_EMPHASIS.replace_all(&out, "").into_owned();
    out = out.replace(QUOTE_GLYPHS, "");

    out = DASH.replace_all(&out, " - ").into_owned();
    out = ELLIPSIS
        .replace_all(&out, format!(" {PAUSE_TOKEN} ").as_str())
        .into_owned();

    SPACES.replace_all(out.trim(), " ").into_owned()
}

/// Join lines, keeping at most one blank line between paragraphs
fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out = String::new();
    let mut blank_run = 0;

    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

/// Append a pause after heading-like lines and between sentences
#[must_use]
pub fn add_pauses(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                String::new()
            } else if heading::is_heading(trimmed) {
                if trimmed.ends_with(PAUSE_TOKEN) {
                    trimmed.to_string()
                } else {
                    format!("{trimmed} {PAUSE_TOKEN}")
                }
            } else {
                SENTENCE_BREAK
                    .replace_all(trimmed, format!("${{1}} {PAUSE_TOKEN} ${{2}}").as_str())
                    .into_owned()
            }
        })
        .collect();

    lines.join("\n")
}

/// Full speech preparation: [`normalize`] then [`add_pauses`]
#[must_use]
pub fn prepare_for_speech(text: &str) -> String {
    add_pauses(&normalize(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(add_pauses(""), "");
    }

    #[test]
    fn strips_heading_emphasis_and_quotes() {
        let out = normalize("## Heading\n**bold** text with \"quotes\"");
        assert!(!out.contains('#'));
        assert!(!out.contains('*'));
        assert!(!out.contains('"'));
        assert_eq!(out, "Heading\nbold text with quotes");
    }

    #[test]
    fn strips_curly_quotes() {
        let out = normalize("He said \u{201C}no\u{201D} twice");
        assert_eq!(out, "He said no twice");
    }

    #[test]
    fn keeps_apostrophes() {
        assert_eq!(normalize("The bill doesn't pass"), "The bill doesn't pass");
    }

    #[test]
    fn keeps_link_and_image_text() {
        let out = normalize("See [the statute](https://example.com) and ![a chart](c.png)");
        assert_eq!(out, "See the statute and a chart");
    }

    #[test]
    fn drops_code_fences_and_rules() {
        let out = normalize("Before\n```\nlet x = 1;\n```\n---\nAfter");
        assert_eq!(out, "Before\nAfter");
    }

    #[test]
    fn strips_quotes_and_list_markers() {
        let out = normalize("> quoted line\n- first item\n* second item\n1. numbered stays");
        assert_eq!(out, "quoted line\nfirst item\nsecond item\n1. numbered stays");
    }

    #[test]
    fn underscore_emphasis_removed_but_identifiers_kept() {
        assert_eq!(normalize("_really_ important"), "really important");
        assert_eq!(normalize("snake_case stays"), "snake_case stays");
    }

    #[test]
    fn dashes_become_spaced_hyphens() {
        assert_eq!(normalize("costs\u{2014}about $5\u{2013}$6"), "costs - about $5 - $6");
    }

    #[test]
    fn ellipses_become_pauses() {
        assert_eq!(normalize("Wait... then\u{2026}go"), "Wait <break/> then <break/> go");
    }

    #[test]
    fn collapses_blank_lines() {
        assert_eq!(normalize("A\n\n\n\nB"), "A\n\nB");
    }

    #[test]
    fn pauses_after_headings() {
        let out = add_pauses("SUMMARY\nThe bill does things.");
        assert_eq!(out, "SUMMARY <break/>\nThe bill does things.");
    }

    #[test]
    fn pauses_between_sentences() {
        let out = add_pauses("one thing happened. then another! fine");
        assert_eq!(out, "one thing happened. <break/> then another! <break/> fine");
    }

    #[test]
    fn normalize_is_deterministic() {
        let text = "# T\n*a* [b](c) \u{2026} \"d\"";
        assert_eq!(normalize(text), normalize(text));
        assert_eq!(prepare_for_speech(text), prepare_for_speech(text));
    }
}
