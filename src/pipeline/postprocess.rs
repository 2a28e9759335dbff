//! Deterministic cleanup of extracted text and Markdown.
//!
//! Text coming out of a PDF text layer, a DOCX body or an HTML page carries
//! layout noise: CRLF endings, trailing blanks, runs of empty lines, words
//! split across lines with a hyphen, zero-width characters. The rules here
//! remove that noise without touching content. Each is a pure
//! `&str → String` pass.
//!
//! ## Rule order
//!
//! Line endings are normalised first so every later rule only sees `\n`.
//! De-hyphenation runs before whitespace trimming so a hyphen followed by
//! trailing blanks is still recognised as a line break split.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cleanup for Markdown produced by an extraction handler.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF and CR → LF), drop form feeds
/// 2. Join words hyphenated across a line break (PDF text only)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive newlines down to one blank line
/// 5. Ensure heading lines have a blank line before them
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str, dehyphenate: bool) -> String {
    let s = normalise_line_endings(input);
    let s = if dehyphenate { join_hyphenated(&s) } else { s };
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

/// Cleanup for plain-text output: the same rules minus heading spacing.
pub fn clean_text(input: &str, dehyphenate: bool) -> String {
    let s = normalise_line_endings(input);
    let s = if dehyphenate { join_hyphenated(&s) } else { s };
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n\n")
}

// ── Rule 2: Join hyphenated line breaks ──────────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll})-[ \t]*\n[ \t]*(\p{Ll})").expect("valid regex"));

fn join_hyphenated(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").to_string()
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Normalise heading spacing ────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} \S").expect("valid regex"));

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_fence = false;
    for (i, line) in input.lines().enumerate() {
        if line.starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && RE_HEADING.is_match(line) && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 6: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 7: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
