use rayon::prelude::*;

/// Maximum number of characters in a snippet before truncation.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 400;

/// Separator placed between matching lines of one document.
pub const SNIPPET_SEPARATOR: &str = " … ";

/// Cut `text` to at most `max_chars` characters, appending `...` when
/// something was dropped. Never splits a UTF-8 sequence.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Whether `line` contains the lowercase `term`, either verbatim or once all
/// whitespace is removed. OCR output regularly splits words ("In voice").
pub fn line_matches(line: &str, term: &str) -> bool {
    let lower = line.to_lowercase();
    if lower.contains(term) {
        return true;
    }
    let squashed: String =
        lower.chars().filter(|c| !c.is_whitespace()).collect();
    squashed.contains(term)
}

/// All lines of `text` matching `term`, in document order, trimmed.
///
/// Lines are checked in parallel; a long multi-page OCR text is the common
/// case.
pub fn matching_lines<'a>(text: &'a str, term: &str) -> Vec<&'a str> {
    let lines: Vec<&str> = text.lines().collect();
    lines
        .into_par_iter()
        .filter(|line| line_matches(line, term))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Build the context snippet for the lines of one document that matched.
pub fn join_snippets<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SNIPPET_SEPARATOR);
    truncate_snippet(&joined, DEFAULT_SNIPPET_MAX_CHARS)
}
