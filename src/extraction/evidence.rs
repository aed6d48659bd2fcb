use super::*;

const EVIDENCE_RADIUS: usize = 40;
const WORD_BOUNDARY_REACH: usize = 80;
pub const EVIDENCE_MAX_CHARS: usize = 160;

pub(super) fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub(super) fn byte_to_char_offset(text: &str, byte_offset: usize) -> usize {
    let byte_offset = byte_offset.min(text.len());
    text.char_indices()
        .take_while(|(index, _)| *index < byte_offset)
        .count()
}

pub(super) fn slice_chars(text: &str, span: CharSpan) -> String {
    text.chars()
        .skip(span.start)
        .take(span.end.saturating_sub(span.start))
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Builds the display snippet for a winning span.
///
/// The window is the span plus `EVIDENCE_RADIUS` characters each side, pushed
/// out to word boundaries (at most `WORD_BOUNDARY_REACH` from the span) so
/// tokens are not cut mid-word. Whitespace is collapsed to single spaces and
/// the result is capped at `EVIDENCE_MAX_CHARS`. Spans outside the note are
/// clamped, never rejected.
pub fn build_evidence_snippet(note_text: &str, span: CharSpan) -> String {
    let chars = note_text.chars().collect::<Vec<char>>();
    let len = chars.len();
    if len == 0 {
        return String::new();
    }

    let span_start = span.start.min(len);
    let span_end = span.end.clamp(span_start, len);

    let mut start = span_start.saturating_sub(EVIDENCE_RADIUS);
    let left_limit = span_start.saturating_sub(WORD_BOUNDARY_REACH);
    while start > left_limit && start < len && chars[start].is_alphanumeric() {
        start -= 1;
    }

    let mut end = (span_end + EVIDENCE_RADIUS).min(len);
    let right_limit = (span_end + WORD_BOUNDARY_REACH).min(len);
    while end < right_limit && end > 0 && chars[end - 1].is_alphanumeric() {
        end += 1;
    }

    let window = chars[start..end].iter().collect::<String>();
    let snippet = collapse_whitespace(&window);

    if snippet.chars().count() > EVIDENCE_MAX_CHARS {
        let head = snippet
            .chars()
            .take(EVIDENCE_MAX_CHARS - 3)
            .collect::<String>();
        format!("{}...", head.trim_end())
    } else {
        snippet
    }
}
