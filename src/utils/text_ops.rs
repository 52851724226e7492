// Text normalization helpers shared by the pipeline and its glue layers

/// Fold CRLF and lone CR line breaks into `\n`. Input boundaries must call
/// this before detection so occurrence counts never depend on the line-break
/// convention of the paste source.
pub fn normalize_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Remove invisible joiner/marker characters that survive copy round-trips
/// and corrupt downstream consumers: ZWSP, ZWNJ, ZWJ, word joiner, BOM.
pub fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|ch| !matches!(ch, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}'))
        .collect()
}

/// Normalize raw engine output for reconciliation: drop all whitespace, then
/// truncate to `max_chars` characters. Never pads - a short result stays
/// short and is reported as a mismatch by the caller.
pub fn normalize_recognition(raw: &str, max_chars: usize) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace())
        .take(max_chars)
        .collect()
}
