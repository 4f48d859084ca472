//! Output sanitation for model replies.
//!
//! Two pure, deterministic cleaners:
//! - `extract_json` pulls the first JSON object/array substring out of a
//!   reply that may be fenced or preceded by commentary.
//! - `clean_markdown` strips code fences and leading conversational filler
//!   from generated document text.
//!
//! Both prefer under-stripping: when in doubt, leave the line in.

/// Returns the first well-formed-looking JSON object or array substring.
///
/// Finds the first `{` or `[` (whichever comes first) and slices to the last
/// matching closer. Returns the input unchanged when no delimiter is found —
/// the caller's parse then fails with a typed error.
pub fn extract_json(text: &str) -> &str {
    let first_brace = text.find('{');
    let first_bracket = text.find('[');

    let start = match (first_brace, first_bracket) {
        (Some(brace), Some(bracket)) => brace.min(bracket),
        (Some(brace), None) => brace,
        (None, Some(bracket)) => bracket,
        (None, None) => return text,
    };

    let closer = if text.as_bytes()[start] == b'{' { '}' } else { ']' };
    match text.rfind(closer) {
        Some(end) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Strips code-fence markers and leading conversational filler from
/// generated document text.
pub fn clean_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let defenced = strip_fence_markers(text);
    let lines: Vec<&str> = defenced.lines().collect();

    let mut start = 0;
    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        // A heading is definitely content.
        if line.starts_with('#') {
            start = i;
            break;
        }
        if line.is_empty() {
            continue;
        }
        if is_conversational_filler(line) {
            continue;
        }
        start = i;
        break;
    }

    lines[start..].join("\n").trim().to_string()
}

/// Removes every ``` fence marker together with its immediate language tag.
fn strip_fence_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        let tag_len: usize = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .map(char::len_utf8)
            .sum();
        rest = &rest[tag_len..];
    }
    out.push_str(rest);
    out
}

/// Filler heuristics. Openers must sit on a word boundary so real content
/// that merely starts with a common word ("Surely...") survives.
fn is_conversational_filler(line: &str) -> bool {
    let lower = line.to_lowercase();
    if lower.contains("here is") || lower.contains("tailored resume") {
        return true;
    }
    for opener in ["sure", "certainly", "of course"] {
        if let Some(rest) = lower.strip_prefix(opener) {
            if rest.is_empty() || rest.starts_with([' ', ',', '.', '!', ':']) {
                return true;
            }
        }
    }
    false
}
