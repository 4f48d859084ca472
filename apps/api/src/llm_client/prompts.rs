// Cross-cutting prompt utilities. Each module that issues LLM calls defines
// its own prompts.rs alongside it; this file holds the shared pieces.

/// Clips text to at most `max_chars` characters, on a char boundary.
/// Every prompt template sets an explicit budget per input at its call site.
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
