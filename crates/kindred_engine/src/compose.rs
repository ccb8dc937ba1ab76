//! SMS-length-aware response shaping.

const ELLIPSIS: &str = "...";

/// Fit `text` into `max_len` characters without cutting mid-word.
///
/// Whole sentences are accumulated greedily while they fit within
/// `max_len - 3` (room reserved for the ellipsis marker); if anything was
/// dropped, the marker is appended. When not even one sentence fits, the
/// result degrades to the marker alone (clipped if `max_len < 3`). The
/// output never exceeds `max_len` characters.
pub fn truncate_for_channel(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let budget = max_len.saturating_sub(ELLIPSIS.len());
    let mut out = String::new();
    let mut used = 0;
    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if used + len > budget {
            break;
        }
        out.push_str(sentence);
        used += len;
    }

    let mut result: String = out.trim_end().to_string();
    result.extend(ELLIPSIS.chars());
    // Clamp for pathological limits (max_len < 3).
    if result.chars().count() > max_len {
        result = result.chars().take(max_len).collect();
    }
    result
}

/// Split on sentence boundaries, keeping the terminator (and any following
/// whitespace) attached to its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut boundary = false;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            boundary = true;
        } else if boundary && !c.is_whitespace() {
            sentences.push(&text[start..i]);
            start = i;
            boundary = false;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
