//! Byte-bounded text splitting on word boundaries

/// Splits text into ordered parts of at most `budget` UTF-8 bytes
///
/// Text that already fits is returned as a single, unchanged part. Longer
/// text is split on whitespace: words are accumulated while the part's byte
/// count plus `word + " "` stays within the budget, otherwise the part is
/// closed and the word starts the next one. A single word longer than the
/// budget becomes its own oversized part; it is never split further.
///
/// Whitespace between words is collapsed to single spaces in multi-part
/// output. Empty input yields no parts, so no returned part is ever empty.
///
/// # Examples
///
/// ```
/// use delve::index::chunk_text;
///
/// assert_eq!(chunk_text("short text", 100), vec!["short text"]);
/// assert_eq!(chunk_text("aaa bbb ccc", 8), vec!["aaa bbb", "ccc"]);
/// ```
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    if text.len() <= budget {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let cost = word.len() + 1;
        if !current.is_empty() && current.len() + cost > budget {
            parts.push(current.trim_end().to_string());
            current.clear();
        }
        current.push_str(word);
        current.push(' ');
    }

    let tail = current.trim_end();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }

    parts
}

/// Joins parts back together in order with single spaces
pub fn reconstruct<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}
