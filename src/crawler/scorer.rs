//! Priority scoring of extracted pages
//!
//! The score only decides whether a page is worth sending to the content
//! analyzer; it never changes visit order.

use crate::crawler::parser::ExtractedPage;

/// Title or description substrings that suggest article-like content
const ARTICLE_KEYWORDS: &[&str] = &["article", "post", "blog", "news", "tutorial", "guide"];

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Scores a page in `[1, 10]`
///
/// | Signal | Points |
/// |--------|--------|
/// | Baseline | `10 - depth` |
/// | Text longer than 500 chars | +2 |
/// | Title longer than 10 chars | +1 |
/// | Description longer than 50 chars | +1 |
/// | Article keyword in title or description | +3 |
pub fn score(page: &ExtractedPage, depth: u32) -> u8 {
    let title = page.title.as_deref().unwrap_or("");
    let description = page.description.as_deref().unwrap_or("");

    let mut score = 10 - i64::from(depth);

    if page.text.chars().count() > 500 {
        score += 2;
    }
    if title.chars().count() > 10 {
        score += 1;
    }
    if description.chars().count() > 50 {
        score += 1;
    }

    let title = title.to_lowercase();
    let description = description.to_lowercase();
    if ARTICLE_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || description.contains(k))
    {
        score += 3;
    }

    score.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8
}
