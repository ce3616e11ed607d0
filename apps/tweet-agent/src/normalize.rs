//! Turns generated text into a platform-valid post.

use serde::Serialize;
use tracing::warn;

/// Character budget of a single post.
pub const MAX_POST_CHARS: usize = 280;
/// Marker appended to clamped text.
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// Never longer than [`MAX_POST_CHARS`] characters.
    pub text: String,
    pub source_link: Option<String>,
}

impl Post {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `budget` characters, ending in [`ELLIPSIS`] when cut.
pub fn clamp(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let marker = ELLIPSIS.chars().count();
    if budget < marker {
        return text.chars().take(budget).collect();
    }
    let mut clamped: String = text.chars().take(budget - marker).collect();
    clamped.push_str(ELLIPSIS);
    clamped
}

/// Normalize generated text, appending `link` so that it is never truncated.
///
/// Without a link the text is clamped to [`MAX_POST_CHARS`]. With a link the
/// body is clamped to `MAX_POST_CHARS - 1 - len(link)` and the link follows
/// after one space. A copy of the link already inside the body (as a whole
/// word) is dropped so it does not appear twice.
pub fn normalize(raw: &str, link: Option<&str>) -> Post {
    let body = collapse_whitespace(raw);
    let link = link.map(str::trim).filter(|l| !l.is_empty());

    let Some(link) = link else {
        return Post { text: clamp(&body, MAX_POST_CHARS), source_link: None };
    };

    let link_chars = link.chars().count();
    if link_chars > MAX_POST_CHARS {
        warn!(link_chars, "Source link longer than a whole post, dropping it");
        return Post { text: clamp(&body, MAX_POST_CHARS), source_link: None };
    }

    let body = body
        .split_whitespace()
        .filter(|word| *word != link)
        .collect::<Vec<_>>()
        .join(" ");
    let budget = MAX_POST_CHARS.saturating_sub(link_chars + 1);
    let body = clamp(&body, budget);

    let text = if body.is_empty() {
        link.to_string()
    } else {
        format!("{body} {link}")
    };
    Post { text, source_link: Some(link.to_string()) }
}
