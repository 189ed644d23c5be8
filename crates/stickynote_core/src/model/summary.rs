//! List projection of notes.
//!
//! # Responsibility
//! - Derive the display preview shown in the notes list.
//! - Define the deterministic list ordering.
//!
//! # Invariants
//! - Summaries are read-only projections and are never written back.
//! - Ordering depends on `created_at` and `id` only, so editing a note never
//!   moves it in the list.

use crate::model::note::{Note, NoteId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

const PREVIEW_MAX_CHARS: usize = 50;
const EMPTY_PREVIEW: &str = "Empty note";

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("valid entity regex")
});

/// Cached list entry for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub id: NoteId,
    /// Plain-text preview, at most 50 chars plus an ellipsis.
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Note> for NoteSummary {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            preview: derive_preview(&note.content),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Derives the list preview from serialized rich-text content.
///
/// Rules:
/// - markup tags are removed, so adjacent blocks join (`<p>a</p><p>b</p>`
///   reads `ab`), then character references are decoded;
/// - whitespace runs collapse to one space;
/// - blank results become `Empty note`;
/// - text longer than 50 chars is cut to 50 chars followed by `...`.
pub fn derive_preview(content: &str) -> String {
    let without_tags = MARKUP_TAG_RE.replace_all(content, "");
    let decoded = decode_entities(&without_tags);
    let normalized = WHITESPACE_RE.replace_all(&decoded, " ");
    let text = normalized.trim();
    if text.is_empty() {
        return EMPTY_PREVIEW.to_string();
    }
    if text.chars().count() > PREVIEW_MAX_CHARS {
        let mut cut: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
        cut.push_str("...");
        return cut;
    }
    text.to_string()
}

fn decode_entities(text: &str) -> std::borrow::Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => ch.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// List order: newest `created_at` first, ties by ascending id.
pub fn display_order(a: &NoteSummary, b: &NoteSummary) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Projects notes to summaries sorted by [`display_order`].
pub fn summarize(notes: &[Note]) -> Vec<NoteSummary> {
    let mut summaries: Vec<NoteSummary> = notes.iter().map(NoteSummary::from).collect();
    summaries.sort_by(display_order);
    summaries
}

#[cfg(test)]
mod tests {
    use super::{derive_preview, summarize};
    use crate::model::note::{Note, NoteId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn preview_strips_markup_and_collapses_whitespace() {
        assert_eq!(
            derive_preview("<h1>Groceries</h1>\n<ul><li>milk</li></ul>"),
            "Groceries milk"
        );
    }

    #[test]
    fn preview_reads_like_rendered_text() {
        assert_eq!(derive_preview("<p>a</p><p>b</p>"), "ab");
        assert_eq!(
            derive_preview("<p>salt &amp; pepper &lt;3 &#169; &#x2014; &bogus;</p>"),
            "salt & pepper <3 \u{a9} \u{2014} &bogus;"
        );
        assert_eq!(derive_preview("<p>&lt;b&gt;kept&lt;/b&gt;</p>"), "<b>kept</b>");
        assert_eq!(derive_preview("<p>&nbsp;</p>"), "Empty note");
    }

    #[test]
    fn blank_content_previews_as_empty_note() {
        assert_eq!(derive_preview(""), "Empty note");
        assert_eq!(derive_preview("<p></p>"), "Empty note");
    }

    #[test]
    fn long_preview_is_truncated_with_ellipsis() {
        let preview = derive_preview(&"x".repeat(80));
        assert_eq!(preview.chars().count(), 53);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn summaries_sort_newest_created_first_then_by_id() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let notes = vec![
            Note::with_id(NoteId::from("b"), older),
            Note::with_id(NoteId::from("a"), older),
            Note::with_id(NoteId::from("c"), newer),
        ];
        let ids: Vec<String> = summarize(&notes)
            .into_iter()
            .map(|summary| summary.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
