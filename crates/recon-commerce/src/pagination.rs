//! Cursor handling for the order search endpoint.
//!
//! The search returns `metadata.cursors.next` on every page except the last.
//! Two upstream quirks are absorbed here: an empty-string cursor on the last
//! page, and a `hasNext: false` page that still carries a cursor.

use crate::types::PagingMetadata;

/// The cursor to request next, or `None` when pagination is finished.
#[must_use]
pub fn next_cursor(metadata: Option<&PagingMetadata>) -> Option<String> {
    let metadata = metadata?;
    if metadata.has_next == Some(false) {
        return None;
    }
    metadata
        .cursors
        .as_ref()
        .and_then(|c| c.next.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
}

/// `true` when upstream echoed back the cursor it was just given.
///
/// Some stores return the request cursor instead of a terminal `null` on the
/// last page. Callers treat this as end of pagination.
#[must_use]
pub fn is_stuck_cursor(requested: Option<&str>, returned: Option<&str>) -> bool {
    matches!((requested, returned), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cursors;

    fn meta(has_next: Option<bool>, next: Option<&str>) -> PagingMetadata {
        PagingMetadata {
            has_next,
            cursors: Some(Cursors {
                next: next.map(str::to_owned),
            }),
        }
    }

    #[test]
    fn returns_next_cursor() {
        assert_eq!(
            next_cursor(Some(&meta(Some(true), Some("abc")))).as_deref(),
            Some("abc")
        );
        assert_eq!(
            next_cursor(Some(&meta(None, Some("abc")))).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn empty_or_missing_cursor_ends_pagination() {
        assert!(next_cursor(None).is_none());
        assert!(next_cursor(Some(&meta(Some(true), Some("  ")))).is_none());
        assert!(next_cursor(Some(&meta(Some(true), None))).is_none());
        assert!(next_cursor(Some(&PagingMetadata::default())).is_none());
    }

    #[test]
    fn has_next_false_wins_over_cursor() {
        assert!(next_cursor(Some(&meta(Some(false), Some("abc")))).is_none());
    }

    #[test]
    fn stuck_cursor_detection() {
        assert!(is_stuck_cursor(Some("c2"), Some("c2")));
        assert!(!is_stuck_cursor(Some("c2"), Some("c3")));
        assert!(!is_stuck_cursor(None, Some("c1")));
        assert!(!is_stuck_cursor(Some("c1"), None));
    }
}
