// smallweb-indexer is a vertical search indexing pipeline for independently
// owned personal and small websites.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Content-change detection for HTML pages: decides the value of
//! `content_last_modified` by comparing the freshly-extracted content
//! against the prior indexed version.

use chrono::{DateTime, Utc};

/// `prev_content`/`prev_mod` come from the prior indexed version of this
/// URL (absent on a new page); `new_content` is what this crawl extracted;
/// `page_last_modified` is the `Last-Modified` response header, if any;
/// `indexed_date` is "now".
pub fn content_last_modified(
    prev_content: Option<&str>,
    prev_mod: Option<DateTime<Utc>>,
    new_content: Option<&str>,
    page_last_modified: Option<DateTime<Utc>>,
    indexed_date: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (prev_content, new_content) {
        (Some(prev), Some(new)) if prev != new => Some(indexed_date),
        (Some(_), Some(_)) => Some(prev_mod.or(page_last_modified).unwrap_or(indexed_date)),
        (None, Some(_)) => Some(page_last_modified.unwrap_or(indexed_date)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn changed_content_uses_indexed_date() {
        assert_eq!(
            content_last_modified(Some("a"), Some(t(1)), Some("b"), Some(t(2)), t(3)),
            Some(t(3))
        );
    }

    #[test]
    fn unchanged_content_carries_over_prev_mod() {
        assert_eq!(
            content_last_modified(Some("a"), Some(t(1)), Some("a"), Some(t(2)), t(3)),
            Some(t(1))
        );
    }

    #[test]
    fn unchanged_content_falls_back_to_page_last_modified() {
        assert_eq!(
            content_last_modified(Some("a"), None, Some("a"), Some(t(2)), t(3)),
            Some(t(2))
        );
    }

    #[test]
    fn unchanged_content_falls_back_to_indexed_date() {
        assert_eq!(
            content_last_modified(Some("a"), None, Some("a"), None, t(3)),
            Some(t(3))
        );
    }

    #[test]
    fn new_page_uses_page_last_modified() {
        assert_eq!(
            content_last_modified(None, None, Some("a"), Some(t(2)), t(3)),
            Some(t(2))
        );
    }

    #[test]
    fn new_page_without_header_uses_indexed_date() {
        assert_eq!(
            content_last_modified(None, None, Some("a"), None, t(3)),
            Some(t(3))
        );
    }

    #[test]
    fn no_content_is_unset() {
        assert_eq!(content_last_modified(Some("a"), Some(t(1)), None, None, t(3)), None);
        assert_eq!(content_last_modified(None, None, None, None, t(3)), None);
    }
}
