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

//! The Index Writer: buffers one crawl's parsed items, deduplicates
//! them, resolves home-page-only and feed/sitemap fields, and commits
//! atomically to the search index and the registry log.

use crate::crawler::{CrawlStats, StopReason};
use crate::document::IndexedDocument;
use crate::index::SearchIndex;
use crate::notify::Notifier;
use crate::parser::ParseOutcome;
use crate::registry::{DomainRegistryEntry, Registry, Tier};
use crate::Result;

const FEED_URL_PREFERENCES: &[&str] = &["/posts/index.xml", "/feed/", "/feed.xml", "/atom.xml", "/rss.xml"];

fn normalize_url_for_dedup(url: &str) -> String {
    url.replacen("://www.", "://", 1)
}

/// Drops a candidate item if an earlier-buffered item has the same URL (or
/// the same URL modulo a leading `www.`) **and** the same title.
fn dedup(items: Vec<ParseOutcome>) -> Vec<ParseOutcome> {
    let mut seen: Vec<(String, Option<String>)> = Vec::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());

    for item in items {
        let key = (normalize_url_for_dedup(&item.document.url), item.document.title.clone());
        if seen.iter().any(|(u, t)| *u == key.0 && *t == key.1) {
            continue;
        }
        seen.push(key);
        kept.push(item);
    }

    kept
}

/// Picks the canonical feed and sitemap URL for the domain. Sitemap
/// candidates are XML responses whose URL ends in `sitemap.xml`; feed
/// candidates are every other XML response, plus any item the parser
/// flagged `is_web_feed=true` regardless of its `Content-Type` (a feed
/// served without an `xml`-suffixed content type would otherwise never be
/// selectable).
fn resolve_feed_and_sitemap(items: &[ParseOutcome]) -> (Option<String>, Option<String>) {
    let mut sitemap_candidates = Vec::new();
    let mut feed_candidates = Vec::new();

    for item in items {
        let doc = &item.document;
        let is_xml = doc.content_type.as_deref().map(|ct| ct.ends_with("xml")).unwrap_or(false);
        if !is_xml && !item.is_web_feed {
            continue;
        }

        if is_xml && doc.url.ends_with("sitemap.xml") {
            sitemap_candidates.push(doc.url.clone());
        } else {
            feed_candidates.push(doc.url.clone());
        }
    }

    let sitemap = sitemap_candidates.into_iter().next();

    let feed = FEED_URL_PREFERENCES
        .iter()
        .find_map(|pref| feed_candidates.iter().find(|u| u.contains(pref)).cloned())
        .or_else(|| feed_candidates.into_iter().next());

    (feed, sitemap)
}

fn stop_reason_fragment(stats: &CrawlStats) -> String {
    if stats.pages_fetched == 0 && stats.robots_forbidden > 0 {
        "Likely robots.txt forbidden.".to_string()
    } else if stats.stop_reason == StopReason::WallClockCap && stats.pages_fetched == 0 {
        "Likely site timeout.".to_string()
    } else {
        format!(
            "pages_fetched={} robots_forbidden={} retries_exhausted={}",
            stats.pages_fetched, stats.robots_forbidden, stats.retries_exhausted
        )
    }
}

/// Buffers, dedups and commits one crawl's output; records the outcome in
/// the registry log. Returns once the domain's row reflects the outcome
/// (COMPLETE, with indexing disabled if this was the second consecutive
/// zero-document full reindex).
pub async fn commit(
    registry: &dyn Registry,
    index: &dyn SearchIndex,
    notifier: &dyn Notifier,
    entry: &DomainRegistryEntry,
    full_index: bool,
    items: Vec<ParseOutcome>,
    stats: &CrawlStats,
) -> Result<()> {
    let domain = &entry.domain;
    let buffered = dedup(items);

    if buffered.is_empty() {
        if !full_index {
            let message = format!("WARNING: {}", stop_reason_fragment(stats));
            registry.complete(domain, full_index, &message).await?;
            return Ok(());
        }

        let previous_was_warning = registry
            .last_complete_message(domain)
            .await?
            .map(|m| m.starts_with("WARNING:"))
            .unwrap_or(false);

        if previous_was_warning {
            index.delete_by_domain(domain).await?;

            let reason = "Indexing failed twice in a row: two consecutive full reindexes produced zero documents.";
            registry.disable(domain, reason).await?;

            if entry.tier == Tier::Three {
                let _ = notifier
                    .notify_admin(
                        &format!("indexing disabled for {}", domain),
                        &format!("{domain} produced zero documents on two consecutive full reindexes and has been disabled."),
                    )
                    .await;
            }

            let message = format!("WARNING: {} (indexing disabled)", stop_reason_fragment(stats));
            registry.complete(domain, full_index, &message).await?;
        } else {
            let message = format!("WARNING: {}", stop_reason_fragment(stats));
            registry.complete(domain, full_index, &message).await?;
        }

        return Ok(());
    }

    let (discovered_feed, discovered_sitemap) = resolve_feed_and_sitemap(&buffered);
    if discovered_feed.is_some() || discovered_sitemap.is_some() {
        registry
            .set_feed_and_sitemap(domain, discovered_feed.as_deref(), discovered_sitemap.as_deref())
            .await?;
    }

    let mut documents: Vec<IndexedDocument> = buffered.into_iter().map(|o| o.document).collect();

    if entry.web_feed_user_entered.is_none() {
        if let Some(feed) = discovered_feed {
            for doc in documents.iter_mut().filter(|d| d.is_home) {
                doc.web_feed = Some(feed.clone());
            }
        }
    }

    if full_index {
        index.delete_by_domain(domain).await?;
    }

    index.add_and_commit(&documents).await?;

    let message = format!("SUCCESS: {} documents found.", documents.len());
    registry.complete(domain, full_index, &message).await?;

    Ok(())
}
