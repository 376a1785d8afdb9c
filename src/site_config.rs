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

//! The ephemeral Site Configuration materialised by the scheduler for one
//! job. Owned exclusively by the Site Crawler and its pipeline for the
//! lifetime of the crawl; nothing here outlives a single `run_once` pass.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use url::Url;

use crate::document::ContentChunk;
use crate::domain::Domain;
use crate::registry::{DomainRegistryEntry, IndexingFilter};

/// The prior indexed state of one URL, loaded before the crawl begins so
/// that change detection and embedding reuse can compare against it.
#[derive(Debug, Clone, Default)]
pub struct PriorContent {
    pub content: Option<String>,
    pub content_last_modified: Option<DateTime<Utc>>,
    pub content_chunks: Vec<ContentChunk>,
}

/// Data shared across every site in a scheduling pass, loaded once.
#[derive(Debug, Clone, Default)]
pub struct CommonConfig {
    /// All other registered domains, used to decide which outbound links
    /// count as "indexed outlinks".
    pub other_domains: HashSet<Domain>,
    pub subdomain_allow_suffixes: HashSet<String>,
}

/// Per-domain job state, assembled by the scheduler and consumed by the
/// crawler, parser, chunker and writer in sequence.
pub struct SiteConfig {
    pub entry: DomainRegistryEntry,
    pub full_index: bool,
    pub exclusions: Vec<IndexingFilter>,
    /// URL of a page in this domain -> inbound URLs from other domains.
    pub indexed_inlinks: HashMap<Url, Vec<Url>>,
    pub prior_contents: HashMap<Url, PriorContent>,
    /// Only `Some` for an incremental job; URLs already indexed for this
    /// domain, used to skip already-known pages during the crawl.
    pub already_indexed_urls: Option<HashSet<Url>>,
    /// Populated as the feed is parsed, at the start of the crawl, then
    /// read for the remainder of the job.
    pub feed_links: RwLock<HashSet<Url>>,
    pub common: CommonConfig,
    /// Effective page limit for this job: the registry's `page_limit`,
    /// reduced by the count of already-indexed URLs on an incremental job.
    pub effective_page_limit: usize,
}

impl SiteConfig {
    pub fn home_url(&self) -> anyhow::Result<Url> {
        Ok(Url::parse(&self.entry.home_page_url)?)
    }

    pub fn feed_url(&self) -> Option<Url> {
        self.entry.web_feed().and_then(|s| Url::parse(s).ok())
    }

    pub fn is_feed_link(&self, url: &Url) -> bool {
        self.feed_links.read().unwrap().contains(url)
    }

    pub fn set_feed_links(&self, links: HashSet<Url>) {
        *self.feed_links.write().unwrap() = links;
    }

    /// Excludes a URL if a `path` filter's literal substring appears in it,
    /// or its `*.ext` wildcard matches the URL's extension.
    pub fn is_path_excluded(&self, url: &Url) -> bool {
        use super::registry::FilterType;

        let url_str = url.as_str();
        self.exclusions.iter().any(|f| {
            if f.filter_type != FilterType::Path {
                return false;
            }
            match f.value.strip_prefix("*.") {
                Some(ext) => url_str
                    .rsplit('.')
                    .next()
                    .map(|e| e.eq_ignore_ascii_case(ext))
                    .unwrap_or(false),
                None => url_str.contains(&f.value),
            }
        })
    }

    pub fn type_exclusions(&self) -> impl Iterator<Item = &str> {
        use super::registry::FilterType;
        self.exclusions
            .iter()
            .filter(|f| f.filter_type == FilterType::Type)
            .map(|f| f.value.as_str())
    }

    pub fn is_already_indexed(&self, url: &Url) -> bool {
        self.already_indexed_urls
            .as_ref()
            .map(|set| set.contains(url))
            .unwrap_or(false)
    }
}
