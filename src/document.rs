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

//! The unit written to the search index, and the nested child chunk
//! documents that carry embeddings for vector retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Parent,
    Child,
}

impl Relationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Relationship::Parent => "parent",
            Relationship::Child => "child",
        }
    }
}

/// A child document holding one overlapping slice of a parent page's
/// content plus its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    /// `<parent_id>!chunk<NNN>`, 1-based, zero-padded to 3 digits.
    pub id: String,
    pub url: String,
    pub domain: Domain,
    pub content_chunk_no: u32,
    pub content_chunk_text: String,
    pub content_chunk_vector: Vec<f32>,
}

impl ContentChunk {
    pub fn chunk_id(parent_id: &str, chunk_no: u32) -> String {
        format!("{parent_id}!chunk{chunk_no:03}")
    }
}

/// One parsed and (for full reindexes) embedded page, staged for commit by
/// the Index Writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Pre-redirect URL; kept stable under redirects so the home page can't
    /// be overwritten by a later fetch of its redirect target.
    pub id: String,
    pub url: String,
    pub domain: Domain,
    pub relationship: Relationship,
    pub is_home: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub page_type: Option<String>,
    pub page_last_modified: Option<DateTime<Utc>>,
    pub content_last_modified: Option<DateTime<Utc>>,
    pub published_date: Option<DateTime<Utc>>,
    pub indexed_date: DateTime<Utc>,
    /// Home-page only.
    pub date_domain_added: Option<DateTime<Utc>>,
    pub site_category: String,
    pub owner_verified: bool,
    pub contains_adverts: bool,
    /// Home-page only.
    pub api_enabled: Option<bool>,
    pub public: bool,
    pub in_web_feed: bool,
    /// Home-page only: `web_feed_user_entered` if set, else the
    /// auto-discovered value resolved by the Index Writer.
    pub web_feed: Option<String>,
    pub language: Option<String>,
    pub language_primary: Option<String>,
    pub indexed_inlinks: Vec<String>,
    pub indexed_inlinks_count: Option<usize>,
    pub indexed_inlink_domains: Vec<String>,
    pub indexed_inlink_domains_count: Option<usize>,
    pub indexed_outlinks: Vec<String>,
    pub content_chunks: Vec<ContentChunk>,
}

impl IndexedDocument {
    pub fn set_inlinks(&mut self, inlinks: Vec<String>, allow_suffixes: &std::collections::HashSet<String>) {
        use crate::domain::extract_domain;

        let mut domains: Vec<String> = Vec::new();
        for inlink in &inlinks {
            if let Ok(url) = url::Url::parse(inlink) {
                if let Some(d) = extract_domain(&url, allow_suffixes) {
                    let d = d.to_string();
                    if !domains.contains(&d) {
                        domains.push(d);
                    }
                }
            }
        }

        self.indexed_inlinks_count = if inlinks.is_empty() { None } else { Some(inlinks.len()) };
        self.indexed_inlink_domains_count = if domains.is_empty() { None } else { Some(domains.len()) };
        self.indexed_inlinks = inlinks;
        self.indexed_inlink_domains = domains;
    }
}
