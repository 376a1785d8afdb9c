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

//! The Search Index collaborator: a narrow `SearchIndex` trait
//! backed by a Solr HTTP client, the same seam-at-the-boundary shape as
//! `crate::registry::Registry`.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::IndexConfig;
use crate::document::{ContentChunk, IndexedDocument};
use crate::domain::Domain;
use crate::error::Error;
use crate::site_config::PriorContent;
use crate::Result;

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// URL (in this domain) -> inbound URLs from other domains, found by
    /// searching the index for documents whose outlinks mention this domain.
    async fn inbound_links(&self, domain: &Domain) -> Result<HashMap<Url, Vec<Url>>>;

    /// URL -> prior content state, used for change detection and
    /// embedding reuse.
    async fn prior_contents(&self, domain: &Domain) -> Result<HashMap<Url, PriorContent>>;

    /// URLs already indexed for this domain (incremental jobs only).
    async fn already_indexed_urls(&self, domain: &Domain) -> Result<HashSet<Url>>;

    async fn delete_by_domain(&self, domain: &Domain) -> Result<()>;

    async fn add_and_commit(&self, documents: &[IndexedDocument]) -> Result<()>;
}

#[derive(Deserialize)]
struct SelectResponse<T> {
    response: SelectResponseBody<T>,
}

#[derive(Deserialize)]
struct SelectResponseBody<T> {
    docs: Vec<T>,
}

#[derive(Deserialize)]
struct InboundLinkDoc {
    url: String,
    #[serde(default)]
    indexed_outlinks: Vec<String>,
}

#[derive(Deserialize)]
struct PriorContentDoc {
    url: String,
    content: Option<String>,
    content_last_modified: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "_childDocuments_", default)]
    content_chunks: Vec<PriorChunkDoc>,
}

#[derive(Deserialize)]
struct PriorChunkDoc {
    id: String,
    url: String,
    content_chunk_no: u32,
    content_chunk_text: String,
    #[serde(default)]
    content_chunk_vector: Vec<f32>,
}

#[derive(Deserialize)]
struct UrlOnlyDoc {
    url: String,
}

#[derive(Serialize)]
struct SolrChunkDoc {
    id: String,
    url: String,
    domain: String,
    relationship: &'static str,
    content_chunk_no: u32,
    content_chunk_text: String,
    content_chunk_vector: Vec<f32>,
}

impl From<&ContentChunk> for SolrChunkDoc {
    fn from(c: &ContentChunk) -> Self {
        Self {
            id: c.id.clone(),
            url: c.url.clone(),
            domain: c.domain.as_str().to_string(),
            relationship: "child",
            content_chunk_no: c.content_chunk_no,
            content_chunk_text: c.content_chunk_text.clone(),
            content_chunk_vector: c.content_chunk_vector.clone(),
        }
    }
}

#[derive(Serialize)]
struct SolrParentDoc {
    id: String,
    url: String,
    domain: String,
    relationship: &'static str,
    is_home: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_last_modified: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_last_modified: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_date: Option<chrono::DateTime<chrono::Utc>>,
    indexed_date: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_domain_added: Option<chrono::DateTime<chrono::Utc>>,
    site_category: String,
    owner_verified: bool,
    contains_adverts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_enabled: Option<bool>,
    public: bool,
    in_web_feed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_feed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_primary: Option<String>,
    indexed_inlinks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed_inlinks_count: Option<usize>,
    indexed_inlink_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed_inlink_domains_count: Option<usize>,
    indexed_outlinks: Vec<String>,
    #[serde(rename = "_childDocuments_", skip_serializing_if = "Vec::is_empty")]
    content_chunks: Vec<SolrChunkDoc>,
}

impl From<&IndexedDocument> for SolrParentDoc {
    fn from(d: &IndexedDocument) -> Self {
        Self {
            id: d.id.clone(),
            url: d.url.clone(),
            domain: d.domain.as_str().to_string(),
            relationship: "parent",
            is_home: d.is_home,
            title: d.title.clone(),
            author: d.author.clone(),
            description: d.description.clone(),
            tags: d.tags.clone(),
            content: d.content.clone(),
            content_type: d.content_type.clone(),
            page_type: d.page_type.clone(),
            page_last_modified: d.page_last_modified,
            content_last_modified: d.content_last_modified,
            published_date: d.published_date,
            indexed_date: d.indexed_date,
            date_domain_added: d.date_domain_added,
            site_category: d.site_category.clone(),
            owner_verified: d.owner_verified,
            contains_adverts: d.contains_adverts,
            api_enabled: d.api_enabled,
            public: d.public,
            in_web_feed: d.in_web_feed,
            web_feed: d.web_feed.clone(),
            language: d.language.clone(),
            language_primary: d.language_primary.clone(),
            indexed_inlinks: d.indexed_inlinks.clone(),
            indexed_inlinks_count: d.indexed_inlinks_count,
            indexed_inlink_domains: d.indexed_inlink_domains.clone(),
            indexed_inlink_domains_count: d.indexed_inlink_domains_count,
            indexed_outlinks: d.indexed_outlinks.clone(),
            content_chunks: d.content_chunks.iter().map(SolrChunkDoc::from).collect(),
        }
    }
}

pub struct SolrIndex {
    client: reqwest::Client,
    base_url: String,
    inlinks_query_limit: usize,
    prior_content_query_limit: usize,
}

impl SolrIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Fetch)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            inlinks_query_limit: config.inlinks_query_limit,
            prior_content_query_limit: config.prior_content_query_limit,
        })
    }

    async fn select<T: for<'de> Deserialize<'de>>(&self, query: &str, fl: &str, rows: usize) -> Result<Vec<T>> {
        let response = self
            .client
            .get(format!("{}/select", self.base_url))
            .query(&[
                ("q", query),
                ("fl", fl),
                ("rows", &rows.to_string()),
                ("wt", "json"),
            ])
            .send()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Index(format!("select query returned {}", response.status())).into());
        }

        let body: SelectResponse<T> = response.json().await.map_err(|e| Error::Index(e.to_string()))?;
        Ok(body.response.docs)
    }

    async fn update(&self, body: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/update", self.base_url))
            .query(&[("commit", "true")])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Index(format!("update returned {}", response.status())).into());
        }

        Ok(())
    }
}

#[async_trait]
impl SearchIndex for SolrIndex {
    async fn inbound_links(&self, domain: &Domain) -> Result<HashMap<Url, Vec<Url>>> {
        let query = format!("indexed_outlinks:*{}*", domain.as_str());
        let docs: Vec<InboundLinkDoc> = self
            .select(&query, "url,indexed_outlinks", self.inlinks_query_limit)
            .await?;

        let mut inlinks: HashMap<Url, Vec<Url>> = HashMap::new();
        for doc in docs {
            let Ok(inbound_url) = Url::parse(&doc.url) else { continue };
            for outlink in &doc.indexed_outlinks {
                if !outlink.contains(domain.as_str()) {
                    continue;
                }
                let Ok(target) = Url::parse(outlink) else { continue };
                inlinks.entry(target).or_default().push(inbound_url.clone());
            }
        }

        Ok(inlinks)
    }

    async fn prior_contents(&self, domain: &Domain) -> Result<HashMap<Url, PriorContent>> {
        let query = format!("domain:{} AND relationship:parent", domain.as_str());
        let docs: Vec<PriorContentDoc> = self
            .select(
                &query,
                "id,url,content,content_last_modified,[child]",
                self.prior_content_query_limit,
            )
            .await?;

        let mut contents = HashMap::new();
        for doc in docs {
            let Ok(url) = Url::parse(&doc.url) else { continue };
            let content_chunks = doc
                .content_chunks
                .into_iter()
                .map(|c| ContentChunk {
                    id: c.id,
                    url: c.url,
                    domain: domain.clone(),
                    content_chunk_no: c.content_chunk_no,
                    content_chunk_text: c.content_chunk_text,
                    content_chunk_vector: c.content_chunk_vector,
                })
                .collect();

            contents.insert(
                url,
                PriorContent {
                    content: doc.content,
                    content_last_modified: doc.content_last_modified,
                    content_chunks,
                },
            );
        }

        Ok(contents)
    }

    async fn already_indexed_urls(&self, domain: &Domain) -> Result<HashSet<Url>> {
        let query = format!("domain:{} AND -relationship:child", domain.as_str());
        let docs: Vec<UrlOnlyDoc> = self.select(&query, "url", self.inlinks_query_limit).await?;

        Ok(docs.into_iter().filter_map(|d| Url::parse(&d.url).ok()).collect())
    }

    async fn delete_by_domain(&self, domain: &Domain) -> Result<()> {
        self.update(serde_json::json!({
            "delete": { "query": format!("domain:{}", domain.as_str()) }
        }))
        .await
    }

    async fn add_and_commit(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let docs: Vec<SolrParentDoc> = documents.iter().map(SolrParentDoc::from).collect();
        self.update(serde_json::json!({ "add": docs.iter().map(|d| serde_json::json!({ "doc": d })).collect::<Vec<_>>() }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solr_parent_doc_omits_absent_optional_fields() {
        use crate::document::Relationship;

        let document = IndexedDocument {
            id: "https://example.com/".into(),
            url: "https://example.com/".into(),
            domain: Domain::from_registry_value("example.com"),
            relationship: Relationship::Parent,
            is_home: true,
            title: None,
            author: None,
            description: None,
            tags: vec![],
            content: None,
            content_type: None,
            page_type: None,
            page_last_modified: None,
            content_last_modified: None,
            published_date: None,
            indexed_date: chrono::Utc::now(),
            date_domain_added: None,
            site_category: "general".into(),
            owner_verified: false,
            contains_adverts: false,
            api_enabled: None,
            public: true,
            in_web_feed: false,
            web_feed: None,
            language: None,
            language_primary: None,
            indexed_inlinks: vec![],
            indexed_inlinks_count: None,
            indexed_inlink_domains: vec![],
            indexed_inlink_domains_count: None,
            indexed_outlinks: vec![],
            content_chunks: vec![],
        };

        let solr_doc = SolrParentDoc::from(&document);
        let value = serde_json::to_value(&solr_doc).unwrap();
        assert!(value.get("title").is_none());
        assert!(value.get("_childDocuments_").is_none());
    }
}
