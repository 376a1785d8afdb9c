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

//! The Page Parser: turns one fetched response into an
//! [`IndexedDocument`], or drops it. Branches on response shape rather than
//! runtime introspection, per the "duck-typed response shapes" design note —
//! [`ResponseShape`] is decided once, up front, from the `Content-Type`
//! header and a body sniff.

pub mod content_change;
pub mod dates;
pub mod html;
pub mod xml;

use chrono::{DateTime, Utc};
use scraper::Html as HtmlDoc;
use url::Url;

use crate::document::{IndexedDocument, Relationship};
use crate::registry::{ListingStatus, Tier};
use crate::site_config::SiteConfig;

/// One fetched response, as handed off by the crawler.
pub struct FetchedResponse {
    /// The URL first requested, before any redirects — the document's `id`.
    pub pre_redirect_url: Url,
    /// The URL the response actually came from.
    pub url: Url,
    pub content_type: Option<String>,
    pub page_last_modified: Option<DateTime<Utc>>,
    pub body: Vec<u8>,
}

enum ResponseShape {
    Html(HtmlDoc),
    Xml(String),
    Other,
}

fn classify(content_type: Option<&str>, body: &[u8]) -> ResponseShape {
    let sniff = || {
        let head = String::from_utf8_lossy(&body[..body.len().min(512)]);
        let head = head.trim_start();
        if head.starts_with("<?xml") {
            ResponseShape::Xml(String::from_utf8_lossy(body).into_owned())
        } else if head.starts_with('<') {
            ResponseShape::Html(HtmlDoc::parse_document(&String::from_utf8_lossy(body)))
        } else {
            ResponseShape::Other
        }
    };

    match content_type {
        Some(ct) if ct.contains("html") => {
            ResponseShape::Html(HtmlDoc::parse_document(&String::from_utf8_lossy(body)))
        }
        Some(ct) if ct.contains("xml") => ResponseShape::Xml(String::from_utf8_lossy(body).into_owned()),
        Some(_) => ResponseShape::Other,
        None => sniff(),
    }
}

/// First token of the `Content-Type` header, e.g. `text/html` out of
/// `text/html; charset=utf-8`.
fn content_type_token(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or(content_type).trim().to_string()
}

/// The outcome of parsing one response: the document (if the page is kept)
/// plus the signals the Index Writer needs for feed/sitemap candidate
/// selection, which aren't themselves indexed fields.
pub struct ParseOutcome {
    pub document: IndexedDocument,
    pub is_web_feed: bool,
}

pub fn parse(
    site_config: &SiteConfig,
    response: FetchedResponse,
    is_home: bool,
    indexed_date: DateTime<Utc>,
) -> Option<ParseOutcome> {
    let content_type = response.content_type.as_deref().map(content_type_token);
    let shape = classify(content_type.as_deref(), &response.body);

    let (page_type, is_web_feed) = match &shape {
        ResponseShape::Html(doc) => (html::page_type(doc), false),
        ResponseShape::Xml(s) => {
            let info = xml::inspect(s);
            (info.page_type, info.is_web_feed)
        }
        ResponseShape::Other => return None,
    };

    if let Some(page_type) = &page_type {
        if site_config.type_exclusions().any(|excluded| excluded == page_type) {
            return None;
        }
    }

    let domain = site_config.entry.domain.clone();

    let indexed_inlinks: Vec<String> = site_config
        .indexed_inlinks
        .get(&response.url)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|u| u.to_string())
        .collect();

    let mut document = IndexedDocument {
        id: response.pre_redirect_url.to_string(),
        url: response.url.to_string(),
        domain,
        relationship: Relationship::Parent,
        is_home,
        title: None,
        author: None,
        description: None,
        tags: Vec::new(),
        content: None,
        content_type,
        page_type,
        page_last_modified: response.page_last_modified,
        content_last_modified: None,
        published_date: None,
        indexed_date,
        date_domain_added: is_home.then_some(site_config.entry.date_domain_added),
        site_category: site_config.entry.category.clone(),
        owner_verified: site_config.entry.owner_verified && site_config.entry.tier == Tier::Three,
        contains_adverts: false,
        api_enabled: is_home.then_some(site_config.entry.api_enabled),
        public: site_config.entry.listing_status == ListingStatus::Active,
        in_web_feed: site_config.is_feed_link(&response.url),
        web_feed: is_home.then(|| site_config.entry.web_feed().map(str::to_string)).flatten(),
        language: None,
        language_primary: None,
        indexed_inlinks: Vec::new(),
        indexed_inlinks_count: None,
        indexed_inlink_domains: Vec::new(),
        indexed_inlink_domains_count: None,
        indexed_outlinks: Vec::new(),
        content_chunks: Vec::new(),
    };
    document.set_inlinks(indexed_inlinks, &site_config.common.subdomain_allow_suffixes);

    match shape {
        ResponseShape::Html(doc) => {
            document.title = html::title(&doc);
            document.author = html::author(&doc);
            document.description = html::description(&doc);
            document.tags = html::tags(&doc);
            document.contains_adverts = html::contains_adverts(&doc);
            document.language = html::language(&doc);
            document.language_primary = document.language.as_deref().and_then(html::language_primary);

            let new_content = html::content(&doc);

            document.published_date = html::published_date(&doc).and_then(|s| dates::parse_date_tolerant(&s));

            document.indexed_outlinks = html::extract_links(&doc, &response.url)
                .into_iter()
                .filter_map(|link| {
                    let link_domain = crate::url_ext::UrlExt::root_domain(&link)?;
                    site_config
                        .common
                        .other_domains
                        .iter()
                        .any(|d| d.as_str() == link_domain)
                        .then(|| link.to_string())
                })
                .collect();

            let prior = site_config.prior_contents.get(&response.pre_redirect_url);
            document.content_last_modified = content_change::content_last_modified(
                prior.and_then(|p| p.content.as_deref()),
                prior.and_then(|p| p.content_last_modified),
                new_content.as_deref(),
                document.page_last_modified,
                indexed_date,
            );

            document.content = new_content;
        }
        ResponseShape::Xml(s) => {
            document.title = xml::extract_title(&s);
        }
        ResponseShape::Other => unreachable!(),
    }

    Some(ParseOutcome { document, is_web_feed })
}
