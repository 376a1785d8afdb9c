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

//! The Site Crawler: a per-domain fetch loop with robots obedience,
//! bounded concurrency and politeness delay, a page-limit and wall-clock
//! cap, feed discovery, and an extension/type exclusion filter.

pub mod robot_client;
pub mod robots_txt;
mod worker;

use std::time::Duration;

pub use robot_client::RobotClient;
pub use worker::{crawl_site, CrawlStats, StopReason};

use crate::config::CrawlerConfig;
use crate::error::Error;
use crate::Result;

/// The robots.txt cache key: host only, lowercased — politeness rules don't
/// vary by scheme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Site(pub String);

/// File extensions never worth fetching for a text index; checked against
/// a URL's path extension before any request is issued.
pub const EXTENSION_BLACKLIST: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tiff", "mp3", "mp4", "mov", "avi",
    "wmv", "flv", "webm", "ogg", "wav", "zip", "tar", "gz", "rar", "7z", "exe", "dmg", "pkg",
    "deb", "rpm", "css", "js", "woff", "woff2", "ttf", "eot", "otf", "pdf", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx",
];

pub(crate) fn has_blacklisted_extension(url: &url::Url) -> bool {
    url.path()
        .rsplit('.')
        .next()
        .map(|ext| EXTENSION_BLACKLIST.iter().any(|b| ext.eq_ignore_ascii_case(b)))
        .unwrap_or(false)
}

pub(crate) fn reqwest_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let read_timeout = Duration::from_secs(config.read_timeout_secs);

    let mut headers = reqwest::header::HeaderMap::default();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml,application/rss+xml,application/atom+xml",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        reqwest::header::HeaderValue::from_static("en-US,en;q=0.9,*;q=0.8"),
    );

    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .http2_keep_alive_interval(None)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(0))
        .user_agent(&config.user_agent.full)
        .build()
        .map_err(Error::Fetch)
        .map_err(Into::into)
}

/// Reads a response body up to `max_bytes`, erroring rather than silently
/// truncating so an oversized page is dropped, not half-indexed.
pub(crate) async fn capped_body(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Error::Fetch)?;
        if buf.len() + chunk.len() > max_bytes {
            return Err(Error::ContentTooLarge(max_bytes).into());
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}
