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

//! The per-domain crawl loop: fetches the start set, follows links subject
//! to the full/incremental decision, and streams parsed items to the Index
//! Writer until one of the crawl's termination conditions is reached.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::Html;
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

use super::robot_client::RobotClient;
use super::{capped_body, has_blacklisted_extension};
use crate::config::CrawlerConfig;
use crate::error::Error;
use crate::parser::{self, FetchedResponse, ParseOutcome};
use crate::site_config::SiteConfig;
use crate::Result;

const MAX_FETCH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    PageLimit,
    WallClockCap,
    NoMoreLinks,
    UnrecoverableFetchErrors,
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub pages_dropped_by_filter: usize,
    pub robots_forbidden: usize,
    pub retries_exhausted: usize,
    pub stop_reason: StopReason,
}

impl CrawlStats {
    fn new() -> Self {
        Self {
            pages_fetched: 0,
            pages_dropped_by_filter: 0,
            robots_forbidden: 0,
            retries_exhausted: 0,
            stop_reason: StopReason::NoMoreLinks,
        }
    }
}

enum FetchOutcome {
    Fetched {
        outcome: Option<ParseOutcome>,
        discovered_links: Vec<Url>,
    },
    RobotsDisallowed,
    RetriesExhausted,
}

/// Crawls one registered domain start to finish, sending every accepted
/// item to `tx`. Returns once a termination condition is reached; never
/// restarts — per the "generator-like, non-restartable" design note, a
/// fresh `crawl_site` call is a fresh crawl.
pub async fn crawl_site(
    site_config: &SiteConfig,
    robot_client: &RobotClient,
    config: &CrawlerConfig,
    tx: async_channel::Sender<ParseOutcome>,
) -> Result<CrawlStats> {
    let home_url = site_config.home_url()?;
    let feed_url = site_config.feed_url();

    let mut visited: HashSet<Url> = HashSet::new();
    let mut frontier: VecDeque<Url> = VecDeque::new();
    let mut start_urls: HashSet<Url> = HashSet::new();

    visited.insert(home_url.clone());
    frontier.push_back(home_url.clone());
    start_urls.insert(home_url.clone());

    if let Some(feed) = feed_url.clone() {
        if visited.insert(feed.clone()) {
            frontier.push_back(feed.clone());
        }
        start_urls.insert(feed);
    }

    let mut stats = CrawlStats::new();
    let start_time = Instant::now();
    let wall_clock_cap = Duration::from_secs(config.wall_clock_cap_secs);
    let last_request_started: AsyncMutex<Option<Instant>> = AsyncMutex::new(None);
    let concurrency = config.max_concurrent_requests_per_domain.max(1);

    loop {
        if start_time.elapsed() > wall_clock_cap {
            stats.stop_reason = StopReason::WallClockCap;
            break;
        }

        if stats.pages_fetched >= site_config.effective_page_limit {
            stats.stop_reason = StopReason::PageLimit;
            break;
        }

        if frontier.is_empty() {
            stats.stop_reason = StopReason::NoMoreLinks;
            break;
        }

        let mut batch = Vec::new();
        while batch.len() < concurrency {
            if stats.pages_fetched + batch.len() >= site_config.effective_page_limit {
                break;
            }
            match frontier.pop_front() {
                Some(url) => batch.push(url),
                None => break,
            }
        }

        if batch.is_empty() {
            stats.stop_reason = StopReason::PageLimit;
            break;
        }

        let results = futures::future::join_all(batch.iter().cloned().map(|url| {
            let is_home = url == home_url;
            let is_start = start_urls.contains(&url);
            fetch_and_parse(
                url,
                is_home,
                is_start,
                site_config,
                robot_client,
                config,
                &last_request_started,
            )
        }))
        .await;

        let mut unrecoverable_in_batch = 0;
        let batch_len = results.len();

        for outcome in results {
            match outcome {
                FetchOutcome::Fetched { outcome, discovered_links } => {
                    stats.pages_fetched += 1;
                    match outcome {
                        Some(item) => {
                            if tx.send(item).await.is_err() {
                                tracing::debug!("index writer channel closed, stopping crawl early");
                                stats.stop_reason = StopReason::NoMoreLinks;
                                return Ok(stats);
                            }
                        }
                        None => stats.pages_dropped_by_filter += 1,
                    }

                    for link in discovered_links {
                        if visited.insert(link.clone()) {
                            frontier.push_back(link);
                        }
                    }
                }
                FetchOutcome::RobotsDisallowed => {
                    stats.robots_forbidden += 1;
                    unrecoverable_in_batch += 1;
                }
                FetchOutcome::RetriesExhausted => {
                    stats.retries_exhausted += 1;
                    unrecoverable_in_batch += 1;
                }
            }
        }

        if unrecoverable_in_batch == batch_len && frontier.is_empty() {
            stats.stop_reason = StopReason::UnrecoverableFetchErrors;
            break;
        }
    }

    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
async fn fetch_and_parse(
    url: Url,
    is_home: bool,
    is_start: bool,
    site_config: &SiteConfig,
    robot_client: &RobotClient,
    config: &CrawlerConfig,
    last_request_started: &AsyncMutex<Option<Instant>>,
) -> FetchOutcome {
    pace(robot_client, &url, config, last_request_started).await;

    let pre_redirect_url = url.clone();
    let mut current = url;
    let mut redirects = 0;

    let response = loop {
        let mut attempt = 0;
        let resp = loop {
            match try_fetch(robot_client, current.clone(), config).await {
                Ok(resp) => break Ok(resp),
                Err(FetchError::RobotsDisallowed) => break Err(FetchError::RobotsDisallowed),
                Err(FetchError::Transient) if attempt + 1 < MAX_FETCH_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => break Err(e),
            }
        };

        match resp {
            Ok(resp) => {
                if resp.status().is_redirection() {
                    if redirects >= config.max_redirects {
                        return FetchOutcome::RetriesExhausted;
                    }
                    let Some(location) = resp
                        .headers()
                        .get(reqwest::header::LOCATION)
                        .and_then(|v| v.to_str().ok())
                    else {
                        return FetchOutcome::RetriesExhausted;
                    };
                    let Ok(next) = current.join(location) else {
                        return FetchOutcome::RetriesExhausted;
                    };
                    current = next;
                    redirects += 1;
                    continue;
                }

                break resp;
            }
            Err(FetchError::RobotsDisallowed) => return FetchOutcome::RobotsDisallowed,
            Err(FetchError::Transient) | Err(FetchError::Terminal) => return FetchOutcome::RetriesExhausted,
        }
    };

    let final_url = current;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let page_last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    let body = match capped_body(response, config.max_response_size_bytes).await {
        Ok(body) => body,
        Err(_) => return FetchOutcome::RetriesExhausted,
    };

    let discovered_links = if site_config.full_index || is_start {
        extract_candidate_links(&body, &final_url, site_config)
    } else {
        Vec::new()
    };

    let indexed_date = Utc::now();
    let fetched = FetchedResponse {
        pre_redirect_url,
        url: final_url,
        content_type,
        page_last_modified,
        body,
    };

    let outcome = parser::parse(site_config, fetched, is_home, indexed_date);

    FetchOutcome::Fetched { outcome, discovered_links }
}

async fn pace(
    robot_client: &RobotClient,
    url: &Url,
    config: &CrawlerConfig,
    last_request_started: &AsyncMutex<Option<Instant>>,
) {
    let robots_delay = robot_client.robots_txt_manager().crawl_delay(url).await;
    let delay = robots_delay
        .unwrap_or_else(|| Duration::from_millis(config.min_crawl_delay_ms))
        .max(Duration::from_millis(config.min_crawl_delay_ms))
        .min(Duration::from_millis(config.max_crawl_delay_ms));

    let mut guard = last_request_started.lock().await;
    if let Some(prev) = *guard {
        let elapsed = prev.elapsed();
        if elapsed < delay {
            tokio::time::sleep(delay - elapsed).await;
        }
    }
    *guard = Some(Instant::now());
}

enum FetchError {
    RobotsDisallowed,
    Transient,
    Terminal,
}

async fn try_fetch(
    robot_client: &RobotClient,
    url: Url,
    config: &CrawlerConfig,
) -> std::result::Result<reqwest::Response, FetchError> {
    let request = robot_client.get(url).await.map_err(|e| {
        if e.downcast_ref::<Error>().map(|e| matches!(e, Error::RobotsDisallowed)).unwrap_or(false) {
            FetchError::RobotsDisallowed
        } else {
            FetchError::Terminal
        }
    })?;

    let request = request.timeout(Duration::from_secs(config.read_timeout_secs));

    match request.send().await {
        Ok(resp) if resp.status().is_server_error() => Err(FetchError::Transient),
        Ok(resp) if resp.status().is_client_error() => Err(FetchError::Terminal),
        Ok(resp) => Ok(resp),
        Err(e) if e.is_timeout() || e.is_connect() => Err(FetchError::Transient),
        Err(_) => Err(FetchError::Terminal),
    }
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s).ok().map(|d| d.with_timezone(&Utc))
}

/// Links worth adding to the frontier: same site [`Domain`] as the site
/// being crawled (computed the same way the registry computes site
/// identity, so an allow-listed subdomain suffix doesn't leak into sibling
/// sites sharing the same registrable domain), not excluded by a path/
/// extension filter, and (incremental only) not already indexed. Also runs
/// feed-entry discovery when `body` looks like the site's advertised web
/// feed.
///
/// [`Domain`]: crate::domain::Domain
fn extract_candidate_links(body: &[u8], base: &Url, site_config: &SiteConfig) -> Vec<Url> {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start();

    let mut links = if trimmed.starts_with("<?xml") || (trimmed.starts_with('<') && looks_like_feed(trimmed)) {
        let info = crate::parser::xml::inspect(&text);
        let kind = match info.page_type.as_deref() {
            Some("rss") => Some(crate::feed::FeedKind::Rss),
            Some("feed") => Some(crate::feed::FeedKind::Atom),
            _ => None,
        };

        match kind {
            Some(kind) => {
                let parsed = crate::feed::parse(kind, &text);
                let links: Vec<Url> = parsed.links.into_iter().map(|d| d.url).collect();
                site_config.set_feed_links(links.iter().cloned().collect());
                links
            }
            None => Vec::new(),
        }
    } else {
        let doc = Html::parse_document(&text);
        crate::parser::html::extract_links(&doc, base)
    };

    links.retain(|link| {
        let same_site = crate::domain::extract_domain(link, &site_config.common.subdomain_allow_suffixes)
            .is_some_and(|d| d == site_config.entry.domain);
        same_site
            && !has_blacklisted_extension(link)
            && !site_config.is_path_excluded(link)
            && !site_config.is_already_indexed(link)
    });

    links
}

fn looks_like_feed(trimmed: &str) -> bool {
    let head = &trimmed[..trimmed.len().min(2048)];
    head.contains("<rss") || head.contains("<feed")
}
