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

use std::collections::BTreeMap;
use std::panic;
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use super::{reqwest_client, Site};
use crate::config::CrawlerConfig;
use crate::Result;

const RETRY_ROBOTSTXT_UNREACHABLE: bool = false;

enum Lookup<T> {
    Found(T),
    /// Robots.txt returned 404 — treated as "everything allowed".
    Unavailable,
    /// Fetch errored or returned a server error — treated conservatively
    /// as "nothing allowed" until the cache entry expires.
    Unreachable,
}

struct Cache {
    entries: BTreeMap<Site, Lookup<RobotsTxt>>,
    last_prune: std::time::Instant,
}

/// One per site crawl; caches the single domain's robots.txt for the
/// lifetime of the job. A `Mutex` rather than `&mut self` so it can be
/// shared across the crawl's concurrent in-flight fetches.
pub struct RobotsTxtManager {
    cache: Mutex<Cache>,
    client: reqwest::Client,
    cache_expiration: Duration,
    user_agent: String,
    min_crawl_delay: Duration,
    max_crawl_delay: Duration,
}

impl RobotsTxtManager {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest_client(config)?,
            cache_expiration: Duration::from_secs(config.robots_txt_cache_sec),
            user_agent: config.user_agent.token.clone(),
            min_crawl_delay: Duration::from_millis(config.min_crawl_delay_ms),
            max_crawl_delay: Duration::from_millis(config.max_crawl_delay_ms),
            cache: Mutex::new(Cache {
                entries: BTreeMap::new(),
                last_prune: std::time::Instant::now(),
            }),
        })
    }

    #[cfg(test)]
    pub async fn insert(&self, host: String, robots: robotstxt::Robots) {
        let mut cache = self.cache.lock().await;
        cache.entries.insert(
            Site(host),
            Lookup::Found(RobotsTxt {
                robots,
                download_time: std::time::Instant::now(),
            }),
        );
    }

    pub async fn is_allowed(&self, url: &Url) -> bool {
        let site = Site(url.host_str().unwrap_or_default().to_lowercase());
        let mut cache = self.cache.lock().await;
        self.maybe_prune(&mut cache);
        self.ensure_fetched(&mut cache, &site).await;

        match cache.entries.get(&site) {
            Some(Lookup::Found(robots_txt)) => robots_txt.is_allowed(url),
            Some(Lookup::Unavailable) => true,
            Some(Lookup::Unreachable) | None => false,
        }
    }

    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        let site = Site(url.host_str().unwrap_or_default().to_lowercase());
        let mut cache = self.cache.lock().await;
        self.maybe_prune(&mut cache);
        self.ensure_fetched(&mut cache, &site).await;

        match cache.entries.get(&site) {
            Some(Lookup::Found(robots_txt)) => robots_txt.robots.crawl_delay(),
            _ => None,
        }
    }

    pub async fn sitemaps(&self, url: &Url) -> Vec<Url> {
        let site = Site(url.host_str().unwrap_or_default().to_lowercase());
        let mut cache = self.cache.lock().await;
        self.maybe_prune(&mut cache);
        self.ensure_fetched(&mut cache, &site).await;

        match cache.entries.get(&site) {
            Some(Lookup::Found(robots_txt)) => robots_txt
                .sitemaps()
                .iter()
                .filter_map(|s| Url::parse(s).ok())
                .collect(),
            _ => vec![],
        }
    }

    async fn ensure_fetched(&self, cache: &mut Cache, site: &Site) {
        let should_fetch = match cache.entries.get(site) {
            Some(Lookup::Found(robots_txt)) => robots_txt.is_expired(&self.cache_expiration),
            Some(_) => false,
            None => true,
        };

        if should_fetch {
            let result = self.fetch_robots_txt(site).await;
            cache.entries.insert(site.clone(), result);
        }
    }

    async fn fetch_robots_txt_from_url(&self, url: &str) -> Lookup<RobotsTxt> {
        let res = match self.client.get(url).timeout(Duration::from_secs(60)).send().await {
            Ok(res) => {
                if res.status() != reqwest::StatusCode::OK {
                    return match res.status() {
                        reqwest::StatusCode::NOT_FOUND => Lookup::Unavailable,
                        _ => Lookup::Unreachable,
                    };
                }

                let body = match res.text().await {
                    Ok(body) => body,
                    Err(_) => return Lookup::Unreachable,
                };

                let user_agent = self.user_agent.clone();
                match panic::catch_unwind(|| RobotsTxt::new(&user_agent, body)) {
                    Ok(Ok(r)) => Lookup::Found(r),
                    _ => Lookup::Unreachable,
                }
            }
            Err(_) => Lookup::Unreachable,
        };

        tokio::time::sleep(self.min_crawl_delay).await;

        res
    }

    async fn fetch_robots_txt_without_retry(&self, site: &Site) -> Lookup<RobotsTxt> {
        match self.fetch_robots_txt_from_url(&format!("http://{}/robots.txt", site.0)).await {
            Lookup::Unavailable => {
                match self.fetch_robots_txt_from_url(&format!("https://{}/robots.txt", site.0)).await {
                    Lookup::Found(robots_txt) => Lookup::Found(robots_txt),
                    Lookup::Unreachable => Lookup::Unreachable,
                    Lookup::Unavailable
                        if !site.0.starts_with("www.") && site.0.chars().filter(|&c| c == '.').count() == 1 =>
                    {
                        self.fetch_robots_txt_from_url(&format!("https://www.{}/robots.txt", &site.0)).await
                    }
                    Lookup::Unavailable => Lookup::Unavailable,
                }
            }
            res => res,
        }
    }

    async fn fetch_robots_txt(&self, site: &Site) -> Lookup<RobotsTxt> {
        if !RETRY_ROBOTSTXT_UNREACHABLE {
            return self.fetch_robots_txt_without_retry(site).await;
        }

        for _ in 0..3 {
            match self.fetch_robots_txt_without_retry(site).await {
                Lookup::Found(robots_txt) => return Lookup::Found(robots_txt),
                Lookup::Unavailable => return Lookup::Unavailable,
                Lookup::Unreachable => {}
            }

            tokio::time::sleep(self.max_crawl_delay).await;
        }

        Lookup::Unreachable
    }

    fn maybe_prune(&self, cache: &mut Cache) {
        if cache.last_prune.elapsed() < Duration::from_secs(60) {
            return;
        }

        let expiration = self.cache_expiration;
        cache.entries.retain(|_, v| match v {
            Lookup::Found(robots_txt) => !robots_txt.is_expired(&expiration),
            _ => true,
        });

        cache.last_prune = std::time::Instant::now();
    }
}

struct RobotsTxt {
    download_time: std::time::Instant,
    robots: robotstxt::Robots,
}

impl RobotsTxt {
    fn new(user_agent: &str, body: String) -> Result<Self> {
        Ok(Self {
            robots: robotstxt::Robots::parse(user_agent, &body)?,
            download_time: std::time::Instant::now(),
        })
    }

    fn is_expired(&self, expiration: &Duration) -> bool {
        self.download_time.elapsed() > *expiration
    }

    fn is_allowed(&self, url: &Url) -> bool {
        self.robots.is_allowed(url)
    }

    fn sitemaps(&self) -> &[String] {
        self.robots.sitemaps()
    }
}
