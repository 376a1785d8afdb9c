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

pub mod defaults;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct UserAgent {
    pub full: String,
    pub token: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct CrawlerConfig {
    pub user_agent: UserAgent,

    #[serde(default = "defaults::Crawler::max_concurrent_requests_per_domain")]
    pub max_concurrent_requests_per_domain: usize,

    #[serde(default = "defaults::Crawler::min_crawl_delay_ms")]
    pub min_crawl_delay_ms: u64,

    #[serde(default = "defaults::Crawler::max_crawl_delay_ms")]
    pub max_crawl_delay_ms: u64,

    #[serde(default = "defaults::Crawler::wall_clock_cap_secs")]
    pub wall_clock_cap_secs: u64,

    #[serde(default = "defaults::Crawler::max_response_size_bytes")]
    pub max_response_size_bytes: usize,

    #[serde(default = "defaults::Crawler::connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "defaults::Crawler::read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "defaults::Crawler::max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "defaults::Crawler::robots_txt_cache_sec")]
    pub robots_txt_cache_sec: u64,
}

impl CrawlerConfig {
    /// A config suitable for unit/integration tests: short timeouts and no
    /// artificial delay, so test suites don't pay the production politeness
    /// budget.
    pub fn for_tests() -> Self {
        Self {
            user_agent: UserAgent {
                full: "Mozilla/5.0 (compatible; smallweb-indexer-test/1.0)".to_string(),
                token: "smallweb-indexer-test".to_string(),
            },
            max_concurrent_requests_per_domain: 4,
            min_crawl_delay_ms: 0,
            max_crawl_delay_ms: 1_000,
            wall_clock_cap_secs: 30,
            max_response_size_bytes: 1024 * 1024,
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            max_redirects: 10,
            robots_txt_cache_sec: 60,
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RegistryConfig {
    /// Postgres connection string for `tblDomains` / `tblIndexingFilters` /
    /// `tblSettings` / `tblIndexingLog` / `tblListingStatus` / `tblTiers`.
    pub database_url: String,

    #[serde(default = "defaults::Registry::max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct IndexConfig {
    /// Base URL of the Solr collection, e.g. `http://localhost:8983/solr/sites`.
    pub base_url: String,

    #[serde(default = "defaults::Index::timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::Index::inlinks_query_limit")]
    pub inlinks_query_limit: usize,

    #[serde(default = "defaults::Index::prior_content_query_limit")]
    pub prior_content_query_limit: usize,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// HTTP endpoint accepting `{"input": "..."}` and returning a JSON
    /// float vector.
    pub endpoint: String,

    #[serde(default = "defaults::Embedding::timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::Embedding::vector_dim")]
    pub vector_dim: usize,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "defaults::Smtp::port")]
    pub port: u16,

    pub username: String,
    pub password: String,
    pub from_address: String,
    pub admin_address: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "defaults::Scheduler::batch_size")]
    pub batch_size: usize,

    #[serde(default = "defaults::Scheduler::max_concurrent_sites")]
    pub max_concurrent_sites: usize,

    #[serde(default = "defaults::Scheduler::pass_interval_secs")]
    pub pass_interval_secs: u64,

    #[serde(default = "defaults::Scheduler::stuck_job_threshold_secs")]
    pub stuck_job_threshold_secs: u64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ChunkerConfig {
    #[serde(default = "defaults::Chunker::chunk_size_chars")]
    pub chunk_size_chars: usize,

    #[serde(default = "defaults::Chunker::chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,
}

/// Top-level configuration, loaded from a single TOML file.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    pub registry: RegistryConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,

    /// Admin-notification transport. Omit the `[smtp]` section to run with
    /// notifications dropped (see `crate::notify::NullNotifier`).
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Registrable domains for which the label directly below the
    /// registrable domain is kept as part of a site's identity (see
    /// `crate::domain::extract_domain`).
    #[serde(default)]
    pub subdomain_allow_suffixes: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::Scheduler::batch_size(),
            max_concurrent_sites: defaults::Scheduler::max_concurrent_sites(),
            pass_interval_secs: defaults::Scheduler::pass_interval_secs(),
            stuck_job_threshold_secs: defaults::Scheduler::stuck_job_threshold_secs(),
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size_chars: defaults::Chunker::chunk_size_chars(),
            chunk_overlap_chars: defaults::Chunker::chunk_overlap_chars(),
        }
    }
}
