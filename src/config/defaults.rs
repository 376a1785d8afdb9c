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

pub struct Crawler;

impl Crawler {
    pub fn max_concurrent_requests_per_domain() -> usize {
        4
    }

    pub fn min_crawl_delay_ms() -> u64 {
        2_000
    }

    /// Upper bound on a `robots.txt` `Crawl-delay` we'll actually honour;
    /// sites asking for more than this are capped rather than starved out.
    pub fn max_crawl_delay_ms() -> u64 {
        60_000
    }

    pub fn wall_clock_cap_secs() -> u64 {
        30 * 60
    }

    pub fn max_response_size_bytes() -> usize {
        1024 * 1024
    }

    pub fn connect_timeout_secs() -> u64 {
        30
    }

    pub fn read_timeout_secs() -> u64 {
        30
    }

    pub fn max_redirects() -> usize {
        10
    }

    pub fn robots_txt_cache_sec() -> u64 {
        60 * 60
    }
}

pub struct Scheduler;

impl Scheduler {
    pub fn batch_size() -> usize {
        8
    }

    pub fn max_concurrent_sites() -> usize {
        16
    }

    pub fn pass_interval_secs() -> u64 {
        5 * 60
    }

    pub fn stuck_job_threshold_secs() -> u64 {
        6 * 60 * 60
    }
}

pub struct Chunker;

impl Chunker {
    pub fn chunk_size_chars() -> usize {
        500
    }

    pub fn chunk_overlap_chars() -> usize {
        50
    }
}

pub struct Registry;

impl Registry {
    pub fn max_connections() -> u32 {
        10
    }
}

pub struct Embedding;

impl Embedding {
    pub fn timeout_secs() -> u64 {
        30
    }

    pub fn vector_dim() -> usize {
        384
    }
}

pub struct Index;

impl Index {
    pub fn timeout_secs() -> u64 {
        30
    }

    pub fn inlinks_query_limit() -> usize {
        10_000
    }

    pub fn prior_content_query_limit() -> usize {
        1_000
    }
}

pub struct Smtp;

impl Smtp {
    pub fn port() -> u16 {
        587
    }
}
