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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("fetch failed: {0}")]
    Fetch(reqwest::Error),

    #[error("fetch returned status {0}")]
    FetchStatus(reqwest::StatusCode),

    #[error("content too large (> {0} bytes)")]
    ContentTooLarge(usize),

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("failed to parse response as {0}")]
    Parse(&'static str),

    #[error("registry error: {0}")]
    Registry(#[from] sqlx::Error),

    #[error("index error: {0}")]
    Index(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid domain for url: {0}")]
    InvalidDomain(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
