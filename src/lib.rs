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

//! Indexing pipeline for a vertical search service over independently-owned
//! personal and small websites: the scheduler, per-site crawler, page
//! parser, content chunker/embedder, and index/registry writers.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_arguments)]

pub mod chunker;
pub mod config;
pub mod crawler;
pub mod dated_url;
pub mod document;
pub mod domain;
pub mod error;
pub mod feed;
pub mod index;
pub mod linkgraph;
pub mod maintenance;
pub mod notify;
pub mod parser;
pub mod registry;
pub mod scheduler;
pub mod site_config;
pub mod sitemap;
#[cfg(test)]
pub(crate) mod test_support;
pub mod url_ext;

pub use error::{Error, Result};
