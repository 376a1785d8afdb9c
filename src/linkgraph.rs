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

//! Resolves the inbound link graph for a domain. The inlink graph is never
//! stored — it's reconstructed per job by querying the index for documents
//! whose outlinks mention this domain, then inverted into
//! `url -> [inbound_url]` and frozen for the crawl.

use std::collections::HashMap;

use url::Url;

use crate::domain::Domain;
use crate::index::SearchIndex;
use crate::Result;

/// Loads and freezes the inbound-link map for one domain, to be handed to
/// the `SiteConfig` at job start.
pub async fn load_inlinks(index: &dyn SearchIndex, domain: &Domain) -> Result<HashMap<Url, Vec<Url>>> {
    index.inbound_links(domain).await
}
