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

pub mod model;
pub mod pg;

use async_trait::async_trait;

pub use model::{
    DomainRegistryEntry, FilterType, IndexingFilter, IndexingLogEntry, IndexingStatus,
    ListingStatus, LogStatus, PendingState, SelectedJob, Tier,
};
pub use pg::PgRegistry;

use crate::domain::Domain;
use crate::Result;

/// Narrow seam between the scheduler/writer and the backing SQL store, the
/// same way `RobotClient` wraps robots.txt I/O: callers depend on this
/// trait, not on a pool directly.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Selects domains due for reindex and atomically transitions them to
    /// RUNNING in the same query, enforcing single-flight. Returns at most
    /// `batch_size` jobs.
    async fn select_and_claim_jobs(&self, batch_size: usize) -> Result<Vec<SelectedJob>>;

    async fn load_filters(&self, domain: &Domain) -> Result<Vec<IndexingFilter>>;

    /// All other registered domains, used by the parser to decide which
    /// outbound links are "indexed outlinks".
    async fn all_domains(&self) -> Result<Vec<Domain>>;

    /// Registrable domains on the subdomain-allow list (`tblSettings`).
    async fn subdomain_allow_suffixes(&self) -> Result<Vec<String>>;

    async fn start(&self, domain: &Domain) -> Result<()>;

    async fn complete(
        &self,
        domain: &Domain,
        full_index: bool,
        message: &str,
    ) -> Result<()>;

    async fn disable(&self, domain: &Domain, reason: &str) -> Result<()>;

    /// The message of the most recent COMPLETE log row for `domain`, used
    /// to detect a second consecutive zero-document WARNING.
    async fn last_complete_message(&self, domain: &Domain) -> Result<Option<String>>;

    async fn set_feed_and_sitemap(
        &self,
        domain: &Domain,
        web_feed_auto_discovered: Option<&str>,
        sitemap_auto_discovered: Option<&str>,
    ) -> Result<()>;

    /// Sweeps rows stuck in RUNNING for longer than `threshold_secs`,
    /// returning the affected domains (for logging).
    async fn stuck_jobs(&self, threshold_secs: u64) -> Result<Vec<Domain>>;

    /// ACTIVE listings for a tier with `listing_end < now`.
    async fn expired_listings(&self, tier: Tier) -> Result<Vec<DomainRegistryEntry>>;

    /// Tier 1 expiry: move to PENDING/MODERATOR_REVIEW.
    async fn expire_to_moderator_review(&self, domain: &Domain) -> Result<()>;

    /// Tier 2/3 expiry: mark current listing EXPIRED and create a new
    /// ACTIVE listing at `new_tier` with the given `listing_end`.
    async fn downgrade_tier(
        &self,
        domain: &Domain,
        new_tier: Tier,
        listing_end: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
}
