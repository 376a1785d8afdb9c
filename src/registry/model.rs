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

use chrono::{DateTime, Utc};

use crate::domain::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum Tier {
    One = 1,
    Two = 2,
    Three = 3,
}

impl Tier {
    pub fn lower(self) -> Option<Tier> {
        match self {
            Tier::One => None,
            Tier::Two => Some(Tier::One),
            Tier::Three => Some(Tier::Two),
        }
    }

    /// How long a listing at this tier lasts before it needs renewal or
    /// (tier 2/3) falls back a tier. Tier 2 is the free-trial tier, so its
    /// listing is shortest-lived.
    pub fn listing_duration_secs(self) -> i64 {
        match self {
            Tier::One => 365 * 24 * 60 * 60,
            Tier::Two => 30 * 24 * 60 * 60,
            Tier::Three => 365 * 24 * 60 * 60,
        }
    }

    pub fn page_limit_default(self) -> i64 {
        match self {
            Tier::One => 50,
            Tier::Two => 200,
            Tier::Three => 2_000,
        }
    }

    pub fn content_chunks_limit_default(self) -> i64 {
        match self {
            Tier::One => 20,
            Tier::Two => 50,
            Tier::Three => 200,
        }
    }

    pub fn full_reindex_frequency_secs_default(self) -> i64 {
        match self {
            Tier::One => 30 * 24 * 60 * 60,
            Tier::Two => 14 * 24 * 60 * 60,
            Tier::Three => 7 * 24 * 60 * 60,
        }
    }

    pub fn incremental_reindex_frequency_secs_default(self) -> i64 {
        match self {
            Tier::One => 7 * 24 * 60 * 60,
            Tier::Two => 3 * 24 * 60 * 60,
            Tier::Three => 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Pending,
    Active,
    Disabled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingState {
    ModeratorReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum IndexingStatus {
    Pending,
    Running,
    Complete,
}

/// One row of `tblDomains`, joined with `tblListingStatus` and `tblTiers`.
#[derive(Debug, Clone)]
pub struct DomainRegistryEntry {
    pub domain: Domain,
    pub home_page_url: String,
    pub category: String,
    pub contact_email: String,
    pub tier: Tier,
    pub listing_status: ListingStatus,
    pub pending_state: Option<PendingState>,
    pub listing_end: Option<DateTime<Utc>>,
    pub moderator_approved: bool,
    pub indexing_enabled: bool,
    pub indexing_disabled_reason: Option<String>,
    pub indexing_disabled_changed: Option<DateTime<Utc>>,
    pub indexing_status: IndexingStatus,
    pub indexing_status_changed: Option<DateTime<Utc>>,
    pub last_index_completed: Option<DateTime<Utc>>,
    pub last_full_index_completed: Option<DateTime<Utc>>,
    pub full_reindex_frequency_secs: i64,
    pub incremental_reindex_frequency_secs: i64,
    pub page_limit: i64,
    pub content_chunks_limit: i64,
    pub owner_verified: bool,
    pub api_enabled: bool,
    pub web_feed_auto_discovered: Option<String>,
    pub web_feed_user_entered: Option<String>,
    pub sitemap_auto_discovered: Option<String>,
    pub date_domain_added: DateTime<Utc>,
}

impl DomainRegistryEntry {
    pub fn web_feed(&self) -> Option<&str> {
        self.web_feed_user_entered
            .as_deref()
            .or(self.web_feed_auto_discovered.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Path,
    Type,
}

/// A row of `tblIndexingFilters`: `(domain, action=exclude, type, value)`.
#[derive(Debug, Clone)]
pub struct IndexingFilter {
    pub domain: Domain,
    pub filter_type: FilterType,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Pending,
    Running,
    Complete,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Pending => "PENDING",
            LogStatus::Running => "RUNNING",
            LogStatus::Complete => "COMPLETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingLogEntry {
    pub domain: Domain,
    pub status: LogStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A job selected by the scheduler for one pass: the registry snapshot plus
/// the computed full-vs-incremental decision. Mirrors the Site Configuration
/// shape, minus the fields only the crawler fills in during the job.
#[derive(Debug, Clone)]
pub struct SelectedJob {
    pub entry: DomainRegistryEntry,
    pub full_index: bool,
}
