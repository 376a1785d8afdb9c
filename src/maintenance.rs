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

//! Maintenance: the stuck-job sweep and tier-based listing expiry,
//! invoked at the start of every scheduling pass.

use chrono::{Duration as ChronoDuration, Utc};

use crate::config::SchedulerConfig;
use crate::index::SearchIndex;
use crate::notify::Notifier;
use crate::registry::{Registry, Tier};
use crate::Result;

/// Runs the stuck-job sweep and tier 1 -> 3 listing expiry. Cheap enough to
/// run on every pass.
pub async fn run(
    registry: &dyn Registry,
    index: &dyn SearchIndex,
    notifier: &dyn Notifier,
    config: &SchedulerConfig,
) -> Result<()> {
    sweep_stuck_jobs(registry, config.stuck_job_threshold_secs).await?;

    for tier in [Tier::One, Tier::Two, Tier::Three] {
        expire_listings(registry, index, notifier, tier).await?;
    }

    Ok(())
}

async fn sweep_stuck_jobs(registry: &dyn Registry, threshold_secs: u64) -> Result<()> {
    let stuck = registry.stuck_jobs(threshold_secs).await?;
    for domain in stuck {
        tracing::warn!(%domain, threshold_secs, "domain stuck in RUNNING past the threshold");
    }
    Ok(())
}

/// Applies the per-tier expiry rule to every ACTIVE listing of `tier`
/// whose `listing_end` has passed.
async fn expire_listings(
    registry: &dyn Registry,
    index: &dyn SearchIndex,
    notifier: &dyn Notifier,
    tier: Tier,
) -> Result<()> {
    let expired = registry.expired_listings(tier).await?;

    for entry in expired {
        match tier {
            Tier::One => {
                registry.expire_to_moderator_review(&entry.domain).await?;
                index.delete_by_domain(&entry.domain).await?;
                tracing::info!(domain = %entry.domain, "tier 1 listing expired: moved to moderator review, docs deleted");
            }
            Tier::Two | Tier::Three => {
                let Some(lower) = tier.lower() else {
                    continue;
                };
                let listing_end = Utc::now() + ChronoDuration::seconds(lower.listing_duration_secs());
                registry.downgrade_tier(&entry.domain, lower, listing_end).await?;
                tracing::info!(domain = %entry.domain, ?lower, "listing expired: downgraded a tier");

                if tier == Tier::Three {
                    let _ = notifier
                        .notify_admin(
                            &format!("tier 3 listing expired for {}", entry.domain),
                            &format!("{} has been downgraded from tier 3 after its listing expired.", entry.domain),
                        )
                        .await;
                }
            }
        }
    }

    Ok(())
}
