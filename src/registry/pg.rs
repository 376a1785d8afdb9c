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

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::config::RegistryConfig;
use crate::domain::Domain;
use crate::error::Error;
use crate::Result;

use super::model::{DomainRegistryEntry, FilterType, IndexingFilter, SelectedJob, Tier};
use super::Registry;

pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub async fn connect(config: &RegistryConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> sqlx::Result<DomainRegistryEntry> {
        Ok(DomainRegistryEntry {
            domain: Domain::from_registry_value(row.try_get::<String, _>("domain")?),
            home_page_url: row.try_get("home_page_url")?,
            category: row.try_get("category")?,
            contact_email: row.try_get("contact_email")?,
            tier: row.try_get("tier")?,
            listing_status: row.try_get("listing_status")?,
            pending_state: row.try_get("pending_state")?,
            listing_end: row.try_get("listing_end")?,
            moderator_approved: row.try_get("moderator_approved")?,
            indexing_enabled: row.try_get("indexing_enabled")?,
            indexing_disabled_reason: row.try_get("indexing_disabled_reason")?,
            indexing_disabled_changed: row.try_get("indexing_disabled_changed")?,
            indexing_status: row.try_get("indexing_status")?,
            indexing_status_changed: row.try_get("indexing_status_changed")?,
            last_index_completed: row.try_get("last_index_completed")?,
            last_full_index_completed: row.try_get("last_full_index_completed")?,
            full_reindex_frequency_secs: row.try_get("full_reindex_frequency_secs")?,
            incremental_reindex_frequency_secs: row
                .try_get("incremental_reindex_frequency_secs")?,
            page_limit: row.try_get("page_limit")?,
            content_chunks_limit: row.try_get("content_chunks_limit")?,
            owner_verified: row.try_get("owner_verified")?,
            api_enabled: row.try_get("api_enabled")?,
            web_feed_auto_discovered: row.try_get("web_feed_auto_discovered")?,
            web_feed_user_entered: row.try_get("web_feed_user_entered")?,
            sitemap_auto_discovered: row.try_get("sitemap_auto_discovered")?,
            date_domain_added: row.try_get("date_domain_added")?,
        })
    }
}

#[async_trait]
impl Registry for PgRegistry {
    async fn select_and_claim_jobs(&self, batch_size: usize) -> Result<Vec<SelectedJob>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT d.domain, d.home_page_url, d.category, d.contact_email, d.tier,
                   ls.status AS listing_status, ls.pending_state, ls.listing_end,
                   d.moderator_approved, d.indexing_enabled, d.indexing_disabled_reason,
                   d.indexing_disabled_changed, d.indexing_status, d.indexing_status_changed,
                   d.last_index_completed, d.last_full_index_completed,
                   d.full_reindex_frequency_secs, d.incremental_reindex_frequency_secs,
                   d.page_limit, d.content_chunks_limit, d.owner_verified, d.api_enabled,
                   d.web_feed_auto_discovered, d.web_feed_user_entered,
                   d.sitemap_auto_discovered, d.date_domain_added,
                   (d.indexing_status = 'PENDING'
                       OR now() - d.last_full_index_completed > (d.full_reindex_frequency_secs || ' seconds')::interval
                   ) AS full_index
            FROM tblDomains d
            JOIN tblListingStatus ls ON ls.domain = d.domain
            JOIN tblTiers t ON t.tier = d.tier
            WHERE d.indexing_type = 'spider/default'
              AND d.indexing_enabled = true
              AND ls.status = 'ACTIVE'
              AND (
                  d.indexing_status = 'PENDING'
                  OR now() - d.last_full_index_completed > (d.full_reindex_frequency_secs || ' seconds')::interval
                  OR now() - d.last_index_completed > (d.incremental_reindex_frequency_secs || ' seconds')::interval
              )
            ORDER BY (d.indexing_status = 'PENDING') DESC, d.tier DESC
            LIMIT $1
            FOR UPDATE OF d SKIP LOCKED
            "#,
        )
        .bind(batch_size as i64)
        .fetch_all(&mut *tx)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = Self::row_to_entry(row)?;
            let full_index: bool = row.try_get("full_index")?;

            sqlx::query(
                r#"UPDATE tblDomains SET indexing_status = 'RUNNING', indexing_status_changed = now()
                   WHERE domain = $1"#,
            )
            .bind(entry.domain.as_str())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"INSERT INTO tblIndexingLog (domain, status, timestamp, message)
                   VALUES ($1, 'RUNNING', now(), '')"#,
            )
            .bind(entry.domain.as_str())
            .execute(&mut *tx)
            .await?;

            jobs.push(SelectedJob { entry, full_index });
        }

        tx.commit().await?;
        Ok(jobs)
    }

    async fn load_filters(&self, domain: &Domain) -> Result<Vec<IndexingFilter>> {
        let rows = sqlx::query(
            r#"SELECT domain, type, value FROM tblIndexingFilters
               WHERE domain = $1 AND action = 'exclude'"#,
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let filter_type: String = row.try_get("type")?;
                let filter_type = match filter_type.as_str() {
                    "path" => FilterType::Path,
                    "type" => FilterType::Type,
                    other => {
                        return Err(sqlx::Error::Decode(
                            format!("unknown indexing filter type: {other}").into(),
                        ))
                    }
                };
                Ok(IndexingFilter {
                    domain: domain.clone(),
                    filter_type,
                    value: row.try_get("value")?,
                })
            })
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(Error::from)
            .map_err(Into::into)
    }

    async fn all_domains(&self) -> Result<Vec<Domain>> {
        let rows = sqlx::query(r#"SELECT domain FROM tblDomains"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Domain::from_registry_value(row.get::<String, _>("domain")))
            .collect())
    }

    async fn subdomain_allow_suffixes(&self) -> Result<Vec<String>> {
        let row = sqlx::query(
            r#"SELECT value FROM tblSettings WHERE key = 'subdomain_allow_suffixes'"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => {
                let csv: String = row.try_get("value")?;
                csv.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            None => Vec::new(),
        })
    }

    async fn start(&self, domain: &Domain) -> Result<()> {
        sqlx::query(
            r#"UPDATE tblDomains SET indexing_status = 'RUNNING', indexing_status_changed = now()
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"INSERT INTO tblIndexingLog (domain, status, timestamp, message)
               VALUES ($1, 'RUNNING', now(), '')"#,
        )
        .bind(domain.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(&self, domain: &Domain, full_index: bool, message: &str) -> Result<()> {
        let success = message.starts_with("SUCCESS:");

        sqlx::query(
            r#"INSERT INTO tblIndexingLog (domain, status, timestamp, message)
               VALUES ($1, 'COMPLETE', now(), $2)"#,
        )
        .bind(domain.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"UPDATE tblDomains SET indexing_status = 'COMPLETE', indexing_status_changed = now()
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .execute(&self.pool)
        .await?;

        if success {
            if full_index {
                sqlx::query(
                    r#"UPDATE tblDomains
                       SET last_index_completed = now(), last_full_index_completed = now()
                       WHERE domain = $1"#,
                )
                .bind(domain.as_str())
                .execute(&self.pool)
                .await?;
            } else {
                sqlx::query(
                    r#"UPDATE tblDomains SET last_index_completed = now() WHERE domain = $1"#,
                )
                .bind(domain.as_str())
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    async fn disable(&self, domain: &Domain, reason: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE tblDomains
               SET indexing_enabled = false,
                   indexing_disabled_reason = $2,
                   indexing_disabled_changed = now()
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn last_complete_message(&self, domain: &Domain) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"SELECT message FROM tblIndexingLog
               WHERE domain = $1 AND status = 'COMPLETE'
               ORDER BY timestamp DESC
               LIMIT 1"#,
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("message")?),
            None => None,
        })
    }

    async fn set_feed_and_sitemap(
        &self,
        domain: &Domain,
        web_feed_auto_discovered: Option<&str>,
        sitemap_auto_discovered: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE tblDomains
               SET web_feed_auto_discovered = COALESCE($2, web_feed_auto_discovered),
                   sitemap_auto_discovered = COALESCE($3, sitemap_auto_discovered)
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .bind(web_feed_auto_discovered)
        .bind(sitemap_auto_discovered)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stuck_jobs(&self, threshold_secs: u64) -> Result<Vec<Domain>> {
        let rows = sqlx::query(
            r#"SELECT domain FROM tblDomains
               WHERE indexing_status = 'RUNNING'
                 AND now() - indexing_status_changed > ($1 || ' seconds')::interval"#,
        )
        .bind(threshold_secs as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Domain::from_registry_value(row.get::<String, _>("domain")))
            .collect())
    }

    async fn expired_listings(&self, tier: Tier) -> Result<Vec<DomainRegistryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT d.domain, d.home_page_url, d.category, d.contact_email, d.tier,
                   ls.status AS listing_status, ls.pending_state, ls.listing_end,
                   d.moderator_approved, d.indexing_enabled, d.indexing_disabled_reason,
                   d.indexing_disabled_changed, d.indexing_status, d.indexing_status_changed,
                   d.last_index_completed, d.last_full_index_completed,
                   d.full_reindex_frequency_secs, d.incremental_reindex_frequency_secs,
                   d.page_limit, d.content_chunks_limit, d.owner_verified, d.api_enabled,
                   d.web_feed_auto_discovered, d.web_feed_user_entered,
                   d.sitemap_auto_discovered, d.date_domain_added
            FROM tblDomains d
            JOIN tblListingStatus ls ON ls.domain = d.domain
            WHERE d.tier = $1 AND ls.status = 'ACTIVE' AND ls.listing_end < now()
            "#,
        )
        .bind(tier)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::row_to_entry)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(Error::from)
            .map_err(Into::into)
    }

    async fn expire_to_moderator_review(&self, domain: &Domain) -> Result<()> {
        sqlx::query(
            r#"UPDATE tblListingStatus
               SET status = 'PENDING', pending_state = 'MODERATOR_REVIEW'
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn downgrade_tier(
        &self,
        domain: &Domain,
        new_tier: Tier,
        listing_end: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"UPDATE tblListingStatus SET status = 'EXPIRED' WHERE domain = $1"#)
            .bind(domain.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"INSERT INTO tblListingStatus (domain, status, listing_end)
               VALUES ($1, 'ACTIVE', $2)"#,
        )
        .bind(domain.as_str())
        .bind(listing_end)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE tblDomains
               SET tier = $2,
                   page_limit = $3,
                   content_chunks_limit = $4,
                   full_reindex_frequency_secs = $5,
                   incremental_reindex_frequency_secs = $6
               WHERE domain = $1"#,
        )
        .bind(domain.as_str())
        .bind(new_tier)
        .bind(new_tier.page_limit_default())
        .bind(new_tier.content_chunks_limit_default())
        .bind(new_tier.full_reindex_frequency_secs_default())
        .bind(new_tier.incremental_reindex_frequency_secs_default())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
