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

//! The Scheduler: `run_once` selects domains due for reindex,
//! prepares a `SiteConfig` for each, and drives the crawler/chunker/writer
//! pipeline for every selected domain, bounded by the pass concurrency cap.

use std::collections::HashSet;
use std::sync::Arc;

use url::Url;

use crate::chunker::Embedder;
use crate::config::{ChunkerConfig, CrawlerConfig, SchedulerConfig};
use crate::crawler::RobotClient;
use crate::domain::Domain;
use crate::index::SearchIndex;
use crate::notify::Notifier;
use crate::registry::{Registry, SelectedJob};
use crate::site_config::{CommonConfig, SiteConfig};
use crate::Result;

pub struct Scheduler {
    registry: Arc<dyn Registry>,
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn Embedder>,
    notifier: Arc<dyn Notifier>,
    crawler_config: CrawlerConfig,
    chunker_config: ChunkerConfig,
    scheduler_config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<dyn Registry>,
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn Embedder>,
        notifier: Arc<dyn Notifier>,
        crawler_config: CrawlerConfig,
        chunker_config: ChunkerConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            index,
            embedder,
            notifier,
            crawler_config,
            chunker_config,
            scheduler_config,
        }
    }

    /// Executes one scheduling pass: maintenance, then job selection and
    /// per-domain crawls, bounded by `max_concurrent_sites`.
    pub async fn run_once(&self) -> Result<()> {
        crate::maintenance::run(self.registry.as_ref(), self.index.as_ref(), self.notifier.as_ref(), &self.scheduler_config)
            .await?;

        let jobs = self
            .registry
            .select_and_claim_jobs(self.scheduler_config.batch_size)
            .await?;

        if jobs.is_empty() {
            tracing::debug!("no domains due for reindex this pass");
            return Ok(());
        }

        tracing::info!(count = jobs.len(), "scheduling pass selected jobs");

        let all_domains: HashSet<Domain> = self.registry.all_domains().await?.into_iter().collect();
        let subdomain_allow_suffixes: HashSet<String> =
            self.registry.subdomain_allow_suffixes().await?.into_iter().collect();

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.scheduler_config.max_concurrent_sites));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let common = CommonConfig {
                other_domains: all_domains
                    .iter()
                    .filter(|d| **d != job.entry.domain)
                    .cloned()
                    .collect(),
                subdomain_allow_suffixes: subdomain_allow_suffixes.clone(),
            };

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let registry = self.registry.clone();
            let index = self.index.clone();
            let embedder = self.embedder.clone();
            let notifier = self.notifier.clone();
            let crawler_config = self.crawler_config.clone();
            let chunker_config = self.chunker_config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let domain = job.entry.domain.clone();
                if let Err(e) = run_job(
                    registry.as_ref(),
                    index.as_ref(),
                    embedder.as_ref(),
                    notifier.as_ref(),
                    &crawler_config,
                    &chunker_config,
                    job,
                    common,
                )
                .await
                {
                    tracing::error!(%domain, error = %e, "site job failed, leaving row RUNNING for the stuck-job sweep");
                }
            }));
        }

        futures::future::join_all(handles).await;

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    registry: &dyn Registry,
    index: &dyn SearchIndex,
    embedder: &dyn Embedder,
    notifier: &dyn Notifier,
    crawler_config: &CrawlerConfig,
    chunker_config: &ChunkerConfig,
    job: SelectedJob,
    common: CommonConfig,
) -> Result<()> {
    let SelectedJob { entry, full_index } = job;
    let domain = entry.domain.clone();

    let exclusions = registry.load_filters(&domain).await?;
    let indexed_inlinks = crate::linkgraph::load_inlinks(index, &domain).await?;
    let prior_contents = index.prior_contents(&domain).await?;

    let already_indexed_urls = if full_index {
        None
    } else {
        Some(index.already_indexed_urls(&domain).await?)
    };

    let page_limit = entry.page_limit.max(0) as usize;
    let content_chunks_limit = entry.content_chunks_limit.max(0) as usize;

    if let Some(already) = &already_indexed_urls {
        if already.len() >= page_limit {
            registry
                .complete(&domain, full_index, "WARNING: page limit already reached; skipped this pass.")
                .await?;
            return Ok(());
        }
    }

    let effective_page_limit = page_limit.saturating_sub(already_indexed_urls.as_ref().map(HashSet::len).unwrap_or(0));

    let site_config = SiteConfig {
        entry: entry.clone(),
        full_index,
        exclusions,
        indexed_inlinks,
        prior_contents,
        already_indexed_urls,
        feed_links: Default::default(),
        common,
        effective_page_limit,
    };

    let robot_client = RobotClient::new(crawler_config)?;
    let (tx, rx) = async_channel::bounded(32);

    let consumer = async {
        let mut buffered = Vec::new();
        while let Ok(mut item) = rx.recv().await {
            let prior = Url::parse(&item.document.id)
                .ok()
                .and_then(|id| site_config.prior_contents.get(&id));

            let chunks = crate::chunker::chunk_and_embed(
                &item.document,
                prior,
                full_index,
                content_chunks_limit,
                chunker_config,
                embedder,
            )
            .await;
            item.document.content_chunks = chunks;
            buffered.push(item);
        }
        buffered
    };

    let (stats, buffered) = tokio::join!(
        crate::crawler::crawl_site(&site_config, &robot_client, crawler_config, tx),
        consumer
    );
    let stats = stats?;

    crate::index::commit(registry, index, notifier, &entry, full_index, buffered, &stats).await?;

    Ok(())
}

