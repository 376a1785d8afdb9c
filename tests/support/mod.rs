//! In-memory fakes for `Registry`, `SearchIndex`, `Embedder` and `Notifier`,
//! used to drive the scheduler and maintenance pass end to end without a
//! real Postgres/Solr/SMTP backend.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use smallweb_indexer::chunker::Embedder;
use smallweb_indexer::document::IndexedDocument;
use smallweb_indexer::domain::Domain;
use smallweb_indexer::index::SearchIndex;
use smallweb_indexer::notify::Notifier;
use smallweb_indexer::registry::{
    DomainRegistryEntry, IndexingFilter, IndexingStatus, ListingStatus, PendingState, Registry,
    SelectedJob, Tier,
};
use smallweb_indexer::site_config::PriorContent;
use smallweb_indexer::Result;

/// A `DomainRegistryEntry` with every field defaulted to something inert;
/// tests override only the fields the scenario cares about.
pub fn sample_entry(domain: &str, home_page_url: &str) -> DomainRegistryEntry {
    DomainRegistryEntry {
        domain: Domain::from_registry_value(domain),
        home_page_url: home_page_url.to_string(),
        category: "general".to_string(),
        contact_email: "owner@example.com".to_string(),
        tier: Tier::One,
        listing_status: ListingStatus::Active,
        pending_state: None,
        listing_end: None,
        moderator_approved: true,
        indexing_enabled: true,
        indexing_disabled_reason: None,
        indexing_disabled_changed: None,
        indexing_status: IndexingStatus::Pending,
        indexing_status_changed: None,
        last_index_completed: None,
        last_full_index_completed: None,
        full_reindex_frequency_secs: 7 * 24 * 3600,
        incremental_reindex_frequency_secs: 3600,
        page_limit: 100,
        content_chunks_limit: 50,
        owner_verified: false,
        api_enabled: false,
        web_feed_auto_discovered: None,
        web_feed_user_entered: None,
        sitemap_auto_discovered: None,
        date_domain_added: Utc::now(),
    }
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<Domain, DomainRegistryEntry>,
    filters: HashMap<Domain, Vec<IndexingFilter>>,
    last_complete_message: HashMap<Domain, String>,
    completions: Vec<(Domain, bool, String)>,
    disabled: Vec<(Domain, String)>,
    moderator_reviewed: Vec<Domain>,
    downgrades: Vec<(Domain, Tier, DateTime<Utc>)>,
}

/// An in-process stand-in for `PgRegistry`: the same claim-to-RUNNING and
/// completion bookkeeping, minus the SQL.
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
    subdomain_allow_suffixes: Vec<String>,
}

impl InMemoryRegistry {
    pub fn new(entries: Vec<DomainRegistryEntry>) -> Self {
        let mut state = RegistryState::default();
        for entry in entries {
            state.entries.insert(entry.domain.clone(), entry);
        }
        Self {
            state: Mutex::new(state),
            subdomain_allow_suffixes: Vec::new(),
        }
    }

    pub fn with_filters(self, domain: &str, filters: Vec<IndexingFilter>) -> Self {
        self.state
            .lock()
            .unwrap()
            .filters
            .insert(Domain::from_registry_value(domain), filters);
        self
    }

    pub fn with_prior_warning(self, domain: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .last_complete_message
            .insert(Domain::from_registry_value(domain), message.to_string());
        self
    }

    pub fn completions(&self) -> Vec<(Domain, bool, String)> {
        self.state.lock().unwrap().completions.clone()
    }

    pub fn disabled(&self) -> Vec<(Domain, String)> {
        self.state.lock().unwrap().disabled.clone()
    }

    pub fn moderator_reviewed(&self) -> Vec<Domain> {
        self.state.lock().unwrap().moderator_reviewed.clone()
    }

    pub fn downgrades(&self) -> Vec<(Domain, Tier, DateTime<Utc>)> {
        self.state.lock().unwrap().downgrades.clone()
    }

    pub fn indexing_status(&self, domain: &str) -> IndexingStatus {
        self.state.lock().unwrap().entries[&Domain::from_registry_value(domain)].indexing_status
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn select_and_claim_jobs(&self, batch_size: usize) -> Result<Vec<SelectedJob>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        let mut due: Vec<Domain> = state
            .entries
            .values()
            .filter(|e| e.indexing_enabled && e.listing_status == ListingStatus::Active)
            .filter(|e| {
                e.indexing_status == IndexingStatus::Pending
                    || e.last_full_index_completed
                        .map(|t| now - t > chrono::Duration::seconds(e.full_reindex_frequency_secs))
                        .unwrap_or(true)
                    || e.last_index_completed
                        .map(|t| {
                            now - t > chrono::Duration::seconds(e.incremental_reindex_frequency_secs)
                        })
                        .unwrap_or(true)
            })
            .map(|e| e.domain.clone())
            .take(batch_size)
            .collect();
        due.sort();

        let mut jobs = Vec::with_capacity(due.len());
        for domain in due.drain(..) {
            let entry = state.entries.get_mut(&domain).unwrap();
            let full_index = entry.indexing_status == IndexingStatus::Pending
                || entry
                    .last_full_index_completed
                    .map(|t| now - t > chrono::Duration::seconds(entry.full_reindex_frequency_secs))
                    .unwrap_or(true);
            entry.indexing_status = IndexingStatus::Running;
            jobs.push(SelectedJob { entry: entry.clone(), full_index });
        }

        Ok(jobs)
    }

    async fn load_filters(&self, domain: &Domain) -> Result<Vec<IndexingFilter>> {
        Ok(self.state.lock().unwrap().filters.get(domain).cloned().unwrap_or_default())
    }

    async fn all_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.state.lock().unwrap().entries.keys().cloned().collect())
    }

    async fn subdomain_allow_suffixes(&self) -> Result<Vec<String>> {
        Ok(self.subdomain_allow_suffixes.clone())
    }

    async fn start(&self, domain: &Domain) -> Result<()> {
        self.state.lock().unwrap().entries.get_mut(domain).unwrap().indexing_status = IndexingStatus::Running;
        Ok(())
    }

    async fn complete(&self, domain: &Domain, full_index: bool, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.completions.push((domain.clone(), full_index, message.to_string()));
        state.last_complete_message.insert(domain.clone(), message.to_string());

        let now = Utc::now();
        let entry = state.entries.get_mut(domain).unwrap();
        entry.indexing_status = IndexingStatus::Complete;
        entry.last_index_completed = Some(now);
        if full_index {
            entry.last_full_index_completed = Some(now);
        }
        Ok(())
    }

    async fn disable(&self, domain: &Domain, reason: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.disabled.push((domain.clone(), reason.to_string()));
        state.entries.get_mut(domain).unwrap().indexing_enabled = false;
        Ok(())
    }

    async fn last_complete_message(&self, domain: &Domain) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().last_complete_message.get(domain).cloned())
    }

    async fn set_feed_and_sitemap(
        &self,
        domain: &Domain,
        web_feed_auto_discovered: Option<&str>,
        sitemap_auto_discovered: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.get_mut(domain).unwrap();
        if let Some(feed) = web_feed_auto_discovered {
            entry.web_feed_auto_discovered = Some(feed.to_string());
        }
        if let Some(sitemap) = sitemap_auto_discovered {
            entry.sitemap_auto_discovered = Some(sitemap.to_string());
        }
        Ok(())
    }

    async fn stuck_jobs(&self, _threshold_secs: u64) -> Result<Vec<Domain>> {
        Ok(Vec::new())
    }

    async fn expired_listings(&self, tier: Tier) -> Result<Vec<DomainRegistryEntry>> {
        let now = Utc::now();
        Ok(self
            .state
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.tier == tier && e.listing_status == ListingStatus::Active)
            .filter(|e| e.listing_end.map(|end| end < now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn expire_to_moderator_review(&self, domain: &Domain) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.moderator_reviewed.push(domain.clone());
        let entry = state.entries.get_mut(domain).unwrap();
        entry.listing_status = ListingStatus::Pending;
        entry.pending_state = Some(PendingState::ModeratorReview);
        Ok(())
    }

    async fn downgrade_tier(&self, domain: &Domain, new_tier: Tier, listing_end: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.downgrades.push((domain.clone(), new_tier, listing_end));
        let entry = state.entries.get_mut(domain).unwrap();
        entry.tier = new_tier;
        entry.listing_end = Some(listing_end);
        entry.page_limit = new_tier.page_limit_default();
        entry.content_chunks_limit = new_tier.content_chunks_limit_default();
        entry.full_reindex_frequency_secs = new_tier.full_reindex_frequency_secs_default();
        entry.incremental_reindex_frequency_secs = new_tier.incremental_reindex_frequency_secs_default();
        Ok(())
    }
}

#[derive(Default)]
struct IndexState {
    documents: HashMap<Domain, Vec<IndexedDocument>>,
    inbound_links: HashMap<Domain, HashMap<Url, Vec<Url>>>,
    prior_contents: HashMap<Domain, HashMap<Url, PriorContent>>,
    already_indexed_urls: HashMap<Domain, HashSet<Url>>,
    deleted_domains: Vec<Domain>,
}

/// An in-process stand-in for `SolrIndex`.
#[derive(Default)]
pub struct InMemorySearchIndex {
    state: Mutex<IndexState>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prior_content(self, domain: &str, url: &str, prior: PriorContent) -> Self {
        self.state
            .lock()
            .unwrap()
            .prior_contents
            .entry(Domain::from_registry_value(domain))
            .or_default()
            .insert(Url::parse(url).unwrap(), prior);
        self
    }

    pub fn with_already_indexed(self, domain: &str, urls: &[&str]) -> Self {
        self.state.lock().unwrap().already_indexed_urls.insert(
            Domain::from_registry_value(domain),
            urls.iter().map(|u| Url::parse(u).unwrap()).collect(),
        );
        self
    }

    pub fn documents(&self, domain: &str) -> Vec<IndexedDocument> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&Domain::from_registry_value(domain))
            .cloned()
            .unwrap_or_default()
    }

    pub fn deleted_domains(&self) -> Vec<Domain> {
        self.state.lock().unwrap().deleted_domains.clone()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn inbound_links(&self, domain: &Domain) -> Result<HashMap<Url, Vec<Url>>> {
        Ok(self.state.lock().unwrap().inbound_links.get(domain).cloned().unwrap_or_default())
    }

    async fn prior_contents(&self, domain: &Domain) -> Result<HashMap<Url, PriorContent>> {
        Ok(self.state.lock().unwrap().prior_contents.get(domain).cloned().unwrap_or_default())
    }

    async fn already_indexed_urls(&self, domain: &Domain) -> Result<HashSet<Url>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .already_indexed_urls
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_by_domain(&self, domain: &Domain) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted_domains.push(domain.clone());
        state.documents.remove(domain);
        Ok(())
    }

    async fn add_and_commit(&self, documents: &[IndexedDocument]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for doc in documents {
            state.documents.entry(doc.domain.clone()).or_default().push(doc.clone());
        }
        Ok(())
    }
}

/// Returns a fixed, deterministic vector — real embedding quality is out of
/// scope for the pipeline's own tests.
pub struct StubEmbedder {
    pub vector_dim: usize,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; self.vector_dim];
        v[0] = text.len() as f32;
        Ok(v)
    }
}

/// An embedder that always fails, to exercise the "drop this chunk, not the
/// whole document" path.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(smallweb_indexer::Error::Embedding("embedding service unavailable".to_string()).into())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_admin(&self, subject: &str, body: &str) -> Result<()> {
        self.messages.lock().unwrap().push((subject.to_string(), body.to_string()));
        Ok(())
    }
}
