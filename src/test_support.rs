//! In-memory `Registry`/`SearchIndex`/`Embedder`/`Notifier` fakes shared by
//! unit tests that need to drive a full scheduling pass without a real
//! Postgres/Solr/SMTP backend. Kept separate from the integration-test
//! fakes under `tests/support/` because those can't reach this crate's
//! `#[cfg(test)]`-gated items (notably `RobotsTxtManager::insert`).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::chunker::Embedder;
use crate::document::IndexedDocument;
use crate::domain::Domain;
use crate::index::SearchIndex;
use crate::notify::Notifier;
use crate::registry::{
    DomainRegistryEntry, IndexingFilter, IndexingStatus, ListingStatus, PendingState, Registry, SelectedJob, Tier,
};
use crate::site_config::PriorContent;
use crate::Result;

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
}

pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new(entries: Vec<DomainRegistryEntry>) -> Self {
        let mut state = RegistryState::default();
        for entry in entries {
            state.entries.insert(entry.domain.clone(), entry);
        }
        Self { state: Mutex::new(state) }
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

    pub fn indexing_enabled(&self, domain: &str) -> bool {
        self.state.lock().unwrap().entries[&Domain::from_registry_value(domain)].indexing_enabled
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn select_and_claim_jobs(&self, batch_size: usize) -> Result<Vec<SelectedJob>> {
        let mut state = self.state.lock().unwrap();
        let due: Vec<Domain> = state.entries.keys().take(batch_size).cloned().collect();

        let mut jobs = Vec::with_capacity(due.len());
        for domain in due {
            let entry = state.entries.get_mut(&domain).unwrap();
            let full_index = entry.indexing_status == IndexingStatus::Pending;
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
        Ok(Vec::new())
    }

    async fn start(&self, domain: &Domain) -> Result<()> {
        self.state.lock().unwrap().entries.get_mut(domain).unwrap().indexing_status = IndexingStatus::Running;
        Ok(())
    }

    async fn complete(&self, domain: &Domain, full_index: bool, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.completions.push((domain.clone(), full_index, message.to_string()));
        state.last_complete_message.insert(domain.clone(), message.to_string());
        let entry = state.entries.get_mut(domain).unwrap();
        entry.indexing_status = IndexingStatus::Complete;
        entry.last_index_completed = Some(Utc::now());
        if full_index {
            entry.last_full_index_completed = Some(Utc::now());
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

    async fn expired_listings(&self, _tier: Tier) -> Result<Vec<DomainRegistryEntry>> {
        Ok(Vec::new())
    }

    async fn expire_to_moderator_review(&self, domain: &Domain) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.get_mut(domain).unwrap();
        entry.listing_status = ListingStatus::Pending;
        entry.pending_state = Some(PendingState::ModeratorReview);
        Ok(())
    }

    async fn downgrade_tier(&self, domain: &Domain, new_tier: Tier, listing_end: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
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
    already_indexed_urls: HashMap<Domain, HashSet<Url>>,
    deleted_domains: Vec<Domain>,
}

#[derive(Default)]
pub struct InMemorySearchIndex {
    state: Mutex<IndexState>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
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
    async fn inbound_links(&self, _domain: &Domain) -> Result<HashMap<Url, Vec<Url>>> {
        Ok(HashMap::new())
    }

    async fn prior_contents(&self, _domain: &Domain) -> Result<HashMap<Url, PriorContent>> {
        Ok(HashMap::new())
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

pub struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32])
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
