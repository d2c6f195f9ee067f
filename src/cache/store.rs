use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Client, List, NewWebhook, Webhook};

/// Entity collections tracked by the cache, each with its own freshness
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Clients,
    Lists,
    Webhooks,
}

/// Freshness verdict for one collection against the active scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    ScopeMismatch,
    Stale,
    Expired,
    Aging,
    Fresh,
}

/// Freshness metadata for one entity collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub scope_key: Option<String>,
    pub is_stale: bool,
}

impl CacheEntry {
    /// Usable iff stamped, for the active scope, not invalidated, and
    /// younger than `max_age`.
    pub fn is_valid(&self, scope_key: &str, max_age: Duration) -> bool {
        let Some(timestamp) = self.timestamp else {
            return false;
        };
        if self.scope_key.as_deref() != Some(scope_key) {
            return false;
        }
        if self.is_stale {
            return false;
        }
        Utc::now() - timestamp < max_age
    }

    pub fn age(&self) -> Option<Duration> {
        self.timestamp.map(|t| Utc::now() - t)
    }

    fn stamp(&mut self, scope_key: &str) {
        self.timestamp = Some(Utc::now());
        self.scope_key = Some(scope_key.to_string());
        self.is_stale = false;
    }
}

/// Per-kind freshness windows. Webhooks churn fastest, clients slowest.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub clients_max_age: Duration,
    pub lists_max_age: Duration,
    pub webhooks_max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            clients_max_age: Duration::minutes(30),
            lists_max_age: Duration::minutes(15),
            webhooks_max_age: Duration::minutes(10),
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self, kind: EntityKind) -> Duration {
        match kind {
            EntityKind::Clients => self.clients_max_age,
            EntityKind::Lists => self.lists_max_age,
            EntityKind::Webhooks => self.webhooks_max_age,
        }
    }
}

/// Cached entity collections and their freshness metadata.
///
/// An explicit state container: constructed per session, handed to the
/// coordinator, thrown away on logout. Webhooks are keyed by their owning
/// list id.
#[derive(Debug, Default)]
pub struct DataStore {
    clients: Vec<Client>,
    lists: Vec<List>,
    webhooks: HashMap<String, Vec<Webhook>>,
    clients_meta: CacheEntry,
    lists_meta: CacheEntry,
    webhooks_meta: CacheEntry,
    config: CacheConfig,
    next_provisional_id: u64,
}

impl DataStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn entry(&self, kind: EntityKind) -> &CacheEntry {
        match kind {
            EntityKind::Clients => &self.clients_meta,
            EntityKind::Lists => &self.lists_meta,
            EntityKind::Webhooks => &self.webhooks_meta,
        }
    }

    fn entry_mut(&mut self, kind: EntityKind) -> &mut CacheEntry {
        match kind {
            EntityKind::Clients => &mut self.clients_meta,
            EntityKind::Lists => &mut self.lists_meta,
            EntityKind::Webhooks => &mut self.webhooks_meta,
        }
    }

    pub fn has_data(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Clients => !self.clients.is_empty(),
            EntityKind::Lists => !self.lists.is_empty(),
            EntityKind::Webhooks => !self.webhooks.is_empty(),
        }
    }

    pub fn is_valid(&self, kind: EntityKind, scope_key: &str) -> bool {
        self.entry(kind).is_valid(scope_key, self.config.max_age(kind))
    }

    /// A load is needed when there is nothing cached, or what is cached
    /// fails the validity invariant for the active scope.
    pub fn should_load(&self, kind: EntityKind, scope_key: &str) -> bool {
        !self.has_data(kind) || !self.is_valid(kind, scope_key)
    }

    pub fn status(&self, kind: EntityKind, scope_key: &str) -> CacheStatus {
        let entry = self.entry(kind);
        let Some(timestamp) = entry.timestamp else {
            return CacheStatus::Empty;
        };
        if entry.scope_key.as_deref() != Some(scope_key) {
            return CacheStatus::ScopeMismatch;
        }
        if entry.is_stale {
            return CacheStatus::Stale;
        }

        let age = Utc::now() - timestamp;
        let max_age = self.config.max_age(kind);
        if age > max_age {
            CacheStatus::Expired
        } else if age > max_age * 4 / 5 {
            CacheStatus::Aging
        } else {
            CacheStatus::Fresh
        }
    }

    // ===== Wholesale replacement on fetch =====

    pub fn set_clients(&mut self, clients: Vec<Client>, scope_key: &str) {
        self.clients = clients;
        self.clients_meta.stamp(scope_key);
    }

    pub fn set_lists(&mut self, lists: Vec<List>, scope_key: &str) {
        self.lists = lists;
        self.lists_meta.stamp(scope_key);
    }

    /// Store batch-fetched webhooks. Lists whose fetch failed keep their
    /// previous entries; the collection is stamped once for the batch.
    pub fn store_webhooks(&mut self, results: HashMap<String, Vec<Webhook>>, scope_key: &str) {
        for (list_id, webhooks) in results {
            self.webhooks.insert(list_id, webhooks);
        }
        self.webhooks_meta.stamp(scope_key);
    }

    // ===== Invalidation and teardown =====

    /// Mark one collection unusable without dropping its data.
    pub fn invalidate(&mut self, kind: EntityKind) {
        self.entry_mut(kind).is_stale = true;
    }

    pub fn invalidate_all(&mut self) {
        self.clients_meta.is_stale = true;
        self.lists_meta.is_stale = true;
        self.webhooks_meta.is_stale = true;
    }

    /// Purge everything: entities and metadata. Used on credential change,
    /// auth failure, and logout - not for ordinary staleness.
    pub fn clear(&mut self) {
        self.clients.clear();
        self.lists.clear();
        self.webhooks.clear();
        self.clients_meta = CacheEntry::default();
        self.lists_meta = CacheEntry::default();
        self.webhooks_meta = CacheEntry::default();
    }

    // ===== Accessors =====

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    pub fn list_by_id(&self, list_id: &str) -> Option<&List> {
        self.lists.iter().find(|l| l.list_id == list_id)
    }

    pub fn client_by_id(&self, client_id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    pub fn webhooks(&self) -> &HashMap<String, Vec<Webhook>> {
        &self.webhooks
    }

    pub fn webhooks_for(&self, list_id: &str) -> &[Webhook] {
        self.webhooks.get(list_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn total_webhooks(&self) -> usize {
        self.webhooks.values().map(Vec::len).sum()
    }

    // ===== Single-webhook mutations =====

    pub fn add_webhook(&mut self, list_id: &str, webhook: Webhook) {
        self.webhooks.entry(list_id.to_string()).or_default().push(webhook);
    }

    pub fn remove_webhook(&mut self, list_id: &str, webhook_id: &str) -> bool {
        let Some(hooks) = self.webhooks.get_mut(list_id) else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|w| w.webhook_id != webhook_id);
        hooks.len() != before
    }

    // ===== Optimistic creation protocol =====

    /// Insert a provisional entry for a creation that is still in flight.
    /// Visible to readers immediately; carries a temp id for later
    /// reconciliation.
    pub fn insert_provisional(&mut self, list_id: &str, draft: &NewWebhook) -> u64 {
        self.next_provisional_id += 1;
        let id = self.next_provisional_id;
        let webhook = Webhook {
            webhook_id: format!("pending-{id}"),
            url: draft.url.clone(),
            events: draft.events.clone(),
            payload_format: Some(draft.payload_format.clone()),
            status: None,
            provisional: Some(id),
        };
        self.add_webhook(list_id, webhook);
        id
    }

    /// Swap a provisional entry for the confirmed one, in place. Matching
    /// is a linear scan - fine at webhooks-per-list scale.
    pub fn confirm_provisional(
        &mut self,
        list_id: &str,
        provisional_id: u64,
        webhook_id: &str,
    ) -> bool {
        let Some(hooks) = self.webhooks.get_mut(list_id) else {
            return false;
        };
        match hooks.iter_mut().find(|w| w.provisional == Some(provisional_id)) {
            Some(hook) => {
                hook.webhook_id = webhook_id.to_string();
                hook.provisional = None;
                true
            }
            None => false,
        }
    }

    /// Drop a provisional entry whose creation failed.
    pub fn remove_provisional(&mut self, list_id: &str, provisional_id: u64) -> bool {
        let Some(hooks) = self.webhooks.get_mut(list_id) else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|w| w.provisional != Some(provisional_id));
        hooks.len() != before
    }
}

// ============================================================================
// Tests
// ============================================================================
