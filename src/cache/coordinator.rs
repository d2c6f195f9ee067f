//! Cache-aware load orchestration over the API facade.
//!
//! One coordinator per session. Each entity collection moves through
//! empty -> loading -> fresh -> stale/expired; a load request while a fetch
//! for the same collection is in flight gets an in-progress answer instead
//! of a duplicate network call. Failures walk an exponential backoff before
//! the collection is marked stale and the error surfaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, CmApi, DEFAULT_BATCH_CONCURRENCY};
use crate::auth::{SessionEvent, ACCOUNT_SCOPE_KEY};
use crate::models::{Client, List, NewWebhook, Webhook};

use super::store::{CacheConfig, CacheStatus, DataStore, EntityKind};

/// Maximum additional attempts after a retryable failure.
const MAX_RETRIES: u32 = 2;

/// Result of a cache-aware load: where the data came from, or a signal
/// that a load for the same collection is already in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Load<T> {
    Cached(T),
    Fetched(T),
    InProgress,
}

impl<T> Load<T> {
    pub fn from_cache(&self) -> bool {
        matches!(self, Load::Cached(_))
    }

    pub fn data(self) -> Option<T> {
        match self {
            Load::Cached(data) | Load::Fetched(data) => Some(data),
            Load::InProgress => None,
        }
    }
}

/// Combined outcome of the startup load sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialLoad {
    InProgress,
    Loaded { from_cache: bool },
}

#[derive(Debug, Default)]
struct InFlight {
    clients: bool,
    lists: bool,
    webhooks: bool,
    initial: bool,
}

#[derive(Debug, Default)]
struct CancelSlots {
    lists: Option<CancellationToken>,
    webhooks: Option<CancellationToken>,
}

struct CoordinatorState {
    store: DataStore,
    in_flight: InFlight,
    cancel: CancelSlots,
}

/// Load coordinator for the cached entity collections.
///
/// Clone is cheap - state is shared behind an Arc so concurrent tasks see
/// the same cache and the same reentrancy guards. The lock is never held
/// across a suspension point.
#[derive(Clone)]
pub struct Coordinator {
    api: CmApi,
    state: Arc<Mutex<CoordinatorState>>,
}

impl Coordinator {
    pub fn new(api: CmApi, config: CacheConfig) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(CoordinatorState {
                store: DataStore::new(config),
                in_flight: InFlight::default(),
                cancel: CancelSlots::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read from the store under the lock. The closure must not block.
    pub fn with_store<R>(&self, f: impl FnOnce(&DataStore) -> R) -> R {
        f(&self.lock().store)
    }

    pub fn clients(&self) -> Vec<Client> {
        self.lock().store.clients().to_vec()
    }

    pub fn lists(&self) -> Vec<List> {
        self.lock().store.lists().to_vec()
    }

    pub fn webhooks_for(&self, list_id: &str) -> Vec<Webhook> {
        self.lock().store.webhooks_for(list_id).to_vec()
    }

    pub fn total_webhooks(&self) -> usize {
        self.lock().store.total_webhooks()
    }

    pub fn cache_status(&self, kind: EntityKind, scope_key: &str) -> CacheStatus {
        self.lock().store.status(kind, scope_key)
    }

    /// Load the account's clients unless a valid cached copy exists.
    /// Clients are account-level, cached under the fixed account scope key.
    pub async fn load_clients_if_needed(
        &self,
        force: bool,
    ) -> Result<Load<Vec<Client>>, ApiError> {
        {
            let mut state = self.lock();
            if !force && !state.store.should_load(EntityKind::Clients, ACCOUNT_SCOPE_KEY) {
                debug!("Clients served from cache");
                return Ok(Load::Cached(state.store.clients().to_vec()));
            }
            if state.in_flight.clients {
                return Ok(Load::InProgress);
            }
            state.in_flight.clients = true;
        }

        let cancel = CancellationToken::new();
        let result = self
            .fetch_with_retry("clients", &cancel, || self.api.get_clients(&cancel))
            .await;

        let mut state = self.lock();
        state.in_flight.clients = false;
        match result {
            Ok(clients) => {
                info!(count = clients.len(), "Clients refreshed");
                state.store.set_clients(clients.clone(), ACCOUNT_SCOPE_KEY);
                Ok(Load::Fetched(clients))
            }
            Err(e) => {
                if !e.is_cancelled() {
                    state.store.invalidate(EntityKind::Clients);
                }
                Err(e)
            }
        }
    }

    /// Load the client's lists unless a valid cached copy exists. Stats for
    /// every list are batch-fetched and merged in before the data lands.
    pub async fn load_lists_if_needed(
        &self,
        client_id: &str,
        force: bool,
    ) -> Result<Load<Vec<List>>, ApiError> {
        if client_id.is_empty() {
            return Err(ApiError::Validation(vec![
                "Client ID is required to load lists".to_string(),
            ]));
        }

        let cancel = {
            let mut state = self.lock();
            if !force && !state.store.should_load(EntityKind::Lists, client_id) {
                debug!(client_id, "Lists served from cache");
                return Ok(Load::Cached(state.store.lists().to_vec()));
            }
            if state.in_flight.lists {
                return Ok(Load::InProgress);
            }
            state.in_flight.lists = true;

            let token = CancellationToken::new();
            // A newer load supersedes whatever was still running.
            if let Some(previous) = state.cancel.lists.replace(token.clone()) {
                previous.cancel();
            }
            token
        };

        let result = self
            .fetch_with_retry("lists", &cancel, || self.fetch_lists_with_stats(client_id, &cancel))
            .await;

        let mut state = self.lock();
        state.in_flight.lists = false;
        match result {
            Ok(lists) => {
                info!(client_id, count = lists.len(), "Lists refreshed");
                state.store.set_lists(lists.clone(), client_id);
                Ok(Load::Fetched(lists))
            }
            Err(e) => {
                if !e.is_cancelled() {
                    state.store.invalidate(EntityKind::Lists);
                }
                Err(e)
            }
        }
    }

    /// Load webhooks for every known list unless a valid cached copy
    /// exists. Reports in-progress while the list id set is still unknown.
    pub async fn load_webhooks_if_needed(
        &self,
        client_id: &str,
        force: bool,
    ) -> Result<Load<HashMap<String, Vec<Webhook>>>, ApiError> {
        if client_id.is_empty() {
            return Err(ApiError::Validation(vec![
                "Client ID is required to load webhooks".to_string(),
            ]));
        }

        let (cancel, list_ids) = {
            let mut state = self.lock();
            if !force && !state.store.should_load(EntityKind::Webhooks, client_id) {
                debug!(client_id, "Webhooks served from cache");
                return Ok(Load::Cached(state.store.webhooks().clone()));
            }
            if state.in_flight.webhooks || state.store.lists().is_empty() {
                return Ok(Load::InProgress);
            }
            state.in_flight.webhooks = true;

            let token = CancellationToken::new();
            if let Some(previous) = state.cancel.webhooks.replace(token.clone()) {
                previous.cancel();
            }

            let list_ids: Vec<String> = state
                .store
                .lists()
                .iter()
                .map(|l| l.list_id.clone())
                .collect();
            (token, list_ids)
        };

        let result = self
            .fetch_with_retry("webhooks", &cancel, || async {
                let outcome = self
                    .api
                    .batch_fetch_webhooks(&list_ids, DEFAULT_BATCH_CONCURRENCY, &cancel)
                    .await?;
                for (list_id, error) in &outcome.errors {
                    warn!(%list_id, error = %error, "Failed to fetch webhooks for list");
                }
                Ok(outcome.results)
            })
            .await;

        let mut state = self.lock();
        state.in_flight.webhooks = false;
        match result {
            Ok(results) => {
                info!(
                    client_id,
                    lists = results.len(),
                    "Webhooks refreshed"
                );
                state.store.store_webhooks(results.clone(), client_id);
                Ok(Load::Fetched(results))
            }
            Err(e) => {
                if !e.is_cancelled() {
                    state.store.invalidate(EntityKind::Webhooks);
                }
                Err(e)
            }
        }
    }

    /// Startup sequence: lists must land first (webhook loading needs the
    /// list id set), then webhooks.
    pub async fn load_initial_data(
        &self,
        client_id: &str,
        force: bool,
    ) -> Result<InitialLoad, ApiError> {
        if client_id.is_empty() {
            return Err(ApiError::Validation(vec![
                "Client ID is required to load initial data".to_string(),
            ]));
        }

        {
            let mut state = self.lock();
            if state.in_flight.initial {
                return Ok(InitialLoad::InProgress);
            }
            state.in_flight.initial = true;
        }

        let result = self.load_initial_inner(client_id, force).await;
        self.lock().in_flight.initial = false;
        result
    }

    async fn load_initial_inner(
        &self,
        client_id: &str,
        force: bool,
    ) -> Result<InitialLoad, ApiError> {
        let lists = self.load_lists_if_needed(client_id, force).await?;
        let webhooks = self.load_webhooks_if_needed(client_id, force).await?;
        Ok(InitialLoad::Loaded {
            from_cache: lists.from_cache() && webhooks.from_cache(),
        })
    }

    /// Create a webhook optimistically: a provisional entry appears in the
    /// store before the network resolves, then is confirmed in place or
    /// removed. Ordering within the list is not preserved across the swap.
    pub async fn create_webhook(
        &self,
        list_id: &str,
        draft: NewWebhook,
    ) -> Result<Webhook, ApiError> {
        let violations = draft.validate();
        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }

        let provisional_id = self.lock().store.insert_provisional(list_id, &draft);
        let cancel = CancellationToken::new();

        match self.api.create_webhook(list_id, &draft, &cancel).await {
            Ok(webhook_id) => {
                let confirmed = Webhook {
                    webhook_id: webhook_id.clone(),
                    url: draft.url,
                    events: draft.events,
                    payload_format: Some(draft.payload_format),
                    status: None,
                    provisional: None,
                };
                let mut state = self.lock();
                state.store.confirm_provisional(list_id, provisional_id, &webhook_id);
                info!(list_id, webhook_id = %webhook_id, "Webhook created");
                Ok(confirmed)
            }
            Err(e) => {
                self.lock().store.remove_provisional(list_id, provisional_id);
                if !e.is_cancelled() {
                    warn!(list_id, error = %e, "Webhook creation failed - provisional entry removed");
                }
                Err(e)
            }
        }
    }

    pub async fn delete_webhook(&self, list_id: &str, webhook_id: &str) -> Result<(), ApiError> {
        let cancel = CancellationToken::new();
        self.api.delete_webhook(list_id, webhook_id, &cancel).await?;
        self.lock().store.remove_webhook(list_id, webhook_id);
        info!(list_id, webhook_id, "Webhook deleted");
        Ok(())
    }

    /// Replace a webhook via the facade's delete-then-create. On the
    /// partial-failure outcome the old entry is dropped locally and the
    /// collection marked stale, so the next access refetches upstream
    /// truth instead of showing a webhook that no longer exists.
    pub async fn update_webhook(
        &self,
        list_id: &str,
        webhook_id: &str,
        draft: NewWebhook,
    ) -> Result<Webhook, ApiError> {
        let cancel = CancellationToken::new();
        match self
            .api
            .update_webhook(list_id, webhook_id, &draft, &cancel)
            .await
        {
            Ok(new_id) => {
                let updated = Webhook {
                    webhook_id: new_id,
                    url: draft.url,
                    events: draft.events,
                    payload_format: Some(draft.payload_format),
                    status: None,
                    provisional: None,
                };
                let mut state = self.lock();
                state.store.remove_webhook(list_id, webhook_id);
                state.store.add_webhook(list_id, updated.clone());
                Ok(updated)
            }
            Err(e @ ApiError::UpdateLost { .. }) => {
                warn!(list_id, webhook_id, "Webhook update lost the original - marking cache stale");
                let mut state = self.lock();
                state.store.remove_webhook(list_id, webhook_id);
                state.store.invalidate(EntityKind::Webhooks);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Purge cached collections when the active client changes under the
    /// same credential.
    pub fn switch_client(&self, new_client_id: &str) {
        let mut state = self.lock();
        // Clients are account-scoped, so only the client-scoped collections
        // can tell whether the active client actually changed.
        let changed = [EntityKind::Lists, EntityKind::Webhooks].into_iter().any(|kind| {
            state.store.status(kind, new_client_id) == CacheStatus::ScopeMismatch
        });
        if changed {
            info!(new_client_id, "Active client changed - purging cached data");
            Self::cancel_and_clear(&mut state);
        }
    }

    /// React to a credential change: cancel whatever is in flight and purge
    /// every cached entity.
    pub fn handle_session_event(&self, event: SessionEvent) {
        info!(?event, "Session changed - purging cached data");
        let mut state = self.lock();
        Self::cancel_and_clear(&mut state);
    }

    /// Drain session events, purging cached state whenever the credential
    /// changes. Run on its own task alongside the application loop.
    pub async fn run_invalidation_listener(self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_session_event(event);
        }
    }

    fn cancel_and_clear(state: &mut CoordinatorState) {
        for token in [state.cancel.lists.take(), state.cancel.webhooks.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
        state.store.clear();
    }

    /// Run a fetch with exponential backoff on retryable failures. The
    /// backoff sleep races the cancellation token; a cancelled operation is
    /// returned as-is, never retried and never logged as a failure.
    async fn fetch_with_retry<T, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let mut retry_count = 0u32;
        loop {
            match fetch().await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    warn!(
                        what,
                        attempt = retry_count + 1,
                        error = %e,
                        "Load failed, retrying with backoff"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = tokio::time::sleep(backoff_delay(retry_count)) => {}
                    }
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_lists_with_stats(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<List>, ApiError> {
        let mut lists = self.api.get_client_lists(client_id, cancel).await?;

        let list_ids: Vec<String> = lists.iter().map(|l| l.list_id.clone()).collect();
        let mut stats = self
            .api
            .batch_fetch_stats(&list_ids, DEFAULT_BATCH_CONCURRENCY, cancel)
            .await?;

        for (list_id, error) in &stats.errors {
            warn!(%list_id, error = %error, "Failed to fetch list stats");
        }
        for list in &mut lists {
            if let Some(list_stats) = stats.results.remove(&list.list_id) {
                list.stats = Some(list_stats);
            }
        }
        Ok(lists)
    }
}

/// 2^n seconds: 1s before the first retry, 2s before the second.
fn backoff_delay(retry_count: u32) -> Duration {
    Duration::from_secs(1 << retry_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
    }

    #[test]
    fn test_load_accessors() {
        let fetched: Load<Vec<u8>> = Load::Fetched(vec![1]);
        assert!(!fetched.from_cache());
        assert_eq!(fetched.data(), Some(vec![1]));

        let cached: Load<Vec<u8>> = Load::Cached(vec![2]);
        assert!(cached.from_cache());

        let pending: Load<Vec<u8>> = Load::InProgress;
        assert_eq!(pending.data(), None);
    }
}
