//! Typed facade over the Campaign Monitor REST surface.
//!
//! One operation per upstream resource, layered on the transport adapter.
//! Parsing into typed models at this boundary doubles as the structural
//! validation of upstream payloads: a response that does not deserialize is
//! a `DataShape` error, never silently accepted.

use std::collections::HashMap;

use futures::future::join_all;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::Scope;
use crate::models::{Client, ClientDetails, List, ListStats, NewWebhook, Webhook};

use super::{ApiError, HttpClient};

/// Default number of concurrently outstanding requests in a batch wave.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Per-list results and failures accumulated by a batch fetch, keyed by
/// list id.
#[derive(Debug, Default)]
pub struct BatchOutcome<T> {
    pub results: HashMap<String, T>,
    pub errors: HashMap<String, ApiError>,
}

/// API facade for Campaign Monitor. Clone is cheap.
#[derive(Clone)]
pub struct CmApi {
    http: HttpClient,
}

impl CmApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let value = self.http.send(Method::GET, path, None, cancel).await?;
        serde_json::from_value(value).map_err(|e| ApiError::DataShape(format!("{path}: {e}")))
    }

    /// All clients visible to an account-level key (`clients.json`).
    pub async fn get_clients(&self, cancel: &CancellationToken) -> Result<Vec<Client>, ApiError> {
        self.get("clients.json", cancel).await
    }

    /// Details for one client, used to recover the client record when the
    /// key is client-scoped and `clients.json` is off limits.
    pub async fn get_client_details(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClientDetails, ApiError> {
        self.get(&format!("clients/{client_id}.json"), cancel).await
    }

    /// Subscriber lists owned by a client.
    pub async fn get_client_lists(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<List>, ApiError> {
        self.get(&format!("clients/{client_id}/lists.json"), cancel).await
    }

    pub async fn get_list_stats(
        &self,
        list_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ListStats, ApiError> {
        self.get(&format!("lists/{list_id}/stats.json"), cancel).await
    }

    pub async fn get_list_webhooks(
        &self,
        list_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Webhook>, ApiError> {
        self.get(&format!("lists/{list_id}/webhooks.json"), cancel).await
    }

    /// Create a webhook, returning the server-assigned webhook id.
    ///
    /// Validation runs before anything touches the network; every violated
    /// rule is reported, not just the first.
    pub async fn create_webhook(
        &self,
        list_id: &str,
        webhook: &NewWebhook,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let violations = webhook.validate();
        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }

        let body = serde_json::to_value(webhook)
            .map_err(|e| ApiError::DataShape(format!("webhook payload: {e}")))?;
        let value = self
            .http
            .send(
                Method::POST,
                &format!("lists/{list_id}/webhooks.json"),
                Some(&body),
                cancel,
            )
            .await?;

        // Upstream answers with the bare id as a JSON string.
        serde_json::from_value(value)
            .map_err(|e| ApiError::DataShape(format!("webhook id: {e}")))
    }

    pub async fn delete_webhook(
        &self,
        list_id: &str,
        webhook_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.http
            .send(
                Method::DELETE,
                &format!("lists/{list_id}/webhooks/{webhook_id}.json"),
                None,
                cancel,
            )
            .await?;
        Ok(())
    }

    /// Replace a webhook by deleting the old one and creating the new one.
    ///
    /// NOT atomic: upstream has no rename, so a create failure after a
    /// successful delete leaves the webhook gone. That outcome is surfaced
    /// as [`ApiError::UpdateLost`] so callers can prompt for a re-attempt
    /// instead of assuming nothing happened.
    pub async fn update_webhook(
        &self,
        list_id: &str,
        webhook_id: &str,
        webhook: &NewWebhook,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        // Validate up front so a doomed payload never costs the delete.
        let violations = webhook.validate();
        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }

        self.delete_webhook(list_id, webhook_id, cancel).await?;

        match self.create_webhook(list_id, webhook, cancel).await {
            Ok(new_id) => Ok(new_id),
            Err(e) => Err(ApiError::UpdateLost { source: Box::new(e) }),
        }
    }

    /// Infer the key's scope from an account-only billing probe.
    ///
    /// Success means account scope. A 401/403/404 bounce is read as a
    /// client-restricted key - an ambiguous inference, since a 403 can also
    /// mean an account key that simply lacks billing permission; upstream
    /// offers no stronger signal, so the heuristic stands as-is.
    pub async fn resolve_scope(&self, cancel: &CancellationToken) -> Result<Scope, ApiError> {
        match self
            .http
            .send(Method::GET, "billingdetails.json", None, cancel)
            .await
        {
            Ok(_) => Ok(Scope::Account),
            Err(ApiError::Auth) | Err(ApiError::NotAllowed(_)) => Ok(Scope::Client),
            Err(ApiError::Upstream { status: 404, .. }) => Ok(Scope::Client),
            Err(e) => Err(e),
        }
    }

    /// Fetch webhooks for many lists in bounded waves.
    ///
    /// Ids are split into consecutive chunks of `limit`; each chunk runs
    /// fully in parallel and the next one starts only once it completes.
    /// Cancellation is checked before each wave: requests already issued
    /// within the current wave run to completion, but the batch then aborts
    /// and everything accumulated is discarded. Individual requests
    /// therefore get a detached token, never the batch's.
    pub async fn batch_fetch_webhooks(
        &self,
        list_ids: &[String],
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome<Vec<Webhook>>, ApiError> {
        let limit = limit.max(1);
        let mut outcome = BatchOutcome::default();

        for chunk in list_ids.chunks(limit) {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let futures: Vec<_> = chunk
                .iter()
                .map(|list_id| {
                    let api = self.clone();
                    let list_id = list_id.clone();
                    async move {
                        let result = api
                            .get_list_webhooks(&list_id, &CancellationToken::new())
                            .await;
                        (list_id, result)
                    }
                })
                .collect();

            for (list_id, result) in join_all(futures).await {
                match result {
                    Ok(webhooks) => {
                        debug!(list_id = %list_id, count = webhooks.len(), "Webhooks fetched");
                        outcome.results.insert(list_id, webhooks);
                    }
                    Err(e) => {
                        outcome.errors.insert(list_id, e);
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        Ok(outcome)
    }

    /// Fetch subscriber stats for many lists, same wave discipline as
    /// [`Self::batch_fetch_webhooks`].
    pub async fn batch_fetch_stats(
        &self,
        list_ids: &[String],
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome<ListStats>, ApiError> {
        let limit = limit.max(1);
        let mut outcome = BatchOutcome::default();

        for chunk in list_ids.chunks(limit) {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let futures: Vec<_> = chunk
                .iter()
                .map(|list_id| {
                    let api = self.clone();
                    let list_id = list_id.clone();
                    async move {
                        let result = api.get_list_stats(&list_id, &CancellationToken::new()).await;
                        (list_id, result)
                    }
                })
                .collect();

            for (list_id, result) in join_all(futures).await {
                match result {
                    Ok(stats) => {
                        outcome.results.insert(list_id, stats);
                    }
                    Err(e) => {
                        outcome.errors.insert(list_id, e);
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        Ok(outcome)
    }
}
