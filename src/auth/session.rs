use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ApiError, CmApi};

/// Buffer size for the session event channel.
const EVENT_CHANNEL_BUFFER: usize = 16;

/// Cache scope key for account-level collections. Client-scoped collections
/// use the active client id instead.
pub const ACCOUNT_SCOPE_KEY: &str = "account";

/// Privilege level of an API key: account-wide, or restricted to a single
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Account,
    Client,
}

/// Emitted whenever credentials change in a way that makes cached entities
/// unusable. The coordinator consumes these and purges its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CredentialChanged,
    AuthFailed,
    LoggedOut,
}

#[derive(Debug, Default)]
struct SessionState {
    api_key: Option<String>,
    scope: Option<Scope>,
    client_id: Option<String>,
}

/// Per-session credential and scope container.
///
/// Constructed once per session and torn down on logout; nothing here is
/// global or persisted. Clone is cheap - state is shared behind an Arc, so
/// the HTTP adapter and the application can hold the same session.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    events: mpsc::Sender<SessionEvent>,
}

impl Session {
    /// Create a session and the receiving end of its invalidation channel.
    pub fn new() -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let session = Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            events: tx,
        };
        (session, rx)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(error = %e, "Session event dropped - no listener");
        }
    }

    /// Install an API key. Replacing an existing key with a different one
    /// emits `CredentialChanged`, which purges all cached entities; the
    /// resolved scope and active client are reset either way.
    pub fn set_api_key(&self, key: impl Into<String>) {
        let key = key.into();
        let changed = {
            let mut state = self.lock();
            let changed = state.api_key.as_deref().is_some_and(|k| k != key);
            if changed {
                state.client_id = None;
            }
            state.api_key = Some(key);
            state.scope = None;
            changed
        };
        if changed {
            info!("API key replaced - invalidating session data");
            self.emit(SessionEvent::CredentialChanged);
        }
    }

    /// Resolve and record the key's scope by probing the API.
    pub async fn validate(&self, api: &CmApi, cancel: &CancellationToken) -> Result<Scope, ApiError> {
        let scope = api.resolve_scope(cancel).await?;
        let mut state = self.lock();
        // The probe itself can 401 and wipe the key; only record a scope for
        // a credential that survived it.
        if state.api_key.is_some() {
            state.scope = Some(scope);
        }
        Ok(scope)
    }

    pub fn set_client_id(&self, client_id: impl Into<String>) {
        self.lock().client_id = Some(client_id.into());
    }

    /// Drop the credential after an upstream 401. Called by the HTTP
    /// adapter; emits `AuthFailed` so cached entities get purged too.
    pub fn clear_credentials(&self) {
        {
            let mut state = self.lock();
            state.api_key = None;
            state.scope = None;
        }
        self.emit(SessionEvent::AuthFailed);
    }

    pub fn logout(&self) {
        {
            let mut state = self.lock();
            *state = SessionState::default();
        }
        self.emit(SessionEvent::LoggedOut);
    }

    pub fn api_key(&self) -> Option<String> {
        self.lock().api_key.clone()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.lock().scope
    }

    pub fn client_id(&self) -> Option<String> {
        self.lock().client_id.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().api_key.is_some()
    }

    /// The cache scope key for the session as it stands: the fixed account
    /// key for account scope, the active client id for client scope, `None`
    /// until scope is resolved (or, for client scope, a client is chosen).
    pub fn scope_key(&self) -> Option<String> {
        let state = self.lock();
        match state.scope? {
            Scope::Account => Some(ACCOUNT_SCOPE_KEY.to_string()),
            Scope::Client => state.client_id.clone(),
        }
    }
}
