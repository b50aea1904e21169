//! In-memory implementation of the SessionStore interface
//!
//! Artifacts live in a process-local map keyed by session. Entries written
//! with a TTL stop being visible once they expire and are physically removed
//! by a periodic sweep when the store is created inside a Tokio runtime.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use sinquerella_core::{CoreError, SessionId, SessionStore};

/// How often expired entries are swept by default
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A value with optional expiration time
#[derive(Debug, Clone)]
struct ValueWithExpiry {
    value: Value,
    expires_at: Option<Instant>,
}

impl ValueWithExpiry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// session -> (key -> value with expiry)
type Sessions = HashMap<String, HashMap<String, ValueWithExpiry>>;

/// Process-local session store
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    state: Arc<RwLock<Sessions>>,
}

impl InMemorySessionStore {
    /// Create a store that sweeps expired entries every minute
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a store with a custom sweep period
    ///
    /// Outside a Tokio runtime no sweep task is started; expired entries are
    /// still hidden from reads and can be dropped with [`Self::purge_expired`].
    pub fn with_sweep_interval(period: Duration) -> Self {
        info!("Creating new InMemorySessionStore");
        let state = Arc::new(RwLock::new(HashMap::new()));

        match Handle::try_current() {
            Ok(handle) => Self::start_sweep_task(&handle, Arc::downgrade(&state), period),
            Err(_) => debug!("No Tokio runtime available, expired entries will not be swept"),
        }

        Self { state }
    }

    /// Remove expired entries in the background until the store is dropped
    fn start_sweep_task(handle: &Handle, state: Weak<RwLock<Sessions>>, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(live) = state.upgrade() else {
                    debug!("Session store dropped, stopping sweep task");
                    break;
                };
                let removed = sweep(&live).await;
                if removed > 0 {
                    debug!(removed, "Swept expired session entries");
                }
            }
        });
    }

    /// Drop every expired entry now, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        sweep(&self.state).await
    }

    /// Counts of sessions and entries currently held
    pub async fn get_metrics(&self) -> HashMap<String, i64> {
        let state = self.state.read().await;
        let now = Instant::now();

        let mut total_keys = 0i64;
        let mut expired_keys = 0i64;
        for entries in state.values() {
            for entry in entries.values() {
                total_keys += 1;
                if !entry.is_live(now) {
                    expired_keys += 1;
                }
            }
        }

        let mut metrics = HashMap::new();
        metrics.insert("sessions".to_string(), state.len() as i64);
        metrics.insert("total_keys".to_string(), total_keys);
        metrics.insert("active_keys".to_string(), total_keys - expired_keys);
        metrics.insert("expired_keys".to_string(), expired_keys);
        metrics
    }

    async fn insert(&self, session: &SessionId, key: &str, value: Value, expires_at: Option<Instant>) {
        let mut state = self.state.write().await;
        state
            .entry(session.as_str().to_string())
            .or_default()
            .insert(key.to_string(), ValueWithExpiry { value, expires_at });
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn sweep(state: &RwLock<Sessions>) -> usize {
    let now = Instant::now();
    let mut state = state.write().await;
    let mut removed = 0;

    for entries in state.values_mut() {
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        removed += before - entries.len();
    }
    state.retain(|_, entries| !entries.is_empty());

    removed
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, CoreError> {
        let state = self.state.read().await;
        let now = Instant::now();

        Ok(state
            .get(session.as_str())
            .and_then(|entries| entries.get(key))
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, session: &SessionId, key: &str, value: Value) -> Result<(), CoreError> {
        self.insert(session, key, value, None).await;
        debug!(session = %session, key, "Stored session entry");
        Ok(())
    }

    async fn put_with_ttl(
        &self,
        session: &SessionId,
        key: &str,
        value: Value,
        ttl_ms: u64,
    ) -> Result<(), CoreError> {
        let expires_at = Instant::now() + Duration::from_millis(ttl_ms);
        self.insert(session, key, value, Some(expires_at)).await;
        debug!(session = %session, key, ttl_ms, "Stored session entry with TTL");
        Ok(())
    }

    async fn clear(&self, session: &SessionId, key: &str) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        if let Some(entries) = state.get_mut(session.as_str()) {
            if entries.remove(key).is_some() {
                debug!(session = %session, key, "Cleared session entry");
            }
            if entries.is_empty() {
                state.remove(session.as_str());
            }
        }
        Ok(())
    }

    async fn keys(&self, session: &SessionId) -> Result<Vec<String>, CoreError> {
        let state = self.state.read().await;
        let now = Instant::now();

        let mut keys: Vec<String> = state
            .get(session.as_str())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, entry)| entry.is_live(now))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn clear_session(&self, session: &SessionId) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        if let Some(entries) = state.remove(session.as_str()) {
            info!(session = %session, entries = entries.len(), "Cleared session");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}
