//! Session store for workflow artifacts
//!
//! Artifacts handed from one stage to the next live here, scoped by session.
//! An absent key is a normal state and is reported as `None`; a stored JSON
//! `null` or empty object comes back as `Some(..)`.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::domain::artifacts::Artifact;
use crate::types::SessionId;
use crate::CoreError;

/// Session-scoped key/value store
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the value stored under `key`
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, CoreError>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, session: &SessionId, key: &str, value: Value) -> Result<(), CoreError>;

    /// Store a value that stops being visible after `ttl_ms`
    async fn put_with_ttl(
        &self,
        session: &SessionId,
        key: &str,
        value: Value,
        _ttl_ms: u64,
    ) -> Result<(), CoreError> {
        tracing::debug!("Using default put_with_ttl implementation (ignores TTL)");
        self.put(session, key, value).await
    }

    /// Remove the value under `key`; removing an absent key is not an error
    async fn clear(&self, session: &SessionId, key: &str) -> Result<(), CoreError>;

    /// List the keys currently present for a session
    async fn keys(&self, session: &SessionId) -> Result<Vec<String>, CoreError>;

    /// Drop everything stored for a session
    async fn clear_session(&self, session: &SessionId) -> Result<(), CoreError> {
        for key in self.keys(session).await? {
            self.clear(session, &key).await?;
        }
        Ok(())
    }

    /// Health check for the store
    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}

/// Typed view of one session in a [`SessionStore`]
#[derive(Clone)]
pub struct SessionScope {
    store: Arc<dyn SessionStore>,
    session: SessionId,
}

impl Debug for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionScope")
            .field("session", &self.session)
            .finish()
    }
}

impl SessionScope {
    /// Bind a store to a session
    pub fn new(store: Arc<dyn SessionStore>, session: SessionId) -> Self {
        Self { store, session }
    }

    /// The session this scope is bound to
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Load an artifact; `None` when it was never written or was cleared
    pub async fn load<A: Artifact>(&self) -> Result<Option<A>, CoreError> {
        match self.store.get(&self.session, A::KEY).await? {
            Some(value) => {
                let artifact = serde_json::from_value(value).map_err(|e| {
                    CoreError::SerializationError(format!("Corrupt '{}' entry: {}", A::KEY, e))
                })?;
                Ok(Some(artifact))
            }
            None => Ok(None),
        }
    }

    /// Whether an artifact is present
    pub async fn contains<A: Artifact>(&self) -> Result<bool, CoreError> {
        Ok(self.store.get(&self.session, A::KEY).await?.is_some())
    }

    /// Write an artifact, replacing the previous one
    pub async fn save<A: Artifact>(&self, artifact: &A) -> Result<(), CoreError> {
        let value = serde_json::to_value(artifact)?;
        self.store.put(&self.session, A::KEY, value).await
    }

    /// Write an artifact that expires after `ttl_ms`
    pub async fn save_with_ttl<A: Artifact>(&self, artifact: &A, ttl_ms: u64) -> Result<(), CoreError> {
        let value = serde_json::to_value(artifact)?;
        self.store
            .put_with_ttl(&self.session, A::KEY, value, ttl_ms)
            .await
    }

    /// Remove an artifact
    pub async fn remove<A: Artifact>(&self) -> Result<(), CoreError> {
        self.store.clear(&self.session, A::KEY).await
    }

    /// Remove a raw key
    pub async fn remove_key(&self, key: &str) -> Result<(), CoreError> {
        self.store.clear(&self.session, key).await
    }

    /// Drop the whole session
    pub async fn clear_all(&self) -> Result<(), CoreError> {
        self.store.clear_session(&self.session).await
    }
}

/// Factory function type for creating session stores
pub type SessionStoreFactory =
    Box<dyn Fn(&str) -> Result<Arc<dyn SessionStore>, CoreError> + Send + Sync>;
