//! In-memory session store for the Sin Querella workflow
//!
//! This crate provides a process-local implementation of the `SessionStore`
//! interface defined in sinquerella-core. It backs development runs, the
//! scenario runner and the test suites; nothing survives a restart.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use sinquerella_core::{create_session_store_factory, CoreError, SessionStore, SessionStoreFactory};

pub mod session_store;
pub use session_store::{InMemorySessionStore, DEFAULT_SWEEP_INTERVAL};

/// Provider for in-memory session stores
///
/// Every store handed out by one provider shares the same backing map, so
/// components wired from the same provider see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStoreProvider {
    store: InMemorySessionStore,
}

impl InMemoryStateStoreProvider {
    /// Create a new provider with a fresh store
    pub fn new() -> Self {
        Self {
            store: InMemorySessionStore::new(),
        }
    }

    /// The shared session store
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::new(self.store.clone())
    }

    /// The concrete store, for metrics and purging
    pub fn inner(&self) -> &InMemorySessionStore {
        &self.store
    }
}

/// Store factory that understands `memory://` URLs
pub fn in_memory_store_factory() -> SessionStoreFactory {
    Box::new(create_session_store_factory(InMemorySessionStore::new))
}

/// Build a session store from a configured URL
pub fn session_store_from_url(url: &str) -> Result<Arc<dyn SessionStore>, CoreError> {
    in_memory_store_factory()(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sinquerella_core::SessionId;

    #[tokio::test]
    async fn test_provider_shares_one_store() {
        let provider = InMemoryStateStoreProvider::new();
        let writer = provider.session_store();
        let reader = provider.session_store();
        let session = SessionId::from("s1");

        writer.put(&session, "contact", json!("b@example.com")).await.unwrap();
        assert_eq!(
            reader.get(&session, "contact").await.unwrap(),
            Some(json!("b@example.com"))
        );
        assert_eq!(provider.inner().get_metrics().await.get("total_keys"), Some(&1));
    }

    #[tokio::test]
    async fn test_store_from_url() {
        let store = session_store_from_url("memory://local").unwrap();
        assert!(store.health_check().await.unwrap());

        match session_store_from_url("postgres://localhost/sinquerella") {
            Err(CoreError::ConfigurationError(msg)) => assert!(msg.contains("postgres://")),
            Err(other) => panic!("Expected ConfigurationError, got {:?}", other),
            Ok(_) => panic!("Expected ConfigurationError"),
        }
    }
}
