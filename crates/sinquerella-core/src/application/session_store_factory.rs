//! Factory for creating session stores
//!
//! Picks a session store implementation from the configured store URL.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::session_store::SessionStore;
use crate::CoreError;

/// Create a session store factory function
///
/// # Arguments
///
/// * `in_memory_factory` - Function to create an in-memory session store
///
/// # Returns
///
/// A function that takes a store URL and returns a session store. Only
/// `memory://` URLs are supported.
pub fn create_session_store_factory<F, S>(
    in_memory_factory: F,
) -> impl Fn(&str) -> Result<Arc<dyn SessionStore>, CoreError> + Send + Sync
where
    F: Fn() -> S + Send + Sync + 'static,
    S: SessionStore + 'static,
{
    move |url: &str| -> Result<Arc<dyn SessionStore>, CoreError> {
        if url.starts_with("memory://") {
            info!(url = %url, "Creating in-memory session store");
            Ok(Arc::new(in_memory_factory()))
        } else {
            error!("Unsupported session store URL: {}", url);
            Err(CoreError::ConfigurationError(format!(
                "Unsupported session store URL: {}",
                url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NoOpSessionStore;

    #[async_trait]
    impl SessionStore for NoOpSessionStore {
        async fn get(&self, _session: &SessionId, _key: &str) -> Result<Option<Value>, CoreError> {
            Ok(None)
        }

        async fn put(&self, _session: &SessionId, _key: &str, _value: Value) -> Result<(), CoreError> {
            Ok(())
        }

        async fn clear(&self, _session: &SessionId, _key: &str) -> Result<(), CoreError> {
            Ok(())
        }

        async fn keys(&self, _session: &SessionId) -> Result<Vec<String>, CoreError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_memory_url() {
        let factory = create_session_store_factory(|| NoOpSessionStore);
        assert!(factory("memory://local").is_ok());
    }

    #[test]
    fn test_unsupported_url() {
        let factory = create_session_store_factory(|| NoOpSessionStore);
        match factory("redis://localhost:6379") {
            Err(CoreError::ConfigurationError(msg)) => {
                assert!(msg.contains("redis://localhost:6379"));
            }
            Err(other) => panic!("Expected ConfigurationError, got {:?}", other),
            Ok(_) => panic!("Expected ConfigurationError"),
        }
    }
}
