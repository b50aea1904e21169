use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sinquerella_core::{
    CoreError, DriverRole, PositionReading, RoleSelection, SessionId, SessionScope, SessionStore,
};
use sinquerella_state_inmemory::InMemorySessionStore;

fn scope(store: &Arc<InMemorySessionStore>, session: &str) -> SessionScope {
    SessionScope::new(store.clone(), SessionId::from(session))
}

#[tokio::test]
async fn test_typed_artifacts_round_trip_through_store() -> Result<(), CoreError> {
    let store = Arc::new(InMemorySessionStore::new());
    let scope = scope(&store, "s1");

    assert!(scope.load::<RoleSelection>().await?.is_none());

    scope
        .save(&RoleSelection {
            role: DriverRole::B,
            selected_at: Utc::now(),
        })
        .await?;

    let loaded = scope.load::<RoleSelection>().await?.expect("role stored");
    assert_eq!(loaded.role, DriverRole::B);
    assert_eq!(store.keys(scope.session()).await?, vec!["driverRole".to_string()]);

    scope.remove::<RoleSelection>().await?;
    assert!(!scope.contains::<RoleSelection>().await?);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_entry_is_a_serialization_error() {
    let store = Arc::new(InMemorySessionStore::new());
    let scope = scope(&store, "s1");

    store
        .put(scope.session(), "driverRole", json!({"role": "C"}))
        .await
        .unwrap();

    match scope.load::<RoleSelection>().await {
        Err(CoreError::SerializationError(msg)) => assert!(msg.contains("driverRole")),
        other => panic!("Expected SerializationError, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_position_reading_expires() -> Result<(), CoreError> {
    let store = Arc::new(InMemorySessionStore::new());
    let scope = scope(&store, "s1");

    scope
        .save_with_ttl(
            &PositionReading {
                latitude: 18.4655,
                longitude: -66.1057,
                captured_at: Utc::now(),
            },
            300_000,
        )
        .await?;
    assert!(scope.contains::<PositionReading>().await?);

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert!(scope.load::<PositionReading>().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_clear_all_leaves_other_sessions() -> Result<(), CoreError> {
    let store = Arc::new(InMemorySessionStore::new());
    let first = scope(&store, "s1");
    let second = scope(&store, "s2");

    let role = RoleSelection {
        role: DriverRole::A,
        selected_at: Utc::now(),
    };
    first.save(&role).await?;
    second.save(&role).await?;

    first.clear_all().await?;
    assert!(!first.contains::<RoleSelection>().await?);
    assert!(second.contains::<RoleSelection>().await?);
    Ok(())
}
