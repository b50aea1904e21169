//! Mock implementations of the workflow collaborator interfaces.
//!
//! Use these when a test needs to assert on exact calls; the fakes in
//! [`crate::implementations`] are simpler for whole-session tests.

use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;

use sinquerella_core::{
    CoreError, DomainEvent, GeoPoint, IdentityCredentials, IdentityRecord, InvitationPayload,
    ReportDocument, SessionId, Vehicle, WorkflowState,
};

use crate::data_generators::demo_identity_record;

mock! {
    pub IdentityVerifier {}

    #[async_trait]
    impl sinquerella_core::IdentityVerifier for IdentityVerifier {
        async fn verify(&self, credentials: &IdentityCredentials) -> Result<IdentityRecord, CoreError>;
    }
}

mock! {
    pub VehicleRegistry {}

    #[async_trait]
    impl sinquerella_core::VehicleRegistry for VehicleRegistry {
        async fn vehicles_for(&self, license_number: &str) -> Result<Vec<Vehicle>, CoreError>;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl sinquerella_core::Notifier for Notifier {
        async fn dispatch(&self, email: &str, phone: &str, payload: &InvitationPayload) -> Result<(), CoreError>;
    }
}

mock! {
    pub ReportRenderer {}

    #[async_trait]
    impl sinquerella_core::ReportRenderer for ReportRenderer {
        async fn render(&self, state: &WorkflowState) -> Result<ReportDocument, CoreError>;
    }
}

mock! {
    pub PositionProvider {}

    #[async_trait]
    impl sinquerella_core::PositionProvider for PositionProvider {
        async fn current_position(&self) -> Result<GeoPoint, CoreError>;
    }
}

mock! {
    pub ReverseGeocoder {}

    #[async_trait]
    impl sinquerella_core::ReverseGeocoder for ReverseGeocoder {
        async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<String, CoreError>;
    }
}

mock! {
    pub EventHandler {}

    #[async_trait]
    impl sinquerella_core::WorkflowEventHandler for EventHandler {
        async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
    }
}

mock! {
    pub SessionStore {}

    #[async_trait]
    impl sinquerella_core::SessionStore for SessionStore {
        async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Value>, CoreError>;
        async fn put(&self, session: &SessionId, key: &str, value: Value) -> Result<(), CoreError>;
        async fn put_with_ttl(&self, session: &SessionId, key: &str, value: Value, ttl_ms: u64) -> Result<(), CoreError>;
        async fn clear(&self, session: &SessionId, key: &str) -> Result<(), CoreError>;
        async fn keys(&self, session: &SessionId) -> Result<Vec<String>, CoreError>;
        async fn clear_session(&self, session: &SessionId) -> Result<(), CoreError>;
        async fn health_check(&self) -> Result<bool, CoreError>;
    }
}

/// Creates a mock identity lookup that accepts any credentials.
pub fn create_mock_identity_verifier() -> MockIdentityVerifier {
    let mut mock = MockIdentityVerifier::new();
    mock.expect_verify().returning(|_| Ok(demo_identity_record()));
    mock
}

/// Creates a mock notifier that delivers every invitation.
pub fn create_mock_notifier() -> MockNotifier {
    let mut mock = MockNotifier::new();
    mock.expect_dispatch().returning(|_, _, _| Ok(()));
    mock
}

/// Creates a mock event handler that accepts every event.
pub fn create_mock_event_handler() -> MockEventHandler {
    let mut mock = MockEventHandler::new();
    mock.expect_handle_event().returning(|_| Ok(()));
    mock
}
