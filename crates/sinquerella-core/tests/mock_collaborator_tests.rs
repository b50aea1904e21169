//! Exact collaborator calls, checked with mocks.

use std::sync::Arc;

use serde_json::Value;
use sinquerella_core::{
    CoreError, SessionId, Stage, StageInput, TracingEventHandler, WorkflowConfig, WorkflowController,
};
use sinquerella_state_inmemory::InMemorySessionStore;
use sinquerella_test_utils::data_generators::{
    demo_identity_record, identity_draft, COUNTERPARTY_EMAIL, COUNTERPARTY_PHONE,
};
use sinquerella_test_utils::mocks::{
    create_mock_identity_verifier, create_mock_notifier, MockEventHandler, MockIdentityVerifier,
    MockNotifier, MockSessionStore,
};
use sinquerella_test_utils::{init_test_tracing, FakeReportRenderer, WorkflowHarness};

fn controller_with(
    verifier: MockIdentityVerifier,
    notifier: MockNotifier,
) -> WorkflowController {
    WorkflowController::new(
        Arc::new(InMemorySessionStore::new()),
        WorkflowConfig::default(),
        Arc::new(verifier),
        Arc::new(notifier),
        Arc::new(FakeReportRenderer::new()),
        Arc::new(TracingEventHandler),
    )
}

#[tokio::test]
async fn test_invitation_goes_to_the_captured_contact() -> Result<(), CoreError> {
    init_test_tracing();
    let mut notifier = MockNotifier::new();
    notifier
        .expect_dispatch()
        .withf(|email, phone, payload| {
            email == COUNTERPARTY_EMAIL
                && phone == COUNTERPARTY_PHONE
                && payload.diagram_id == "IV-2"
                && payload.accident_address == "Calle Fortaleza, San Juan, PR"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = WorkflowHarness::new();
    let controller = WorkflowController::new(
        harness.session_store(),
        WorkflowConfig::default(),
        Arc::new(create_mock_identity_verifier()),
        Arc::new(notifier),
        harness.renderer.clone(),
        harness.events.clone(),
    );
    let harness = WorkflowHarness { controller, ..harness };

    let session = harness.session_at(Stage::HandoffSent).await?;
    assert_eq!(harness.controller.resume(&session).await?, Stage::HandoffSent);
    Ok(())
}

#[tokio::test]
async fn test_identity_lookup_receives_parsed_credentials() -> Result<(), CoreError> {
    let mut verifier = MockIdentityVerifier::new();
    verifier
        .expect_verify()
        .withf(|credentials| {
            credentials.license_number == "123456789"
                && credentials.birth_date.to_string() == "1990-01-01"
                && credentials.ssn_last4 == "1234"
        })
        .times(1)
        .returning(|_| Ok(demo_identity_record()));

    let controller = controller_with(verifier, create_mock_notifier());
    let harness = WorkflowHarness {
        controller,
        ..WorkflowHarness::new()
    };
    let session = harness.session_at(Stage::DriverIdentify).await?;

    let mut draft = identity_draft();
    draft.license_number = "  123456789 ".to_string();
    let outcome = harness
        .submit(&session, Stage::DriverIdentify, StageInput::Identify(draft))
        .await?;
    assert_eq!(outcome.stage(), Stage::IdentityValidate);
    Ok(())
}

#[tokio::test]
async fn test_invalid_form_never_reaches_cesco() -> Result<(), CoreError> {
    let mut verifier = MockIdentityVerifier::new();
    verifier.expect_verify().never();

    let controller = controller_with(verifier, create_mock_notifier());
    let harness = WorkflowHarness {
        controller,
        ..WorkflowHarness::new()
    };
    let session = harness.session_at(Stage::DriverIdentify).await?;

    let mut draft = identity_draft();
    draft.ssn_last4 = "123".to_string();
    let outcome = harness
        .submit(&session, Stage::DriverIdentify, StageInput::Identify(draft))
        .await?;
    let banner = outcome
        .errors()
        .and_then(|errors| errors.get("ssnLast4"))
        .expect("ssn error");
    assert_eq!(banner.message, "Debe ingresar exactamente 4 dígitos del seguro social");
    Ok(())
}

#[tokio::test]
async fn test_event_handler_failure_propagates() {
    let mut handler = MockEventHandler::new();
    handler
        .expect_handle_event()
        .returning(|_| Err(CoreError::Other("event bus down".to_string())));

    let controller = WorkflowController::new(
        Arc::new(InMemorySessionStore::new()),
        WorkflowConfig::default(),
        Arc::new(create_mock_identity_verifier()),
        Arc::new(create_mock_notifier()),
        Arc::new(FakeReportRenderer::new()),
        Arc::new(handler),
    );

    match controller.start().await {
        Err(CoreError::Other(msg)) => assert_eq!(msg, "event bus down"),
        other => panic!("Expected the handler error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_store_failure_surfaces_as_error() {
    let mut store = MockSessionStore::new();
    store
        .expect_get()
        .returning(|_, _| Err(CoreError::SessionStoreError("connection reset".to_string())));

    let controller = WorkflowController::new(
        Arc::new(store),
        WorkflowConfig::default(),
        Arc::new(create_mock_identity_verifier()),
        Arc::new(create_mock_notifier()),
        Arc::new(FakeReportRenderer::new()),
        Arc::new(TracingEventHandler),
    );

    let result = controller
        .enter(&SessionId::from("s1"), Stage::EvidenceCapture)
        .await;
    assert!(matches!(result, Err(CoreError::SessionStoreError(_))));
}

#[tokio::test]
async fn test_corrupt_store_entry_is_reported() {
    let mut store = MockSessionStore::new();
    store.expect_get().returning(|_, key| {
        if key == "diagram" {
            Ok(Some(Value::String("not a diagram".to_string())))
        } else {
            Ok(None)
        }
    });

    let controller = WorkflowController::new(
        Arc::new(store),
        WorkflowConfig::default(),
        Arc::new(create_mock_identity_verifier()),
        Arc::new(create_mock_notifier()),
        Arc::new(FakeReportRenderer::new()),
        Arc::new(TracingEventHandler),
    );

    match controller.state(&SessionId::from("s1")).await {
        Err(CoreError::SerializationError(msg)) => assert!(msg.contains("diagram")),
        other => panic!("Expected SerializationError, got {:?}", other),
    }
}
