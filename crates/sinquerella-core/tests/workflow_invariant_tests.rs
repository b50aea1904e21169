//! Rejections write nothing, re-submits are idempotent and changed answers
//! drop everything that depended on them.

use sinquerella_core::{
    AdvanceOutcome, ContactDraft, CoreError, DriverRole, EntryDecision, EvidenceDraft, FieldErrors,
    IdentityDraft, InfractionResponse, LocationFix, LocationSource, SessionStore, Stage, StageInput,
    ValidationCode, VehicleChoice,
};
use sinquerella_test_utils::data_generators::{
    contact_draft, evidence_draft, identity_draft, photos,
};
use sinquerella_test_utils::{init_test_tracing, FakeIdentityVerifier, WorkflowHarness};
use std::sync::Arc;

fn code(errors: &FieldErrors, field: &str) -> Option<ValidationCode> {
    errors.get(field).map(|error| error.code)
}

#[tokio::test]
async fn test_rejected_evidence_writes_nothing() -> Result<(), CoreError> {
    init_test_tracing();
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::EvidenceCapture).await?;
    let keys_before = harness.store.keys(&session).await?;

    let draft = EvidenceDraft {
        images: vec![],
        description: "corto".to_string(),
        location: None,
    };
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;

    let errors = outcome.errors().expect("rejected");
    assert_eq!(code(errors, "images"), Some(ValidationCode::ImageCount));
    assert_eq!(code(errors, "description"), Some(ValidationCode::DescriptionLength));
    assert!(errors.get("location").is_some());
    assert_eq!(outcome.stage(), Stage::EvidenceCapture);

    let state = harness.controller.state(&session).await?;
    assert!(state.evidence.is_none());
    assert_eq!(state.stage, Stage::EvidenceCapture);
    assert_eq!(harness.store.keys(&session).await?, keys_before);
    assert_eq!(harness.events.count("stage.rejected"), 1);
    Ok(())
}

#[tokio::test]
async fn test_evidence_boundaries() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::EvidenceCapture).await?;

    let mut draft = evidence_draft();
    draft.images = photos(5, 1024);
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;
    assert_eq!(code(outcome.errors().expect("rejected"), "images"), Some(ValidationCode::ImageCount));

    let mut draft = evidence_draft();
    draft.images = photos(4, 10 * 1024 * 1024);
    draft.description = "a".repeat(500);
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;
    assert!(outcome.is_advanced());
    Ok(())
}

#[tokio::test]
async fn test_identical_resubmission_keeps_downstream() -> Result<(), CoreError> {
    init_test_tracing();
    let harness = WorkflowHarness::new();
    let controller = &harness.controller;
    let session = harness.session_at(Stage::ContactCapture).await?;
    let before = controller.state(&session).await?;

    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(evidence_draft()))
        .await?;
    assert!(outcome.is_advanced());
    let outcome = harness
        .submit(&session, Stage::DriverRoleSelect, StageInput::Role { role: DriverRole::A })
        .await?;
    assert!(outcome.is_advanced());

    let after = controller.state(&session).await?;
    assert_eq!(after.evidence, before.evidence);
    assert_eq!(after.identity, before.identity);
    assert_eq!(after.vehicle, before.vehicle);
    assert_eq!(harness.events.count("artifacts.invalidated"), 0);

    // downstream stages are still reachable
    assert_eq!(
        controller.enter(&session, Stage::ContactCapture).await?,
        EntryDecision::Render {
            stage: Stage::ContactCapture
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_unchanged_credentials_skip_the_lookup() -> Result<(), CoreError> {
    let verifier = Arc::new(FakeIdentityVerifier::default());
    let harness = WorkflowHarness::builder()
        .with_identity_verifier(verifier.clone())
        .build();
    let session = harness.session_at(Stage::VehicleSelect).await?;
    assert_eq!(verifier.calls(), 1);

    let outcome = harness
        .submit(&session, Stage::DriverIdentify, StageInput::Identify(identity_draft()))
        .await?;
    assert_eq!(outcome.stage(), Stage::IdentityValidate);
    let outcome = harness
        .submit(&session, Stage::IdentityValidate, StageInput::ConfirmIdentity)
        .await?;
    assert_eq!(outcome.stage(), Stage::VehicleSelect);

    assert_eq!(verifier.calls(), 1);
    let state = harness.controller.state(&session).await?;
    assert!(state.identity.map_or(false, |i| i.validated));
    assert!(state.vehicle.is_some());
    Ok(())
}

#[tokio::test]
async fn test_changed_diagram_invalidates_later_artifacts() -> Result<(), CoreError> {
    init_test_tracing();
    let harness = WorkflowHarness::new();
    let controller = &harness.controller;
    let session = harness.session_at(Stage::VehicleSelect).await?;

    let outcome = harness
        .submit(
            &session,
            Stage::DiagramSelect,
            StageInput::Diagram {
                diagram_id: "I-1".to_string(),
            },
        )
        .await?;
    assert_eq!(outcome.stage(), Stage::EvidenceCapture);

    let state = controller.state(&session).await?;
    assert_eq!(state.diagram.as_ref().map(|d| d.diagram_id.as_str()), Some("I-1"));
    assert!(state.evidence.is_none());
    assert!(state.role.is_none());
    assert!(state.identity.is_none());
    assert!(state.vehicle_candidates.is_none());
    assert_eq!(harness.events.count("artifacts.invalidated"), 1);

    assert_eq!(controller.resume(&session).await?, Stage::EvidenceCapture);
    assert_eq!(
        controller.enter(&session, Stage::VehicleSelect).await?.stage(),
        Stage::EvidenceCapture
    );
    Ok(())
}

#[tokio::test]
async fn test_reselecting_same_diagram_keeps_infraction_answer() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::DriverRoleSelect).await?;

    harness
        .submit(
            &session,
            Stage::DiagramSelect,
            StageInput::Diagram {
                diagram_id: "IV-2".to_string(),
            },
        )
        .await?;

    let state = harness.controller.state(&session).await?;
    assert_eq!(
        state.diagram.and_then(|d| d.infraction_response),
        Some(InfractionResponse::VehicleA)
    );
    assert!(state.evidence.is_some());
    Ok(())
}

#[tokio::test]
async fn test_changed_infraction_answer_keeps_later_artifacts() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::VehicleSelect).await?;
    let before = harness.controller.state(&session).await?;

    let outcome = harness
        .submit(
            &session,
            Stage::InfractionAttribution,
            StageInput::Infraction {
                response: InfractionResponse::VehicleB,
            },
        )
        .await?;
    assert!(outcome.is_advanced());

    let state = harness.controller.state(&session).await?;
    assert_eq!(
        state.diagram.as_ref().and_then(|d| d.infraction_response),
        Some(InfractionResponse::VehicleB)
    );
    assert_eq!(state.evidence, before.evidence);
    assert_eq!(state.identity, before.identity);
    assert_eq!(state.vehicle_candidates, before.vehicle_candidates);
    assert_eq!(harness.events.count("artifacts.invalidated"), 0);
    assert_eq!(harness.controller.resume(&session).await?, Stage::VehicleSelect);
    Ok(())
}

#[tokio::test]
async fn test_new_role_requires_identification_again() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::VehicleSelect).await?;

    let outcome = harness
        .submit(&session, Stage::DriverRoleSelect, StageInput::Role { role: DriverRole::B })
        .await?;
    assert_eq!(outcome.stage(), Stage::DriverIdentify);

    let state = harness.controller.state(&session).await?;
    assert_eq!(state.role, Some(DriverRole::B));
    assert!(state.identity.is_none());
    assert_eq!(
        harness.controller.enter(&session, Stage::VehicleSelect).await?.stage(),
        Stage::DriverIdentify
    );
    Ok(())
}

#[tokio::test]
async fn test_identity_field_errors() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::DriverIdentify).await?;

    let draft = IdentityDraft {
        license_number: "".to_string(),
        birth_date: "01/01/1990".to_string(),
        ssn_last4: "12a4".to_string(),
    };
    let outcome = harness
        .submit(&session, Stage::DriverIdentify, StageInput::Identify(draft))
        .await?;
    let errors = outcome.errors().expect("rejected");
    assert_eq!(code(errors, "licenseNumber"), Some(ValidationCode::RequiredField));
    assert_eq!(code(errors, "birthDate"), Some(ValidationCode::DateFormat));
    assert_eq!(code(errors, "ssnLast4"), Some(ValidationCode::SSNFormat));
    assert!(harness.controller.state(&session).await?.identity.is_none());
    Ok(())
}

#[tokio::test]
async fn test_vehicle_must_be_picked() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::VehicleSelect).await?;

    for choice in [VehicleChoice::None, VehicleChoice::Registry("99".to_string())] {
        let outcome = harness
            .submit(&session, Stage::VehicleSelect, StageInput::Vehicle(choice))
            .await?;
        assert_eq!(
            code(outcome.errors().expect("rejected"), "vehicle"),
            Some(ValidationCode::VehicleRequired)
        );
    }
    assert!(harness.controller.state(&session).await?.vehicle.is_none());
    Ok(())
}

#[tokio::test]
async fn test_contact_requires_email_and_phone() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::ContactCapture).await?;

    let cases = [
        ContactDraft {
            email: "".to_string(),
            phone: "787-000-0000".to_string(),
        },
        ContactDraft {
            email: "b@example.com".to_string(),
            phone: "   ".to_string(),
        },
        ContactDraft {
            email: "not-an-email".to_string(),
            phone: "787-000-0000".to_string(),
        },
    ];
    for draft in cases {
        let outcome = harness
            .submit(&session, Stage::ContactCapture, StageInput::Contact(draft))
            .await?;
        assert!(matches!(outcome, AdvanceOutcome::Rejected { .. }));
    }

    assert_eq!(harness.notifier.attempts(), 0);
    assert!(harness.controller.state(&session).await?.contact.is_none());
    Ok(())
}

#[tokio::test]
async fn test_same_contact_is_not_invited_twice() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::HandoffSent).await?;
    assert_eq!(harness.notifier.sent().len(), 1);

    let outcome = harness
        .submit(&session, Stage::ContactCapture, StageInput::Contact(contact_draft()))
        .await?;
    assert_eq!(outcome.stage(), Stage::HandoffSent);
    assert_eq!(harness.notifier.sent().len(), 1);

    let changed = ContactDraft {
        email: "otro@example.com".to_string(),
        ..contact_draft()
    };
    harness
        .submit(&session, Stage::ContactCapture, StageInput::Contact(changed))
        .await?;
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].email, "otro@example.com");
    Ok(())
}

#[tokio::test]
async fn test_manual_location_is_accepted() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::EvidenceCapture).await?;

    let location = harness
        .location
        .manual("Calle Loíza 1500, San Juan")
        .expect("valid address");
    let draft = EvidenceDraft {
        location: Some(location),
        ..evidence_draft()
    };
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;
    assert!(outcome.is_advanced());

    let summary = harness.controller.summary(&session).await?;
    assert_eq!(summary.address.as_deref(), Some("Calle Loíza 1500, San Juan"));
    assert_eq!(summary.location_from_gps, Some(false));
    Ok(())
}

#[tokio::test]
async fn test_unusable_gps_fix_is_rejected_and_session_stays_readable() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::EvidenceCapture).await?;

    let draft = EvidenceDraft {
        location: Some(LocationFix::gps(f64::NAN, -66.10, "San Juan")),
        ..evidence_draft()
    };
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;
    assert_eq!(
        code(outcome.errors().expect("rejected"), "location"),
        Some(ValidationCode::LocationInvalid)
    );

    let state = harness.controller.state(&session).await?;
    assert!(state.evidence.is_none());
    assert_eq!(
        harness.controller.enter(&session, Stage::DiagramSelect).await?,
        EntryDecision::Render {
            stage: Stage::DiagramSelect
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_manual_fix_is_stored_without_coordinates() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::EvidenceCapture).await?;

    let draft = EvidenceDraft {
        location: Some(LocationFix {
            source: LocationSource::Manual,
            latitude: 18.45,
            longitude: -66.05,
            address: "Calle Loíza 1500, San Juan".to_string(),
        }),
        ..evidence_draft()
    };
    let outcome = harness
        .submit(&session, Stage::EvidenceCapture, StageInput::Evidence(draft))
        .await?;
    assert!(outcome.is_advanced());

    let state = harness.controller.state(&session).await?;
    let evidence = state.evidence.expect("evidence stored");
    assert_eq!(evidence.location, LocationFix::manual("Calle Loíza 1500, San Juan"));
    Ok(())
}
