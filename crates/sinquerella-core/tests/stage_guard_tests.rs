//! Stage order, redirects and the two branches.

use sinquerella_core::{
    AdvanceOutcome, CoreError, EntryDecision, InfractionResponse, Requirement, Stage, StageInput,
    VehicleChoice,
};
use sinquerella_test_utils::data_generators::{contact_draft, evidence_draft};
use sinquerella_test_utils::{init_test_tracing, WorkflowHarness};

const ESCALATION_REMEDY: &str = "Debes llamar para hacer una querella: Policía de Puerto Rico: 787.343.2020";

#[tokio::test]
async fn test_every_stage_renders_once_its_prerequisites_exist() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();

    for stage in Stage::ALL {
        let session = harness.session_at(stage).await?;
        assert_eq!(
            harness.controller.enter(&session, stage).await?,
            EntryDecision::Render { stage },
            "entering {}",
            stage
        );
        assert_eq!(harness.controller.state(&session).await?.stage, stage);
    }
    Ok(())
}

#[tokio::test]
async fn test_fresh_session_redirects_every_stage_to_diagram() -> Result<(), CoreError> {
    init_test_tracing();
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    for stage in Stage::ALL {
        let decision = harness.controller.enter(&session, stage).await?;
        if stage == Stage::DiagramSelect {
            assert_eq!(decision, EntryDecision::Render { stage });
        } else {
            assert_eq!(decision.stage(), Stage::DiagramSelect, "entering {}", stage);
            match decision {
                EntryDecision::Redirect { missing, .. } => {
                    assert_eq!(missing.first(), Some(&Requirement::DiagramSelected))
                }
                other => panic!("Expected a redirect for {}, got {:?}", stage, other),
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_redirect_goes_to_earliest_missing_stage() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.session_at(Stage::DriverRoleSelect).await?;

    let decision = harness.controller.enter(&session, Stage::ContactCapture).await?;
    match decision {
        EntryDecision::Redirect { requested, to, missing } => {
            assert_eq!(requested, Stage::ContactCapture);
            assert_eq!(to, Stage::DriverRoleSelect);
            assert_eq!(missing.first(), Some(&Requirement::RoleSelected));
        }
        other => panic!("Expected a redirect, got {:?}", other),
    }

    // stages already satisfied stay reachable
    assert_eq!(
        harness.controller.enter(&session, Stage::EvidenceCapture).await?,
        EntryDecision::Render {
            stage: Stage::EvidenceCapture
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_input_to_unreachable_stage_is_redirected_and_not_stored() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    let outcome = harness
        .controller
        .advance(&session, Stage::EvidenceCapture, StageInput::Evidence(evidence_draft()))
        .await?;
    assert!(matches!(
        outcome,
        AdvanceOutcome::Redirected {
            requested: Stage::EvidenceCapture,
            to: Stage::DiagramSelect,
            ..
        }
    ));
    assert!(harness.controller.state(&session).await?.evidence.is_none());
    Ok(())
}

#[tokio::test]
async fn test_branch_diagram_opens_infraction_attribution() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    let outcome = harness
        .submit(
            &session,
            Stage::DiagramSelect,
            StageInput::Diagram {
                diagram_id: "IV-2".to_string(),
            },
        )
        .await?;
    assert_eq!(outcome.stage(), Stage::InfractionAttribution);

    // evidence waits for the infraction answer
    let decision = harness.controller.enter(&session, Stage::EvidenceCapture).await?;
    assert_eq!(decision.stage(), Stage::InfractionAttribution);

    let outcome = harness
        .submit(
            &session,
            Stage::InfractionAttribution,
            StageInput::Infraction {
                response: InfractionResponse::None,
            },
        )
        .await?;
    assert_eq!(outcome.stage(), Stage::EvidenceCapture);
    Ok(())
}

#[tokio::test]
async fn test_other_diagrams_skip_infraction_attribution() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    for diagram_id in ["I-1", "IV-1", "VI-6"] {
        let outcome = harness
            .submit(
                &session,
                Stage::DiagramSelect,
                StageInput::Diagram {
                    diagram_id: diagram_id.to_string(),
                },
            )
            .await?;
        assert_eq!(outcome.stage(), Stage::EvidenceCapture, "diagram {}", diagram_id);
    }

    // the branch stage is off the path for these diagrams
    let decision = harness
        .controller
        .enter(&session, Stage::InfractionAttribution)
        .await?;
    match decision {
        EntryDecision::Redirect { to, missing, .. } => {
            assert_eq!(to, Stage::EvidenceCapture);
            assert!(missing.is_empty());
        }
        other => panic!("Expected a redirect, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_diagram_is_rejected() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    for diagram_id in ["VII-1", "IX-9", ""] {
        let outcome = harness
            .submit(
                &session,
                Stage::DiagramSelect,
                StageInput::Diagram {
                    diagram_id: diagram_id.to_string(),
                },
            )
            .await?;
        let errors = outcome.errors().expect("rejected");
        assert!(errors.get("diagramId").is_some(), "diagram {:?}", diagram_id);
    }
    assert!(harness.controller.state(&session).await?.diagram.is_none());
    Ok(())
}

#[tokio::test]
async fn test_other_vehicle_ends_the_digital_report() -> Result<(), CoreError> {
    init_test_tracing();
    let harness = WorkflowHarness::new();
    let controller = &harness.controller;
    let session = harness.session_at(Stage::VehicleSelect).await?;

    let outcome = harness
        .submit(&session, Stage::VehicleSelect, StageInput::Vehicle(VehicleChoice::Other))
        .await?;
    assert_eq!(
        outcome,
        AdvanceOutcome::Terminal {
            stage: Stage::VehicleSelect,
            remedy: ESCALATION_REMEDY.to_string(),
        }
    );

    let state = controller.state(&session).await?;
    assert!(state.is_terminal());
    assert!(state.summary().other_vehicle);

    // nothing past the vehicle choice is reachable
    let decision = controller.enter(&session, Stage::ContactCapture).await?;
    assert_eq!(decision.stage(), Stage::VehicleSelect);

    let outcome = controller
        .advance(&session, Stage::ContactCapture, StageInput::Contact(contact_draft()))
        .await?;
    assert!(matches!(outcome, AdvanceOutcome::Terminal { .. }));

    // and the dead-end is final
    let outcome = controller
        .advance(
            &session,
            Stage::VehicleSelect,
            StageInput::Vehicle(VehicleChoice::Registry("1".to_string())),
        )
        .await?;
    assert!(matches!(outcome, AdvanceOutcome::Terminal { .. }));

    assert_eq!(harness.notifier.attempts(), 0);
    assert_eq!(harness.events.count("workflow.terminal"), 1);
    Ok(())
}

#[tokio::test]
async fn test_input_for_another_stage_is_a_precondition_violation() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();
    let session = harness.controller.start().await?;

    let result = harness
        .controller
        .advance(&session, Stage::DiagramSelect, StageInput::ConfirmIdentity)
        .await;
    match result {
        Err(CoreError::PreconditionViolation(msg)) => {
            assert!(msg.contains("identity_validate"));
            assert!(msg.contains("diagram_select"));
        }
        other => panic!("Expected PreconditionViolation, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_resume_points_at_first_missing_stage() -> Result<(), CoreError> {
    let harness = WorkflowHarness::new();

    let session = harness.session_at(Stage::IdentityValidate).await?;
    assert_eq!(harness.controller.resume(&session).await?, Stage::IdentityValidate);

    let session = harness.session_at(Stage::ContactCapture).await?;
    assert_eq!(harness.controller.resume(&session).await?, Stage::ContactCapture);
    Ok(())
}
