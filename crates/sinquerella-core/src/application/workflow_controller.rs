use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::domain::artifacts::{
    Artifact, ContactHandoff, CounterpartyCompletion, DiagramSelection, DispatchStatus,
    DriverIdentity, EvidenceBundle, HandoffRecord, IdentityRecord, InfractionResponse,
    PendingIdentity, RoleSelection, VehicleCandidates, VehicleSelection,
};
use crate::domain::catalog::DiagramCatalog;
use crate::domain::collaborators::{
    IdentityVerifier, InvitationPayload, Notifier, ReportDocument, ReportRenderer, VehicleRegistry,
};
use crate::domain::events::{
    ArtifactsInvalidated, CounterpartyCompleted, DomainEvent, HandoffDispatched,
    IdentityValidated, LookupDiscarded, SessionClosed, StageAdvanced, StageEntered,
    StageRedirected, TerminalBranchReached, TransitionRejected,
};
use crate::domain::input::{ContactDraft, EvidenceDraft, IdentityDraft, StageInput, VehicleChoice};
use crate::domain::session_store::{SessionScope, SessionStore};
use crate::domain::stage::{Requirement, Stage, StageCursor, TerminalBranch};
use crate::domain::state::{ReportSummary, WorkflowState};
use crate::domain::validation::{self, FieldErrors, ValidationCode, VALIDATION_BANNER_FIELD};
use crate::types::{DriverRole, SessionId};
use crate::CoreError;

/// Answer to a request to render a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum EntryDecision {
    /// All prerequisites are present
    Render {
        /// Stage to render
        stage: Stage,
    },
    /// Something is missing; show `to` instead
    Redirect {
        /// Stage that was asked for
        requested: Stage,
        /// Earliest stage with missing data
        to: Stage,
        /// Unmet requirements, in stage order
        missing: Vec<Requirement>,
    },
}

impl EntryDecision {
    /// The stage the caller should show
    pub fn stage(&self) -> Stage {
        match self {
            EntryDecision::Render { stage } => *stage,
            EntryDecision::Redirect { to, .. } => *to,
        }
    }
}

/// Result of submitting input to a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AdvanceOutcome {
    /// Input accepted and stored; the session moved on
    Advanced {
        /// Stage that accepted the input
        from: Stage,
        /// Next stage
        to: Stage,
    },
    /// Input failed validation; nothing was written
    Rejected {
        /// Stage that rejected the input
        stage: Stage,
        /// Errors per field
        errors: FieldErrors,
    },
    /// The stage is not reachable yet
    Redirected {
        /// Stage the input was sent to
        requested: Stage,
        /// Earliest stage with missing data
        to: Stage,
        /// Unmet requirements
        missing: Vec<Requirement>,
    },
    /// The session hit the third-party vehicle dead-end
    Terminal {
        /// Stage the input was sent to
        stage: Stage,
        /// Out-of-band remedy
        remedy: String,
    },
    /// A lookup answered after the session moved on; nothing was written
    Discarded {
        /// Stage that issued the lookup
        stage: Stage,
    },
}

impl AdvanceOutcome {
    /// The stage the caller should show after this outcome
    pub fn stage(&self) -> Stage {
        match self {
            AdvanceOutcome::Advanced { to, .. } => *to,
            AdvanceOutcome::Rejected { stage, .. } => *stage,
            AdvanceOutcome::Redirected { to, .. } => *to,
            AdvanceOutcome::Terminal { stage, .. } => *stage,
            AdvanceOutcome::Discarded { stage } => *stage,
        }
    }

    /// Whether the session moved forward
    pub fn is_advanced(&self) -> bool {
        matches!(self, AdvanceOutcome::Advanced { .. })
    }

    /// Field errors, for rejected submissions
    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            AdvanceOutcome::Rejected { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Handler for workflow events
#[async_trait]
pub trait WorkflowEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Event handler that writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventHandler;

#[async_trait]
impl WorkflowEventHandler for TracingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        info!(
            event_type = event.event_type(),
            session = %event.session_id(),
            "Workflow event"
        );
        debug!(event = ?event, "Workflow event payload");
        Ok(())
    }
}

/// State machine of the reporting workflow
#[derive(Clone)]
pub struct WorkflowController {
    /// Where the artifacts live
    store: Arc<dyn SessionStore>,

    /// Validation limits and remedies
    config: WorkflowConfig,

    /// Diagram catalog
    catalog: DiagramCatalog,

    /// Identity validation lookup
    identity_verifier: Arc<dyn IdentityVerifier>,

    /// Optional registry; without it the vehicles come from the identity lookup
    vehicle_registry: Option<Arc<dyn VehicleRegistry>>,

    /// Invitation delivery
    notifier: Arc<dyn Notifier>,

    /// Final report rendering
    report_renderer: Arc<dyn ReportRenderer>,

    /// Event handler
    event_handler: Arc<dyn WorkflowEventHandler>,
}

impl WorkflowController {
    /// Create a new workflow controller
    pub fn new(
        store: Arc<dyn SessionStore>,
        config: WorkflowConfig,
        identity_verifier: Arc<dyn IdentityVerifier>,
        notifier: Arc<dyn Notifier>,
        report_renderer: Arc<dyn ReportRenderer>,
        event_handler: Arc<dyn WorkflowEventHandler>,
    ) -> Self {
        let catalog = DiagramCatalog::from_config(&config);
        Self {
            store,
            config,
            catalog,
            identity_verifier,
            vehicle_registry: None,
            notifier,
            report_renderer,
            event_handler,
        }
    }

    /// Query candidate vehicles from a registry instead of the identity lookup
    pub fn with_vehicle_registry(mut self, registry: Arc<dyn VehicleRegistry>) -> Self {
        self.vehicle_registry = Some(registry);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Diagram catalog in use
    pub fn catalog(&self) -> &DiagramCatalog {
        &self.catalog
    }

    fn scope(&self, session: &SessionId) -> SessionScope {
        SessionScope::new(self.store.clone(), session.clone())
    }

    /// Open a new reporting session at the diagram selection
    pub async fn start(&self) -> Result<SessionId, CoreError> {
        let session = SessionId::generate();
        self.scope(&session).save(&StageCursor::initial()).await?;
        info!(session = %session, "Reporting session started");

        self.publish(Box::new(StageEntered {
            session_id: session.clone(),
            stage: Stage::DiagramSelect,
            timestamp: Utc::now(),
        }))
        .await?;

        Ok(session)
    }

    /// Ask to render a stage
    ///
    /// Renders only when every prerequisite of the stage is in the session;
    /// otherwise redirects to the earliest stage with missing data. Rendering
    /// moves the stage cursor, which makes any in-flight lookup stale.
    pub async fn enter(&self, session: &SessionId, stage: Stage) -> Result<EntryDecision, CoreError> {
        let scope = self.scope(session);
        let state = WorkflowState::load(&scope).await?;
        let decision = self.entry_decision(&state, stage);

        match &decision {
            EntryDecision::Render { stage } => {
                scope.save(&state.cursor().moved_to(*stage)).await?;
                debug!(session = %session, stage = ?stage, "Stage rendered");
                self.publish(Box::new(StageEntered {
                    session_id: session.clone(),
                    stage: *stage,
                    timestamp: Utc::now(),
                }))
                .await?;
            }
            EntryDecision::Redirect { requested, to, missing } => {
                info!(
                    session = %session,
                    requested = ?requested,
                    to = ?to,
                    missing = ?missing,
                    "Prerequisites missing, redirecting"
                );
                self.publish(Box::new(StageRedirected {
                    session_id: session.clone(),
                    requested: *requested,
                    redirected_to: *to,
                    timestamp: Utc::now(),
                }))
                .await?;
            }
        }

        Ok(decision)
    }

    /// Submit input to a stage
    ///
    /// Input of the wrong kind for `stage` is a caller bug and returns
    /// `CoreError::PreconditionViolation`. Everything the user can get wrong
    /// comes back as an [`AdvanceOutcome`].
    pub async fn advance(
        &self,
        session: &SessionId,
        stage: Stage,
        input: StageInput,
    ) -> Result<AdvanceOutcome, CoreError> {
        if input.stage() != stage {
            return Err(CoreError::PreconditionViolation(format!(
                "Input for {} cannot be submitted to {}",
                input.stage(),
                stage
            )));
        }

        let scope = self.scope(session);
        let state = WorkflowState::load(&scope).await?;

        if let Some(terminal) = &state.terminal {
            debug!(session = %session, stage = ?stage, "Session is at a dead-end, ignoring input");
            return Ok(AdvanceOutcome::Terminal {
                stage,
                remedy: terminal.remedy.clone(),
            });
        }

        if let EntryDecision::Redirect { requested, to, missing } = self.entry_decision(&state, stage) {
            info!(
                session = %session,
                requested = ?requested,
                to = ?to,
                "Input sent to an unreachable stage, redirecting"
            );
            self.publish(Box::new(StageRedirected {
                session_id: session.clone(),
                requested,
                redirected_to: to,
                timestamp: Utc::now(),
            }))
            .await?;
            return Ok(AdvanceOutcome::Redirected { requested, to, missing });
        }

        let outcome = match input {
            StageInput::Diagram { diagram_id } => self.select_diagram(&scope, &state, &diagram_id).await?,
            StageInput::Infraction { response } => {
                self.attribute_infraction(&scope, &state, response).await?
            }
            StageInput::Evidence(draft) => self.capture_evidence(&scope, &state, &draft).await?,
            StageInput::Role { role } => self.select_role(&scope, &state, role).await?,
            StageInput::Identify(draft) => self.identify_driver(&scope, &state, &draft).await?,
            StageInput::ConfirmIdentity => self.confirm_identity(&scope, &state).await?,
            StageInput::Vehicle(choice) => self.select_vehicle(&scope, &state, &choice).await?,
            StageInput::Contact(draft) => self.capture_contact(&scope, &state, &draft).await?,
            StageInput::CounterpartyCompleted => self.complete_handoff(&scope, &state).await?,
        };

        if let AdvanceOutcome::Rejected { stage, errors } = &outcome {
            info!(
                session = %session,
                stage = ?stage,
                fields = errors.len(),
                "Submission rejected"
            );
            self.publish(Box::new(TransitionRejected {
                session_id: session.clone(),
                stage: *stage,
                fields: errors.iter().map(|(field, _)| field.to_string()).collect(),
                timestamp: Utc::now(),
            }))
            .await?;
        }

        Ok(outcome)
    }

    /// External signal that the other driver finished their half
    pub async fn receive_counterparty_completion(
        &self,
        session: &SessionId,
    ) -> Result<AdvanceOutcome, CoreError> {
        self.advance(session, Stage::HandoffSent, StageInput::CounterpartyCompleted)
            .await
    }

    /// Dispatch the invitation again after a failed attempt
    ///
    /// A delivered invitation is not sent twice; its record is returned as is.
    pub async fn retry_notification(&self, session: &SessionId) -> Result<HandoffRecord, CoreError> {
        let scope = self.scope(session);
        let state = WorkflowState::load(&scope).await?;

        if state.counterparty_completion.is_some() {
            return Err(CoreError::WorkflowError(
                "Cannot retry notification: counterparty already completed the report".to_string(),
            ));
        }

        let (contact, handoff) = match (&state.contact, &state.handoff) {
            (Some(contact), Some(handoff)) => (contact, handoff),
            _ => {
                return Err(CoreError::WorkflowError(format!(
                    "Cannot retry notification in stage: {:?}",
                    state.stage
                )))
            }
        };

        if !handoff.needs_retry() {
            debug!(session = %session, "Invitation already delivered, nothing to retry");
            return Ok(handoff.clone());
        }

        info!(session = %session, attempts = handoff.attempts, "Retrying invitation dispatch");
        self.dispatch_invitation(&scope, &state, contact, handoff.attempts).await
    }

    /// Render the merged report; only possible once the session is complete
    pub async fn render_report(&self, session: &SessionId) -> Result<ReportDocument, CoreError> {
        let state = self.state(session).await?;

        if let EntryDecision::Redirect { .. } = self.entry_decision(&state, Stage::Completion) {
            return Err(CoreError::WorkflowError(format!(
                "Cannot render report in stage: {:?}",
                state.stage
            )));
        }

        let document = self.report_renderer.render(&state).await?;
        info!(
            session = %session,
            file_name = %document.file_name,
            bytes = document.content.len(),
            "Report rendered"
        );
        Ok(document)
    }

    /// Earliest stage that still needs data
    pub async fn resume(&self, session: &SessionId) -> Result<Stage, CoreError> {
        let state = self.state(session).await?;
        Ok(self.resume_point(&state))
    }

    /// Everything stored for the session
    pub async fn state(&self, session: &SessionId) -> Result<WorkflowState, CoreError> {
        WorkflowState::load(&self.scope(session)).await
    }

    /// Review-page summary of the session
    pub async fn summary(&self, session: &SessionId) -> Result<ReportSummary, CoreError> {
        Ok(self.state(session).await?.summary())
    }

    /// Drop an unfinished session
    pub async fn abandon(&self, session: &SessionId) -> Result<(), CoreError> {
        self.scope(session).clear_all().await?;
        info!(session = %session, "Reporting session abandoned");
        self.publish(Box::new(SessionClosed {
            session_id: session.clone(),
            abandoned: true,
            timestamp: Utc::now(),
        }))
        .await
    }

    /// Drop a completed session
    pub async fn close(&self, session: &SessionId) -> Result<(), CoreError> {
        let state = self.state(session).await?;
        if state.counterparty_completion.is_none() {
            return Err(CoreError::WorkflowError(format!(
                "Cannot close session in stage: {:?}",
                state.stage
            )));
        }

        self.scope(session).clear_all().await?;
        info!(session = %session, "Reporting session closed");
        self.publish(Box::new(SessionClosed {
            session_id: session.clone(),
            abandoned: false,
            timestamp: Utc::now(),
        }))
        .await
    }

    fn entry_decision(&self, state: &WorkflowState, stage: Stage) -> EntryDecision {
        // the branch stage only exists for branch diagrams
        if stage == Stage::InfractionAttribution {
            if let Some(diagram) = &state.diagram {
                if !self.catalog.requires_infraction_attribution(&diagram.diagram_id) {
                    return EntryDecision::Redirect {
                        requested: stage,
                        to: self.resume_point(state),
                        missing: Vec::new(),
                    };
                }
            }
        }

        let missing: Vec<Requirement> = stage
            .prerequisites()
            .iter()
            .copied()
            .filter(|requirement| !requirement.is_met(state, &self.catalog))
            .collect();

        match missing.first().map(|requirement| requirement.satisfied_by()) {
            Some(to) => EntryDecision::Redirect {
                requested: stage,
                to,
                missing,
            },
            None => EntryDecision::Render { stage },
        }
    }

    fn resume_point(&self, state: &WorkflowState) -> Stage {
        Stage::Completion
            .prerequisites()
            .iter()
            .find(|requirement| !requirement.is_met(state, &self.catalog))
            .map(|requirement| requirement.satisfied_by())
            .unwrap_or(Stage::Completion)
    }

    async fn select_diagram(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        diagram_id: &str,
    ) -> Result<AdvanceOutcome, CoreError> {
        let entry = match validation::validate_diagram(&self.catalog, diagram_id) {
            Ok(entry) => entry,
            Err(errors) => return Ok(rejected(Stage::DiagramSelect, errors)),
        };
        let branch = entry.requires_infraction_attribution;

        // re-picking the same diagram keeps its infraction answer
        let changed = match &state.diagram {
            Some(existing) if existing.diagram_id == entry.diagram_id => false,
            existing => {
                let selection = DiagramSelection {
                    diagram_id: entry.diagram_id,
                    section_id: entry.section_id,
                    section_title: entry.section_title,
                    infraction_response: None,
                    selected_at: Utc::now(),
                };
                self.commit(scope, Stage::DiagramSelect, existing.as_ref(), &selection)
                    .await?
            }
        };

        let next = following(Stage::DiagramSelect, branch)?;
        self.move_forward(scope, state, Stage::DiagramSelect, next, changed)
            .await
    }

    async fn attribute_infraction(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        response: InfractionResponse,
    ) -> Result<AdvanceOutcome, CoreError> {
        let existing = state
            .diagram
            .as_ref()
            .ok_or_else(|| CoreError::WorkflowError("Diagram selection missing".to_string()))?;

        // the answer is only recorded; nothing downstream depends on it
        let changed = existing.infraction_response != Some(response);
        if changed {
            let selection = DiagramSelection {
                infraction_response: Some(response),
                ..existing.clone()
            };
            scope.save(&selection).await?;
        }
        debug!(session = %scope.session(), response = %response, "Infraction attributed");

        let next = following(Stage::InfractionAttribution, true)?;
        self.move_forward(scope, state, Stage::InfractionAttribution, next, changed)
            .await
    }

    async fn capture_evidence(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        draft: &EvidenceDraft,
    ) -> Result<AdvanceOutcome, CoreError> {
        let checked = match validation::validate_evidence(&self.config.validation, draft) {
            Ok(checked) => checked,
            Err(errors) => return Ok(rejected(Stage::EvidenceCapture, errors)),
        };

        let bundle = EvidenceBundle {
            images: checked.images,
            description: checked.description,
            location: checked.location,
            created_at: Utc::now(),
        };
        let changed = self
            .commit(scope, Stage::EvidenceCapture, state.evidence.as_ref(), &bundle)
            .await?;

        let next = following(Stage::EvidenceCapture, false)?;
        self.move_forward(scope, state, Stage::EvidenceCapture, next, changed)
            .await
    }

    async fn select_role(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        role: DriverRole,
    ) -> Result<AdvanceOutcome, CoreError> {
        let existing = scope.load::<RoleSelection>().await?;
        let selection = RoleSelection {
            role,
            selected_at: Utc::now(),
        };
        let changed = self
            .commit(scope, Stage::DriverRoleSelect, existing.as_ref(), &selection)
            .await?;

        let next = following(Stage::DriverRoleSelect, false)?;
        self.move_forward(scope, state, Stage::DriverRoleSelect, next, changed)
            .await
    }

    async fn identify_driver(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        draft: &IdentityDraft,
    ) -> Result<AdvanceOutcome, CoreError> {
        let credentials = match validation::validate_identity(&self.config.validation, draft) {
            Ok(credentials) => credentials,
            Err(errors) => return Ok(rejected(Stage::DriverIdentify, errors)),
        };

        let role = state
            .role
            .ok_or_else(|| CoreError::WorkflowError("Driver role missing".to_string()))?;
        let identity = DriverIdentity::unvalidated(
            role,
            &credentials.license_number,
            credentials.birth_date,
            &credentials.ssn_last4,
        );
        let next = following(Stage::DriverIdentify, false)?;

        if let Some(existing) = &state.identity {
            if existing.same_credentials(&identity)
                && (existing.validated || state.pending_identity.is_some())
            {
                debug!(session = %scope.session(), "Credentials unchanged, skipping lookup");
                return self
                    .move_forward(scope, state, Stage::DriverIdentify, next, false)
                    .await;
            }
        }

        info!(session = %scope.session(), role = %role, "Requesting identity validation");
        let lookup = self.identity_verifier.verify(&credentials).await;

        if self.is_stale(scope, state).await? {
            return self.discard(scope, Stage::DriverIdentify).await;
        }

        let record = match lookup {
            Ok(record) => record,
            Err(err) => {
                warn!(session = %scope.session(), error = %err, "Identity validation failed");
                return Ok(rejected(
                    Stage::DriverIdentify,
                    FieldErrors::single(
                        VALIDATION_BANNER_FIELD,
                        ValidationCode::IdentityNotVerified,
                        lookup_failure_message(&err),
                    ),
                ));
            }
        };

        let changed = self
            .commit(scope, Stage::DriverIdentify, state.identity.as_ref(), &identity)
            .await?;
        scope
            .save(&PendingIdentity {
                record,
                looked_up_at: Utc::now(),
            })
            .await?;

        self.move_forward(scope, state, Stage::DriverIdentify, next, changed)
            .await
    }

    async fn confirm_identity(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
    ) -> Result<AdvanceOutcome, CoreError> {
        let identity = state
            .identity
            .clone()
            .ok_or_else(|| CoreError::WorkflowError("Driver identity missing".to_string()))?;
        let next = following(Stage::IdentityValidate, false)?;

        let IdentityRecord {
            personal_info,
            vehicles: looked_up,
        } = match &state.pending_identity {
            Some(pending) => pending.record.clone(),
            None if identity.validated && state.vehicle_candidates.is_some() => {
                return self
                    .move_forward(scope, state, Stage::IdentityValidate, next, false)
                    .await;
            }
            None => {
                return Err(CoreError::WorkflowError(
                    "No identity lookup result to confirm".to_string(),
                ))
            }
        };

        let vehicles = match &self.vehicle_registry {
            Some(registry) => {
                let lookup = registry.vehicles_for(&identity.license_number).await;
                if self.is_stale(scope, state).await? {
                    return self.discard(scope, Stage::IdentityValidate).await;
                }
                match lookup {
                    Ok(vehicles) => vehicles,
                    Err(err) => {
                        warn!(session = %scope.session(), error = %err, "Vehicle registry lookup failed");
                        return Ok(rejected(
                            Stage::IdentityValidate,
                            FieldErrors::single(
                                "vehicles",
                                ValidationCode::VehicleLookupFailed,
                                "No se pudieron obtener los vehículos registrados. Intenta nuevamente.",
                            ),
                        ));
                    }
                }
            }
            None => looked_up,
        };

        let validated = identity.into_validated(personal_info);
        scope.save(&validated).await?;

        let candidates = VehicleCandidates { vehicles };
        self.commit(
            scope,
            Stage::IdentityValidate,
            state.vehicle_candidates.as_ref(),
            &candidates,
        )
        .await?;
        scope.remove::<PendingIdentity>().await?;

        info!(
            session = %scope.session(),
            candidates = candidates.vehicles.len(),
            "Identity confirmed"
        );
        self.publish(Box::new(IdentityValidated {
            session_id: scope.session().clone(),
            role: validated.role,
            candidate_count: candidates.vehicles.len(),
            timestamp: Utc::now(),
        }))
        .await?;

        self.move_forward(scope, state, Stage::IdentityValidate, next, true)
            .await
    }

    async fn select_vehicle(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        choice: &VehicleChoice,
    ) -> Result<AdvanceOutcome, CoreError> {
        let selection = match validation::validate_vehicle(choice, state.vehicle_candidates.as_ref()) {
            Ok(selection) => selection,
            Err(errors) => return Ok(rejected(Stage::VehicleSelect, errors)),
        };
        let changed = self
            .commit(scope, Stage::VehicleSelect, state.vehicle.as_ref(), &selection)
            .await?;

        if selection == VehicleSelection::OtherVehicle {
            let remedy = format!(
                "Debes llamar para hacer una querella: {}",
                self.config.escalation_phone
            );
            let mut cursor = state.cursor().moved_to(Stage::VehicleSelect);
            cursor.terminal = Some(TerminalBranch {
                remedy: remedy.clone(),
                reached_at: Utc::now(),
            });
            scope.save(&cursor).await?;

            info!(session = %scope.session(), "Vehicle outside the registry, digital report ends here");
            self.publish(Box::new(TerminalBranchReached {
                session_id: scope.session().clone(),
                remedy: remedy.clone(),
                timestamp: Utc::now(),
            }))
            .await?;

            return Ok(AdvanceOutcome::Terminal {
                stage: Stage::VehicleSelect,
                remedy,
            });
        }

        let next = following(Stage::VehicleSelect, false)?;
        self.move_forward(scope, state, Stage::VehicleSelect, next, changed)
            .await
    }

    async fn capture_contact(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        draft: &ContactDraft,
    ) -> Result<AdvanceOutcome, CoreError> {
        let checked = match validation::validate_contact(draft) {
            Ok(checked) => checked,
            Err(errors) => return Ok(rejected(Stage::ContactCapture, errors)),
        };

        let role = state
            .role
            .ok_or_else(|| CoreError::WorkflowError("Driver role missing".to_string()))?;
        let contact = ContactHandoff {
            counterparty_role: role.counterpart(),
            counterparty_email: checked.email,
            counterparty_phone: checked.phone,
            captured_at: Utc::now(),
        };
        let next = following(Stage::ContactCapture, false)?;

        let already_sent = state
            .contact
            .as_ref()
            .map_or(false, |existing| existing.same_content(&contact))
            && state.handoff.is_some();
        if already_sent {
            debug!(session = %scope.session(), "Contact unchanged, invitation not sent again");
            return self
                .move_forward(scope, state, Stage::ContactCapture, next, false)
                .await;
        }

        self.commit(scope, Stage::ContactCapture, state.contact.as_ref(), &contact)
            .await?;
        self.dispatch_invitation(scope, state, &contact, 0).await?;

        self.move_forward(scope, state, Stage::ContactCapture, next, true)
            .await
    }

    async fn complete_handoff(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
    ) -> Result<AdvanceOutcome, CoreError> {
        let changed = state.counterparty_completion.is_none();
        if changed {
            scope
                .save(&CounterpartyCompletion {
                    received_at: Utc::now(),
                })
                .await?;
            info!(session = %scope.session(), "Counterparty completed the report");
            self.publish(Box::new(CounterpartyCompleted {
                session_id: scope.session().clone(),
                timestamp: Utc::now(),
            }))
            .await?;
        }

        let next = following(Stage::HandoffSent, false)?;
        self.move_forward(scope, state, Stage::HandoffSent, next, changed)
            .await
    }

    async fn dispatch_invitation(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        contact: &ContactHandoff,
        previous_attempts: u32,
    ) -> Result<HandoffRecord, CoreError> {
        let diagram = state
            .diagram
            .as_ref()
            .ok_or_else(|| CoreError::WorkflowError("Diagram selection missing".to_string()))?;
        let evidence = state
            .evidence
            .as_ref()
            .ok_or_else(|| CoreError::WorkflowError("Evidence missing".to_string()))?;

        let payload = InvitationPayload {
            session: scope.session().clone(),
            inviting_role: contact.counterparty_role.counterpart(),
            counterparty_role: contact.counterparty_role,
            diagram_id: diagram.diagram_id.clone(),
            infraction_response: diagram.infraction_response,
            accident_address: evidence.location.address.clone(),
            invited_at: Utc::now(),
        };

        let dispatch = match self
            .notifier
            .dispatch(&contact.counterparty_email, &contact.counterparty_phone, &payload)
            .await
        {
            Ok(()) => {
                info!(session = %scope.session(), "Invitation delivered");
                DispatchStatus::Delivered
            }
            Err(err) => {
                warn!(session = %scope.session(), error = %err, "Invitation dispatch failed");
                DispatchStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };

        let record = HandoffRecord {
            dispatch,
            attempts: previous_attempts + 1,
            last_attempt_at: Utc::now(),
        };
        scope.save(&record).await?;

        self.publish(Box::new(HandoffDispatched {
            session_id: scope.session().clone(),
            delivered: !record.needs_retry(),
            attempts: record.attempts,
            timestamp: Utc::now(),
        }))
        .await?;

        Ok(record)
    }

    /// Save `artifact` unless the stored one has the same content, and drop
    /// everything downstream when it changed
    async fn commit<A: Artifact>(
        &self,
        scope: &SessionScope,
        stage: Stage,
        existing: Option<&A>,
        artifact: &A,
    ) -> Result<bool, CoreError> {
        if existing.map_or(false, |existing| existing.same_content(artifact)) {
            return Ok(false);
        }

        scope.save(artifact).await?;
        self.invalidate_downstream(scope, stage).await?;
        Ok(true)
    }

    async fn invalidate_downstream(&self, scope: &SessionScope, stage: Stage) -> Result<(), CoreError> {
        let present = self.store.keys(scope.session()).await?;
        let stale: Vec<&'static str> = stage
            .downstream_keys()
            .into_iter()
            .filter(|key| present.iter().any(|p| p == key))
            .collect();

        if stale.is_empty() {
            return Ok(());
        }

        for key in &stale {
            scope.remove_key(key).await?;
        }

        info!(
            session = %scope.session(),
            stage = ?stage,
            keys = ?stale,
            "Downstream artifacts invalidated"
        );
        self.publish(Box::new(ArtifactsInvalidated {
            session_id: scope.session().clone(),
            stage,
            keys: stale,
            timestamp: Utc::now(),
        }))
        .await
    }

    async fn move_forward(
        &self,
        scope: &SessionScope,
        state: &WorkflowState,
        from: Stage,
        to: Stage,
        changed: bool,
    ) -> Result<AdvanceOutcome, CoreError> {
        scope.save(&state.cursor().moved_to(to)).await?;
        info!(
            session = %scope.session(),
            from = ?from,
            to = ?to,
            changed,
            "Stage advanced"
        );

        self.publish(Box::new(StageAdvanced {
            session_id: scope.session().clone(),
            from,
            to,
            changed,
            timestamp: Utc::now(),
        }))
        .await?;

        Ok(AdvanceOutcome::Advanced { from, to })
    }

    /// Whether the cursor moved while a lookup was in flight
    async fn is_stale(&self, scope: &SessionScope, state: &WorkflowState) -> Result<bool, CoreError> {
        let current = scope.load::<StageCursor>().await?.unwrap_or_default();
        Ok(current.revision != state.revision)
    }

    async fn discard(&self, scope: &SessionScope, stage: Stage) -> Result<AdvanceOutcome, CoreError> {
        info!(session = %scope.session(), stage = ?stage, "Late lookup response discarded");
        self.publish(Box::new(LookupDiscarded {
            session_id: scope.session().clone(),
            stage,
            timestamp: Utc::now(),
        }))
        .await?;
        Ok(AdvanceOutcome::Discarded { stage })
    }

    async fn publish(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.event_handler.handle_event(event).await
    }
}

fn rejected(stage: Stage, errors: FieldErrors) -> AdvanceOutcome {
    AdvanceOutcome::Rejected { stage, errors }
}

fn following(stage: Stage, branch: bool) -> Result<Stage, CoreError> {
    stage
        .next(branch)
        .ok_or_else(|| CoreError::WorkflowError(format!("No stage after {:?}", stage)))
}

fn lookup_failure_message(err: &CoreError) -> String {
    match err {
        CoreError::CollaboratorError { message, .. } => message.clone(),
        CoreError::CollaboratorTimeout(_) => {
            "El servicio de validación no respondió. Intenta nuevamente.".to_string()
        }
        _ => "No se pudo validar la identidad. Verifica los datos e intenta nuevamente.".to_string(),
    }
}
