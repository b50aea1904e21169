//! Workflow harness builder for integration testing.
//!
//! Wires a [`WorkflowController`] to an in-memory session store and the fakes
//! of this crate, and keeps handles on the fakes so tests can inspect them.

use std::fmt;
use std::sync::Arc;

use sinquerella_core::{
    AdvanceOutcome, CoreError, DriverRole, IdentityVerifier, InfractionResponse, LocationService,
    SessionId, SessionStore, Stage, StageInput, VehicleChoice, WorkflowConfig, WorkflowController,
    WorkflowEventHandler,
};
use sinquerella_state_inmemory::InMemorySessionStore;

use crate::data_generators::{contact_draft, evidence_draft, identity_draft};
use crate::implementations::{
    FakeGeocoder, FakeIdentityVerifier, FakePositionProvider, FakeReportRenderer,
    FakeVehicleRegistry, RecordingEventHandler, RecordingNotifier,
};

/// Builder for a [`WorkflowHarness`]
#[derive(Default)]
pub struct WorkflowHarnessBuilder {
    config: Option<WorkflowConfig>,
    identity_verifier: Option<Arc<dyn IdentityVerifier>>,
    vehicle_registry: Option<Arc<FakeVehicleRegistry>>,
    notifier: Option<Arc<RecordingNotifier>>,
    position_provider: Option<Arc<FakePositionProvider>>,
    geocoder: Option<FakeGeocoder>,
}

impl fmt::Debug for WorkflowHarnessBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHarnessBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowHarnessBuilder {
    /// Creates a builder with default fakes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workflow configuration.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the identity lookup.
    pub fn with_identity_verifier<V: IdentityVerifier + 'static>(mut self, verifier: Arc<V>) -> Self {
        self.identity_verifier = Some(verifier);
        self
    }

    /// Routes vehicle candidates through a registry.
    pub fn with_vehicle_registry(mut self, registry: FakeVehicleRegistry) -> Self {
        self.vehicle_registry = Some(Arc::new(registry));
        self
    }

    /// Sets the invitation notifier.
    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// Sets the device position source.
    pub fn with_position_provider(mut self, provider: FakePositionProvider) -> Self {
        self.position_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the reverse geocoder.
    pub fn with_geocoder(mut self, geocoder: FakeGeocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Builds the harness.
    pub fn build(self) -> WorkflowHarness {
        let config = self.config.unwrap_or_default();
        let store = Arc::new(InMemorySessionStore::new());
        let notifier = self.notifier.unwrap_or_default();
        let renderer = Arc::new(FakeReportRenderer::new());
        let events = Arc::new(RecordingEventHandler::new());
        let identity_verifier = self
            .identity_verifier
            .unwrap_or_else(|| Arc::new(FakeIdentityVerifier::default()));
        let position_provider = self.position_provider.unwrap_or_default();

        let mut controller = WorkflowController::new(
            store.clone(),
            config.clone(),
            identity_verifier,
            notifier.clone(),
            renderer.clone(),
            events.clone() as Arc<dyn WorkflowEventHandler>,
        );
        if let Some(registry) = &self.vehicle_registry {
            controller = controller.with_vehicle_registry(registry.clone());
        }

        let location = LocationService::new(
            store.clone(),
            position_provider.clone(),
            Arc::new(
                self.geocoder
                    .unwrap_or_else(|| FakeGeocoder::resolving("Calle Fortaleza, San Juan, PR")),
            ),
            &config,
        );

        WorkflowHarness {
            controller,
            location,
            store,
            notifier,
            renderer,
            events,
            position_provider,
            vehicle_registry: self.vehicle_registry,
        }
    }
}

/// A controller wired to fakes, plus handles on the fakes
pub struct WorkflowHarness {
    /// The controller under test
    pub controller: WorkflowController,
    /// Location service sharing the controller's store
    pub location: LocationService,
    /// Backing session store
    pub store: Arc<InMemorySessionStore>,
    /// Invitation recorder
    pub notifier: Arc<RecordingNotifier>,
    /// Report renderer
    pub renderer: Arc<FakeReportRenderer>,
    /// Published domain events
    pub events: Arc<RecordingEventHandler>,
    /// Device position source
    pub position_provider: Arc<FakePositionProvider>,
    /// Vehicle registry, when configured
    pub vehicle_registry: Option<Arc<FakeVehicleRegistry>>,
}

impl fmt::Debug for WorkflowHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHarness").finish_non_exhaustive()
    }
}

impl WorkflowHarness {
    /// Harness with default fakes
    pub fn new() -> Self {
        WorkflowHarnessBuilder::new().build()
    }

    /// Builder for a customised harness
    pub fn builder() -> WorkflowHarnessBuilder {
        WorkflowHarnessBuilder::new()
    }

    /// The store as the trait object the controller sees
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Enter `stage` and submit `input` to it
    pub async fn submit(
        &self,
        session: &SessionId,
        stage: Stage,
        input: StageInput,
    ) -> Result<AdvanceOutcome, CoreError> {
        self.controller.enter(session, stage).await?;
        self.controller.advance(session, stage, input).await
    }

    /// Walk a new session up to `until` along the happy path
    ///
    /// Uses diagram IV-2, attributes the infraction to vehicle A, reports as
    /// driver A with the demo credentials and picks the Toyota. Stops as soon
    /// as the session stands at `until`.
    pub async fn session_at(&self, until: Stage) -> Result<SessionId, CoreError> {
        let session = self.controller.start().await?;

        let steps = [
            (
                Stage::DiagramSelect,
                StageInput::Diagram {
                    diagram_id: "IV-2".to_string(),
                },
            ),
            (
                Stage::InfractionAttribution,
                StageInput::Infraction {
                    response: InfractionResponse::VehicleA,
                },
            ),
            (Stage::EvidenceCapture, StageInput::Evidence(evidence_draft())),
            (Stage::DriverRoleSelect, StageInput::Role { role: DriverRole::A }),
            (Stage::DriverIdentify, StageInput::Identify(identity_draft())),
            (Stage::IdentityValidate, StageInput::ConfirmIdentity),
            (
                Stage::VehicleSelect,
                StageInput::Vehicle(VehicleChoice::Registry("1".to_string())),
            ),
            (Stage::ContactCapture, StageInput::Contact(contact_draft())),
            (Stage::HandoffSent, StageInput::CounterpartyCompleted),
        ];

        for (stage, input) in steps {
            if stage == until {
                break;
            }
            let outcome = self.submit(&session, stage, input).await?;
            if !outcome.is_advanced() {
                return Err(CoreError::WorkflowError(format!(
                    "Happy path stopped at {}: {:?}",
                    stage, outcome
                )));
            }
        }

        Ok(session)
    }
}

impl Default for WorkflowHarness {
    fn default() -> Self {
        Self::new()
    }
}
