//! Scripted reporting sessions.
//!
//! A scenario is a YAML list of steps run against one session. The external
//! services are the deterministic fakes from the test utilities, configured
//! through the scenario's `fixtures` block.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use sinquerella_core::{
    LocationFix, LocationOutcome, LocationService, ReportSummary, SessionId, Stage, StageInput,
    TracingEventHandler, WorkflowConfig, WorkflowController, WorkflowState,
};
use sinquerella_test_utils::{
    FakeGeocoder, FakeIdentityVerifier, FakePositionProvider, FakeReportRenderer,
    FakeVehicleRegistry, RecordingNotifier,
};

/// A scripted session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Display name
    pub name: String,
    /// How the fake services behave
    #[serde(default)]
    pub fixtures: Fixtures,
    /// Steps in order
    pub steps: Vec<Step>,
}

/// Behavior of the fake services
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixtures {
    /// Reject every identity lookup with this message
    #[serde(default)]
    pub identity_rejection: Option<String>,
    /// Query candidate vehicles from a registry instead of the lookup
    #[serde(default)]
    pub vehicle_registry: bool,
    /// Number of invitation dispatches that fail before one succeeds
    #[serde(default)]
    pub notification_failures: u32,
    /// Device position; the device refuses when absent
    #[serde(default = "default_position")]
    pub position: Option<Coordinates>,
    /// Resolved address; geocoding fails when absent
    #[serde(default = "default_address")]
    pub address: Option<String>,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            identity_rejection: None,
            vehicle_registry: false,
            notification_failures: 0,
            position: default_position(),
            address: default_address(),
        }
    }
}

/// Latitude and longitude
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coordinates {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
}

fn default_position() -> Option<Coordinates> {
    Some(Coordinates {
        latitude: 18.4655,
        longitude: -66.1057,
    })
}

fn default_address() -> Option<String> {
    Some("Calle Fortaleza, San Juan, PR".to_string())
}

/// One scripted action
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    /// Ask to render a stage
    Enter {
        /// Stage to render
        stage: Stage,
    },
    /// Enter a stage and submit input to it
    Submit {
        /// Target stage
        stage: Stage,
        /// What the user submitted
        input: StageInput,
    },
    /// Ask the device for the accident location
    Locate,
    /// Type the accident address by hand
    ManualAddress {
        /// The typed address
        address: String,
    },
    /// The other driver finished their half
    CounterpartyCompleted,
    /// Send a failed invitation again
    RetryNotification,
    /// Render the merged report
    RenderReport,
    /// Give up on the session
    Abandon,
}

/// Result of one step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Position in the scenario, from 1
    pub step: usize,
    /// Step action name
    pub action: String,
    /// What happened
    pub result: Value,
}

/// Result of a whole scenario
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Session id
    pub session: SessionId,
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// Stage a returning user would land on
    pub resume_stage: Stage,
    /// Review-page summary
    pub summary: ReportSummary,
    /// Everything stored for the session
    pub state: WorkflowState,
}

impl Scenario {
    /// Read a scenario file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    /// Parse a scenario from YAML
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        if scenario.steps.is_empty() {
            bail!("Scenario '{}' has no steps", scenario.name);
        }
        Ok(scenario)
    }
}

/// Runs scenarios against one configuration
pub struct ScenarioRunner {
    controller: WorkflowController,
    location: LocationService,
}

impl ScenarioRunner {
    /// Wire the controller and the fakes described by `fixtures`
    pub fn new(config: &WorkflowConfig, fixtures: &Fixtures) -> anyhow::Result<Self> {
        let store = sinquerella_state_inmemory::session_store_from_url(&config.session_store_url)
            .context("Failed to create session store")?;

        let identity_verifier = match &fixtures.identity_rejection {
            Some(message) => FakeIdentityVerifier::rejecting(message.clone()),
            None => FakeIdentityVerifier::default(),
        };
        let mut controller = WorkflowController::new(
            store.clone(),
            config.clone(),
            Arc::new(identity_verifier),
            Arc::new(RecordingNotifier::failing_first(fixtures.notification_failures)),
            Arc::new(FakeReportRenderer::new()),
            Arc::new(TracingEventHandler),
        );
        if fixtures.vehicle_registry {
            controller = controller.with_vehicle_registry(Arc::new(FakeVehicleRegistry::default()));
        }

        let provider = match fixtures.position {
            Some(point) => FakePositionProvider::fixed(point.latitude, point.longitude),
            None => FakePositionProvider::failing("User denied Geolocation"),
        };
        let geocoder = match &fixtures.address {
            Some(address) => FakeGeocoder::resolving(address.clone()),
            None => FakeGeocoder::failing(),
        };
        let location = LocationService::new(store, Arc::new(provider), Arc::new(geocoder), config);

        Ok(Self { controller, location })
    }

    /// Run every step of `scenario` on a new session
    pub async fn run(&self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        let session = self.controller.start().await?;
        info!(scenario = %scenario.name, session = %session, "Running scenario");

        let mut location: Option<LocationFix> = None;
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let (action, result) = self.run_step(&session, step, &mut location).await?;
            steps.push(StepReport {
                step: index + 1,
                action: action.to_string(),
                result,
            });
        }

        let state = self.controller.state(&session).await?;
        Ok(ScenarioReport {
            scenario: scenario.name.clone(),
            session: session.clone(),
            steps,
            resume_stage: self.controller.resume(&session).await?,
            summary: state.summary(),
            state,
        })
    }

    async fn run_step(
        &self,
        session: &SessionId,
        step: &Step,
        location: &mut Option<LocationFix>,
    ) -> anyhow::Result<(&'static str, Value)> {
        let controller = &self.controller;
        let report = match step {
            Step::Enter { stage } => {
                let decision = controller.enter(session, *stage).await?;
                ("enter", serde_json::to_value(decision)?)
            }
            Step::Submit { stage, input } => {
                let input = with_location(input.clone(), location.as_ref());
                controller.enter(session, *stage).await?;
                let outcome = controller.advance(session, *stage, input).await?;
                ("submit", serde_json::to_value(outcome)?)
            }
            Step::Locate => match self.location.locate(session).await? {
                LocationOutcome::Located(fix) => {
                    let value = serde_json::to_value(&fix)?;
                    *location = Some(fix);
                    ("locate", value)
                }
                LocationOutcome::Unavailable(errors) => {
                    warn!(session = %session, "No GPS fix, scenario should type the address");
                    ("locate", json!({ "errors": errors }))
                }
            },
            Step::ManualAddress { address } => match self.location.manual(address) {
                Ok(fix) => {
                    let value = serde_json::to_value(&fix)?;
                    *location = Some(fix);
                    ("manualAddress", value)
                }
                Err(errors) => ("manualAddress", json!({ "errors": errors })),
            },
            Step::CounterpartyCompleted => (
                "counterpartyCompleted",
                serde_json::to_value(controller.receive_counterparty_completion(session).await?)?,
            ),
            Step::RetryNotification => (
                "retryNotification",
                serde_json::to_value(controller.retry_notification(session).await?)?,
            ),
            Step::RenderReport => {
                let document = controller.render_report(session).await?;
                (
                    "renderReport",
                    json!({
                        "fileName": document.file_name,
                        "mediaType": document.media_type,
                        "bytes": document.content.len(),
                    }),
                )
            }
            Step::Abandon => {
                controller.abandon(session).await?;
                ("abandon", json!({ "abandoned": true }))
            }
        };
        Ok(report)
    }
}

/// Evidence submitted without a location uses the last located fix
fn with_location(input: StageInput, location: Option<&LocationFix>) -> StageInput {
    match input {
        StageInput::Evidence(mut draft) if draft.location.is_none() => {
            draft.location = location.cloned();
            StageInput::Evidence(draft)
        }
        other => other,
    }
}
