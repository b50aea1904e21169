//! Stages of the reporting workflow and their prerequisites
//!
//! The prerequisite table is the single source for entry guards: every
//! stage lists the requirements that must hold before it may be rendered,
//! and every requirement names the stage that satisfies it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::artifacts::{
    Artifact, ContactHandoff, CounterpartyCompletion, DiagramSelection, DriverIdentity,
    EvidenceBundle, HandoffRecord, PendingIdentity, RoleSelection, VehicleCandidates,
    VehicleSelection,
};
use crate::domain::catalog::DiagramCatalog;
use crate::domain::state::WorkflowState;

/// One step of the reporting workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Pick the accident-type diagram
    DiagramSelect,
    /// Say which vehicle ran the light (branch diagrams only)
    InfractionAttribution,
    /// Photos, description and location
    EvidenceCapture,
    /// Pick vehicle A or B on the diagram
    DriverRoleSelect,
    /// Enter license, birth date and SSN digits
    DriverIdentify,
    /// Confirm the identity lookup result
    IdentityValidate,
    /// Pick the vehicle being driven
    VehicleSelect,
    /// Enter the other driver's contact data
    ContactCapture,
    /// Invitation sent, waiting for the other driver
    HandoffSent,
    /// Both halves of the report are in
    Completion,
}

impl Stage {
    /// All stages in forward order, branch included
    pub const ALL: [Stage; 10] = [
        Stage::DiagramSelect,
        Stage::InfractionAttribution,
        Stage::EvidenceCapture,
        Stage::DriverRoleSelect,
        Stage::DriverIdentify,
        Stage::IdentityValidate,
        Stage::VehicleSelect,
        Stage::ContactCapture,
        Stage::HandoffSent,
        Stage::Completion,
    ];

    /// Stage that follows this one; `branch` says whether the selected
    /// diagram opens the infraction attribution step
    pub fn next(self, branch: bool) -> Option<Stage> {
        match self {
            Stage::DiagramSelect if branch => Some(Stage::InfractionAttribution),
            Stage::DiagramSelect => Some(Stage::EvidenceCapture),
            Stage::InfractionAttribution => Some(Stage::EvidenceCapture),
            Stage::EvidenceCapture => Some(Stage::DriverRoleSelect),
            Stage::DriverRoleSelect => Some(Stage::DriverIdentify),
            Stage::DriverIdentify => Some(Stage::IdentityValidate),
            Stage::IdentityValidate => Some(Stage::VehicleSelect),
            Stage::VehicleSelect => Some(Stage::ContactCapture),
            Stage::ContactCapture => Some(Stage::HandoffSent),
            Stage::HandoffSent => Some(Stage::Completion),
            Stage::Completion => None,
        }
    }

    /// Requirements that must hold before this stage can be rendered
    pub fn prerequisites(self) -> &'static [Requirement] {
        use Requirement::*;
        match self {
            Stage::DiagramSelect => &[],
            Stage::InfractionAttribution => &[DiagramSelected],
            Stage::EvidenceCapture => &[DiagramSelected, InfractionAnswered],
            Stage::DriverRoleSelect => &[DiagramSelected, InfractionAnswered, EvidenceCaptured],
            Stage::DriverIdentify => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
            ],
            Stage::IdentityValidate => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
                IdentitySubmitted,
            ],
            Stage::VehicleSelect => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
                IdentitySubmitted,
                IdentityValidated,
            ],
            Stage::ContactCapture => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
                IdentitySubmitted,
                IdentityValidated,
                VehicleChosen,
            ],
            Stage::HandoffSent => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
                IdentitySubmitted,
                IdentityValidated,
                VehicleChosen,
                ContactCaptured,
            ],
            Stage::Completion => &[
                DiagramSelected,
                InfractionAnswered,
                EvidenceCaptured,
                RoleSelected,
                IdentitySubmitted,
                IdentityValidated,
                VehicleChosen,
                ContactCaptured,
                CounterpartyFinished,
            ],
        }
    }

    /// Store keys whose artifacts this stage writes and owns
    pub fn owned_keys(self) -> &'static [&'static str] {
        match self {
            Stage::DiagramSelect => &[DiagramSelection::KEY],
            // writes into the diagram selection
            Stage::InfractionAttribution => &[],
            Stage::EvidenceCapture => &[EvidenceBundle::KEY],
            Stage::DriverRoleSelect => &[RoleSelection::KEY],
            Stage::DriverIdentify => &[DriverIdentity::KEY, PendingIdentity::KEY],
            Stage::IdentityValidate => &[VehicleCandidates::KEY],
            Stage::VehicleSelect => &[VehicleSelection::KEY],
            Stage::ContactCapture => &[ContactHandoff::KEY, HandoffRecord::KEY],
            Stage::HandoffSent => &[CounterpartyCompletion::KEY],
            Stage::Completion => &[],
        }
    }

    /// Keys owned by every stage after this one
    pub fn downstream_keys(self) -> Vec<&'static str> {
        Stage::ALL
            .iter()
            .filter(|stage| **stage > self)
            .flat_map(|stage| stage.owned_keys().iter().copied())
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DiagramSelect => "diagram_select",
            Stage::InfractionAttribution => "infraction_attribution",
            Stage::EvidenceCapture => "evidence_capture",
            Stage::DriverRoleSelect => "driver_role_select",
            Stage::DriverIdentify => "driver_identify",
            Stage::IdentityValidate => "identity_validate",
            Stage::VehicleSelect => "vehicle_select",
            Stage::ContactCapture => "contact_capture",
            Stage::HandoffSent => "handoff_sent",
            Stage::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// Something a stage needs to find in the session before it can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Requirement {
    /// A diagram was picked
    DiagramSelected,
    /// Branch diagrams carry an infraction response
    InfractionAnswered,
    /// Evidence was captured
    EvidenceCaptured,
    /// A driver role was picked
    RoleSelected,
    /// Credentials were submitted and looked up
    IdentitySubmitted,
    /// The lookup result was confirmed and candidates are known
    IdentityValidated,
    /// A registry vehicle was chosen
    VehicleChosen,
    /// The counterparty contact was captured and the invitation attempted
    ContactCaptured,
    /// The counterparty finished their half
    CounterpartyFinished,
}

impl Requirement {
    /// The stage whose successful advance satisfies this requirement
    pub fn satisfied_by(self) -> Stage {
        match self {
            Requirement::DiagramSelected => Stage::DiagramSelect,
            Requirement::InfractionAnswered => Stage::InfractionAttribution,
            Requirement::EvidenceCaptured => Stage::EvidenceCapture,
            Requirement::RoleSelected => Stage::DriverRoleSelect,
            Requirement::IdentitySubmitted => Stage::DriverIdentify,
            Requirement::IdentityValidated => Stage::IdentityValidate,
            Requirement::VehicleChosen => Stage::VehicleSelect,
            Requirement::ContactCaptured => Stage::ContactCapture,
            Requirement::CounterpartyFinished => Stage::HandoffSent,
        }
    }

    /// Check the requirement against a snapshot of the session
    pub fn is_met(self, state: &WorkflowState, catalog: &DiagramCatalog) -> bool {
        match self {
            Requirement::DiagramSelected => state.diagram.is_some(),
            Requirement::InfractionAnswered => match &state.diagram {
                Some(diagram) => {
                    !catalog.requires_infraction_attribution(&diagram.diagram_id)
                        || diagram.infraction_response.is_some()
                }
                None => false,
            },
            Requirement::EvidenceCaptured => state.evidence.is_some(),
            Requirement::RoleSelected => state.role.is_some(),
            Requirement::IdentitySubmitted => match &state.identity {
                Some(identity) => identity.validated || state.pending_identity.is_some(),
                None => false,
            },
            Requirement::IdentityValidated => {
                state.identity.as_ref().map_or(false, |i| i.validated)
                    && state.vehicle_candidates.is_some()
            }
            Requirement::VehicleChosen => {
                matches!(state.vehicle, Some(VehicleSelection::Registry(_)))
            }
            Requirement::ContactCaptured => state.contact.is_some() && state.handoff.is_some(),
            Requirement::CounterpartyFinished => state.counterparty_completion.is_some(),
        }
    }
}

/// Remedy attached to a session that hit the third-party vehicle dead-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalBranch {
    /// Out-of-band action the driver must take
    pub remedy: String,
    /// When the dead-end was reached
    pub reached_at: DateTime<Utc>,
}

/// Where the session currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCursor {
    /// Active stage
    pub stage: Stage,
    /// Set once the session reached a dead-end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalBranch>,
    /// Bumped on every cursor move; async results compare against it
    pub revision: u64,
}

impl StageCursor {
    /// Cursor of a fresh session
    pub fn initial() -> Self {
        Self {
            stage: Stage::DiagramSelect,
            terminal: None,
            revision: 0,
        }
    }

    /// The same cursor moved to `stage`, with a new revision
    pub fn moved_to(&self, stage: Stage) -> Self {
        Self {
            stage,
            terminal: self.terminal.clone(),
            revision: self.revision + 1,
        }
    }
}

impl Default for StageCursor {
    fn default() -> Self {
        Self::initial()
    }
}

impl Artifact for StageCursor {
    const KEY: &'static str = "cursor";

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}
