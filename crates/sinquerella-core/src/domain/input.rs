//! Candidate inputs submitted to the stages
//!
//! Inputs are what the user typed or picked. They become artifacts only after
//! the stage validator accepted them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::artifacts::{ImageRef, InfractionResponse, LocationFix};
use crate::domain::stage::Stage;
use crate::types::DriverRole;

/// Evidence form as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceDraft {
    /// Photos in upload order
    #[serde(default)]
    pub images: Vec<ImageRef>,
    /// Free-text description, untrimmed
    #[serde(default)]
    pub description: String,
    /// Location, if one was obtained
    #[serde(default)]
    pub location: Option<LocationFix>,
}

/// Driver identification form as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDraft {
    /// License number
    #[serde(default)]
    pub license_number: String,
    /// Birth date as `YYYY-MM-DD`
    #[serde(default)]
    pub birth_date: String,
    /// Last four SSN digits
    #[serde(default)]
    pub ssn_last4: String,
}

/// Credentials that passed field validation, as sent to the identity lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCredentials {
    /// License number
    pub license_number: String,
    /// Birth date
    pub birth_date: NaiveDate,
    /// Last four SSN digits
    pub ssn_last4: String,
}

/// Vehicle form as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "vehicleId", rename_all = "camelCase")]
pub enum VehicleChoice {
    /// A candidate vehicle by registry id
    Registry(String),
    /// "Otro vehículo": not registered to the driver
    Other,
    /// Submitted without picking anything
    None,
}

/// Contact form as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    /// Email of the other driver
    #[serde(default)]
    pub email: String,
    /// Phone of the other driver
    #[serde(default)]
    pub phone: String,
}

/// Input for [`crate::WorkflowController::advance`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StageInput {
    /// Diagram pick
    Diagram {
        /// Diagram id
        #[serde(rename = "diagramId")]
        diagram_id: String,
    },
    /// Infraction attribution answer
    Infraction {
        /// Who ran the light
        response: InfractionResponse,
    },
    /// Evidence form
    Evidence(EvidenceDraft),
    /// Driver role pick
    Role {
        /// Chosen role
        role: DriverRole,
    },
    /// Identification form
    Identify(IdentityDraft),
    /// Confirmation of the displayed lookup result
    ConfirmIdentity,
    /// Vehicle form
    Vehicle(VehicleChoice),
    /// Contact form
    Contact(ContactDraft),
    /// The other driver finished their half
    CounterpartyCompleted,
}

impl StageInput {
    /// The stage this input belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StageInput::Diagram { .. } => Stage::DiagramSelect,
            StageInput::Infraction { .. } => Stage::InfractionAttribution,
            StageInput::Evidence(_) => Stage::EvidenceCapture,
            StageInput::Role { .. } => Stage::DriverRoleSelect,
            StageInput::Identify(_) => Stage::DriverIdentify,
            StageInput::ConfirmIdentity => Stage::IdentityValidate,
            StageInput::Vehicle(_) => Stage::VehicleSelect,
            StageInput::Contact(_) => Stage::ContactCapture,
            StageInput::CounterpartyCompleted => Stage::HandoffSent,
        }
    }
}
