//! Read model of a reporting session

use serde::{Deserialize, Serialize};

use crate::domain::artifacts::{
    ContactHandoff, CounterpartyCompletion, DiagramSelection, DispatchStatus, DriverIdentity,
    EvidenceBundle, HandoffRecord, InfractionResponse, LocationSource, PendingIdentity,
    RoleSelection, VehicleCandidates, VehicleSelection,
};
use crate::domain::session_store::SessionScope;
use crate::domain::stage::{Stage, StageCursor, TerminalBranch};
use crate::types::{DriverRole, SessionId};
use crate::CoreError;

/// Everything stored for one session, assembled from the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Session id
    pub session: SessionId,
    /// Active stage
    pub stage: Stage,
    /// Set once the session hit the third-party vehicle dead-end
    pub terminal: Option<TerminalBranch>,
    /// Cursor revision at load time
    pub revision: u64,
    /// Selected diagram
    pub diagram: Option<DiagramSelection>,
    /// Evidence bundle
    pub evidence: Option<EvidenceBundle>,
    /// Role of the reporting driver
    pub role: Option<DriverRole>,
    /// Identity of the reporting driver
    pub identity: Option<DriverIdentity>,
    /// Lookup result not yet confirmed
    pub pending_identity: Option<PendingIdentity>,
    /// Vehicles the driver may pick
    pub vehicle_candidates: Option<VehicleCandidates>,
    /// Vehicle selection
    pub vehicle: Option<VehicleSelection>,
    /// Contact data of the other driver
    pub contact: Option<ContactHandoff>,
    /// Invitation bookkeeping
    pub handoff: Option<HandoffRecord>,
    /// Completion signal of the other driver
    pub counterparty_completion: Option<CounterpartyCompletion>,
}

impl WorkflowState {
    /// Read every artifact of a session
    pub async fn load(scope: &SessionScope) -> Result<Self, CoreError> {
        let cursor = scope.load::<StageCursor>().await?.unwrap_or_default();
        Ok(Self {
            session: scope.session().clone(),
            stage: cursor.stage,
            terminal: cursor.terminal,
            revision: cursor.revision,
            diagram: scope.load().await?,
            evidence: scope.load().await?,
            role: scope.load::<RoleSelection>().await?.map(|r| r.role),
            identity: scope.load().await?,
            pending_identity: scope.load().await?,
            vehicle_candidates: scope.load().await?,
            vehicle: scope.load().await?,
            contact: scope.load().await?,
            handoff: scope.load().await?,
            counterparty_completion: scope.load().await?,
        })
    }

    /// The stage cursor this snapshot was taken at
    pub fn cursor(&self) -> StageCursor {
        StageCursor {
            stage: self.stage,
            terminal: self.terminal.clone(),
            revision: self.revision,
        }
    }

    /// Whether the session reached the third-party vehicle dead-end
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Condensed view for the review page
    pub fn summary(&self) -> ReportSummary {
        let vehicle = self.vehicle.as_ref().and_then(VehicleSelection::vehicle);
        ReportSummary {
            stage: self.stage,
            diagram_id: self.diagram.as_ref().map(|d| d.diagram_id.clone()),
            section_title: self.diagram.as_ref().map(|d| d.section_title.clone()),
            infraction_response: self.diagram.as_ref().and_then(|d| d.infraction_response),
            image_count: self.evidence.as_ref().map_or(0, |e| e.images.len()),
            description: self.evidence.as_ref().map(|e| e.description.clone()),
            address: self.evidence.as_ref().map(|e| e.location.address.clone()),
            location_from_gps: self
                .evidence
                .as_ref()
                .map(|e| e.location.source == LocationSource::Gps),
            driver_role: self.role,
            driver_name: self
                .identity
                .as_ref()
                .and_then(|i| i.personal_info.as_ref())
                .map(|p| format!("{} {}", p.name, p.last_name)),
            identity_validated: self.identity.as_ref().map_or(false, |i| i.validated),
            vehicle: vehicle.map(|v| format!("{} {} {} ({})", v.make, v.model, v.year, v.license_plate)),
            insurance: vehicle.map(|v| format!("{} - {}", v.insurance.company, v.insurance.policy_number)),
            other_vehicle: matches!(self.vehicle, Some(VehicleSelection::OtherVehicle)),
            counterparty_email: self.contact.as_ref().map(|c| c.counterparty_email.clone()),
            invitation_delivered: self
                .handoff
                .as_ref()
                .map(|h| h.dispatch == DispatchStatus::Delivered),
            counterparty_completed: self.counterparty_completion.is_some(),
        }
    }
}

/// Review-page view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Active stage
    pub stage: Stage,
    /// Selected diagram
    pub diagram_id: Option<String>,
    /// Section of the diagram
    pub section_title: Option<String>,
    /// Infraction answer
    pub infraction_response: Option<InfractionResponse>,
    /// Number of photos
    pub image_count: usize,
    /// Accident description
    pub description: Option<String>,
    /// Accident address
    pub address: Option<String>,
    /// Whether the address came from GPS
    pub location_from_gps: Option<bool>,
    /// Role of the reporting driver
    pub driver_role: Option<DriverRole>,
    /// Full name from the identity lookup
    pub driver_name: Option<String>,
    /// Whether the identity was confirmed
    pub identity_validated: bool,
    /// Vehicle label
    pub vehicle: Option<String>,
    /// Insurer and policy
    pub insurance: Option<String>,
    /// Whether the driver picked a vehicle outside the registry
    pub other_vehicle: bool,
    /// Where the invitation went
    pub counterparty_email: Option<String>,
    /// Whether the invitation was delivered
    pub invitation_delivered: Option<bool>,
    /// Whether the other driver finished
    pub counterparty_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifacts::{Insurance, LocationFix, PersonalInfo, Vehicle};
    use chrono::{NaiveDate, Utc};

    fn empty_state() -> WorkflowState {
        WorkflowState {
            session: SessionId::from("s1"),
            stage: Stage::DiagramSelect,
            terminal: None,
            revision: 0,
            diagram: None,
            evidence: None,
            role: None,
            identity: None,
            pending_identity: None,
            vehicle_candidates: None,
            vehicle: None,
            contact: None,
            handoff: None,
            counterparty_completion: None,
        }
    }

    #[test]
    fn test_summary_of_empty_session() {
        let summary = empty_state().summary();
        assert_eq!(summary.stage, Stage::DiagramSelect);
        assert!(summary.diagram_id.is_none());
        assert_eq!(summary.image_count, 0);
        assert!(!summary.identity_validated);
        assert!(!summary.other_vehicle);
        assert!(summary.invitation_delivered.is_none());
    }

    #[test]
    fn test_summary_labels() {
        let mut state = empty_state();
        state.stage = Stage::ContactCapture;
        state.evidence = Some(EvidenceBundle {
            images: vec![],
            description: "Vehicle A ran the red light".to_string(),
            location: LocationFix::gps(18.46, -66.10, "San Juan"),
            created_at: Utc::now(),
        });
        state.role = Some(DriverRole::A);
        state.identity = Some(
            DriverIdentity::unvalidated(
                DriverRole::A,
                "123456789",
                NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                "1234",
            )
            .into_validated(PersonalInfo {
                name: "Juan Carlos".to_string(),
                last_name: "Rodríguez Pérez".to_string(),
                address: "123 Calle Principal, San Juan, PR 00901".to_string(),
            }),
        );
        state.vehicle = Some(VehicleSelection::Registry(Vehicle {
            id: "1".to_string(),
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: "2020".to_string(),
            color: "Blanco".to_string(),
            license_plate: "GJD-433".to_string(),
            marbete_expiry: "Nov 2024".to_string(),
            insurance: Insurance {
                company: "Triple-S".to_string(),
                coverage: "Responsabilidad Civil".to_string(),
                policy_number: "TS-123456789".to_string(),
            },
        }));

        let summary = state.summary();
        assert_eq!(summary.driver_name.as_deref(), Some("Juan Carlos Rodríguez Pérez"));
        assert_eq!(summary.vehicle.as_deref(), Some("Toyota Camry 2020 (GJD-433)"));
        assert_eq!(summary.insurance.as_deref(), Some("Triple-S - TS-123456789"));
        assert_eq!(summary.address.as_deref(), Some("San Juan"));
        assert_eq!(summary.location_from_gps, Some(true));
        assert!(summary.identity_validated);
    }
}
