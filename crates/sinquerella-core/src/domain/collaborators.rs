//! Capability interfaces for external collaborators
//!
//! The workflow never talks to devices, CESCO, the vehicle registry, a
//! mailer or a PDF engine directly. It goes through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::artifacts::{IdentityRecord, InfractionResponse, Vehicle};
use crate::domain::input::IdentityCredentials;
use crate::domain::state::WorkflowState;
use crate::types::{DriverRole, SessionId};
use crate::CoreError;

/// A raw device position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Device geolocation
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Ask the device for its current position
    async fn current_position(&self) -> Result<GeoPoint, CoreError>;
}

/// Coordinates to street address
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolve an address for the given coordinates
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<String, CoreError>;
}

/// Identity validation lookup ("CESCO")
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Look up the license holder; `Err` means the identity was not confirmed
    async fn verify(&self, credentials: &IdentityCredentials) -> Result<IdentityRecord, CoreError>;
}

/// Vehicle registry lookup keyed by a validated identity
#[async_trait]
pub trait VehicleRegistry: Send + Sync {
    /// Vehicles registered to the license holder
    async fn vehicles_for(&self, license_number: &str) -> Result<Vec<Vehicle>, CoreError>;
}

/// What the other driver receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPayload {
    /// Session the other driver must join
    pub session: SessionId,
    /// Role of the driver who started the report
    pub inviting_role: DriverRole,
    /// Role the invited driver will fill in
    pub counterparty_role: DriverRole,
    /// Diagram of the accident
    pub diagram_id: String,
    /// Infraction answer, if the diagram asked for one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infraction_response: Option<InfractionResponse>,
    /// Where the accident happened
    pub accident_address: String,
    /// When the invitation was produced
    pub invited_at: DateTime<Utc>,
}

/// Invitation delivery (email / SMS)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the invitation; `Ok` is the delivery acknowledgement
    async fn dispatch(&self, email: &str, phone: &str, payload: &InvitationPayload) -> Result<(), CoreError>;
}

/// A rendered report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    /// Suggested file name
    pub file_name: String,
    /// Media type of `content`
    pub media_type: String,
    /// Document bytes
    pub content: Vec<u8>,
}

/// Merges both halves of the report into a document
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render the final report
    async fn render(&self, state: &WorkflowState) -> Result<ReportDocument, CoreError>;
}
