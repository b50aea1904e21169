//! Artifacts produced by the reporting stages
//!
//! Every artifact is written whole to the session store under its own key and
//! is only ever superseded by another write, never patched in place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::types::DriverRole;

/// A value persisted in the session store under a fixed key
pub trait Artifact: Serialize + DeserializeOwned + Send + Sync {
    /// Session store key
    const KEY: &'static str;

    /// Whether two artifacts carry the same user-provided content,
    /// ignoring bookkeeping such as timestamps
    fn same_content(&self, other: &Self) -> bool;
}

/// Answer to the infraction question for signal-controlled intersections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfractionResponse {
    /// Vehicle "A" ran the light
    #[serde(rename = "vehicle-a")]
    VehicleA,
    /// Vehicle "B" ran the light
    #[serde(rename = "vehicle-b")]
    VehicleB,
    /// Nobody committed an infraction, or it does not apply
    #[serde(rename = "none")]
    None,
}

/// The selected accident-type diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSelection {
    /// Diagram id, e.g. `IV-2`
    pub diagram_id: String,
    /// Section the diagram belongs to
    pub section_id: u8,
    /// Title of that section
    pub section_title: String,
    /// Only present for branch diagrams, once the sub-decision was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infraction_response: Option<InfractionResponse>,
    /// When the diagram was picked
    pub selected_at: DateTime<Utc>,
}

impl Artifact for DiagramSelection {
    const KEY: &'static str = "diagram";

    fn same_content(&self, other: &Self) -> bool {
        self.diagram_id == other.diagram_id
            && self.infraction_response == other.infraction_response
    }
}

/// Reference to an uploaded accident photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Original file name
    pub file_name: String,
    /// Declared media type, e.g. `image/jpeg`
    pub media_type: String,
    /// File size in bytes
    pub size_bytes: u64,
}

impl ImageRef {
    /// Create a new image reference
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            size_bytes,
        }
    }

    /// Whether the media type is an image type
    #[inline]
    pub fn is_image(&self) -> bool {
        self.media_type.trim().to_ascii_lowercase().starts_with("image/")
    }
}

/// Where a location fix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Device geolocation
    Gps,
    /// Address typed by the user
    Manual,
}

/// Location of the accident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Origin of the fix
    pub source: LocationSource,
    /// Latitude, `0.0` for manual fixes
    pub latitude: f64,
    /// Longitude, `0.0` for manual fixes
    pub longitude: f64,
    /// Human-readable address
    pub address: String,
}

impl LocationFix {
    /// A GPS fix with its resolved address
    pub fn gps(latitude: f64, longitude: f64, address: impl Into<String>) -> Self {
        Self {
            source: LocationSource::Gps,
            latitude,
            longitude,
            address: address.into(),
        }
    }

    /// A manually entered address; coordinates are the (0,0) sentinel
    pub fn manual(address: impl Into<String>) -> Self {
        Self {
            source: LocationSource::Manual,
            latitude: 0.0,
            longitude: 0.0,
            address: address.into(),
        }
    }

    /// Coordinates rendered the way the geocoding fallback does
    pub fn coordinates_label(latitude: f64, longitude: f64) -> String {
        format!("{:.6}, {:.6}", latitude, longitude)
    }
}

/// Photos, description and location of the accident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    /// Photos in upload order
    pub images: Vec<ImageRef>,
    /// Trimmed free-text description
    pub description: String,
    /// Where it happened
    pub location: LocationFix,
    /// When the evidence was submitted
    pub created_at: DateTime<Utc>,
}

impl Artifact for EvidenceBundle {
    const KEY: &'static str = "accidentReport";

    fn same_content(&self, other: &Self) -> bool {
        self.images == other.images
            && self.description == other.description
            && self.location == other.location
    }
}

/// The role the reporting driver picked on the diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSelection {
    /// Chosen role
    pub role: DriverRole,
    /// When it was chosen
    pub selected_at: DateTime<Utc>,
}

impl Artifact for RoleSelection {
    const KEY: &'static str = "driverRole";

    fn same_content(&self, other: &Self) -> bool {
        self.role == other.role
    }
}

/// Personal data returned by the identity validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    /// Given name(s)
    pub name: String,
    /// Family name(s)
    pub last_name: String,
    /// Postal address
    pub address: String,
}

/// Identity of the reporting driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverIdentity {
    /// Role on the diagram
    pub role: DriverRole,
    /// Driver license number
    pub license_number: String,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Last four digits of the social security number
    pub ssn_last4: String,
    /// True only after a confirmed identity lookup
    pub validated: bool,
    /// Set together with `validated`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
}

impl DriverIdentity {
    /// Credentials that were submitted but not yet validated
    pub fn unvalidated(
        role: DriverRole,
        license_number: impl Into<String>,
        birth_date: NaiveDate,
        ssn_last4: impl Into<String>,
    ) -> Self {
        Self {
            role,
            license_number: license_number.into(),
            birth_date,
            ssn_last4: ssn_last4.into(),
            validated: false,
            personal_info: None,
        }
    }

    /// The same credentials, marked validated with the looked-up personal data
    pub fn into_validated(self, personal_info: PersonalInfo) -> Self {
        Self {
            validated: true,
            personal_info: Some(personal_info),
            ..self
        }
    }

    /// Whether the credentials match, ignoring validation status
    pub fn same_credentials(&self, other: &Self) -> bool {
        self.role == other.role
            && self.license_number == other.license_number
            && self.birth_date == other.birth_date
            && self.ssn_last4 == other.ssn_last4
    }
}

impl Artifact for DriverIdentity {
    const KEY: &'static str = "driverIdentity";

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// Insurance attached to a registered vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    /// Insurer name
    pub company: String,
    /// Coverage type
    pub coverage: String,
    /// Policy number
    pub policy_number: String,
}

/// A vehicle from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Registry id
    pub id: String,
    /// Manufacturer
    pub make: String,
    /// Model
    pub model: String,
    /// Model year
    pub year: String,
    /// Color
    pub color: String,
    /// License plate ("tablilla")
    pub license_plate: String,
    /// Registration sticker ("marbete") expiry
    pub marbete_expiry: String,
    /// Insurance
    pub insurance: Insurance,
}

/// Result of a successful identity lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Personal data of the license holder
    pub personal_info: PersonalInfo,
    /// Vehicles registered to the license holder
    pub vehicles: Vec<Vehicle>,
}

/// Lookup result waiting for the driver to confirm it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIdentity {
    /// What the lookup returned
    pub record: IdentityRecord,
    /// When the lookup answered
    pub looked_up_at: DateTime<Utc>,
}

impl Artifact for PendingIdentity {
    const KEY: &'static str = "pendingIdentity";

    fn same_content(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

/// Vehicles the driver may choose from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCandidates {
    /// Candidate vehicles in registry order
    pub vehicles: Vec<Vehicle>,
}

impl VehicleCandidates {
    /// Find a candidate by registry id
    pub fn find(&self, vehicle_id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == vehicle_id)
    }
}

impl Artifact for VehicleCandidates {
    const KEY: &'static str = "vehicleCandidates";

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// The vehicle the driver was driving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "vehicle", rename_all = "camelCase")]
pub enum VehicleSelection {
    /// A vehicle registered to the driver
    Registry(Vehicle),
    /// A vehicle not registered to the driver; ends the digital flow
    OtherVehicle,
}

impl VehicleSelection {
    /// The registry vehicle, if any
    pub fn vehicle(&self) -> Option<&Vehicle> {
        match self {
            VehicleSelection::Registry(vehicle) => Some(vehicle),
            VehicleSelection::OtherVehicle => None,
        }
    }
}

impl Artifact for VehicleSelection {
    const KEY: &'static str = "vehicle";

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// Contact data of the other driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactHandoff {
    /// Role of the other driver
    pub counterparty_role: DriverRole,
    /// Where the invitation goes
    pub counterparty_email: String,
    /// Phone of the other driver
    pub counterparty_phone: String,
    /// When the contact was captured
    pub captured_at: DateTime<Utc>,
}

impl Artifact for ContactHandoff {
    const KEY: &'static str = "contact";

    fn same_content(&self, other: &Self) -> bool {
        self.counterparty_role == other.counterparty_role
            && self.counterparty_email == other.counterparty_email
            && self.counterparty_phone == other.counterparty_phone
    }
}

/// Outcome of the last invitation dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DispatchStatus {
    /// The notifier acknowledged the invitation
    Delivered,
    /// The notifier failed; the invitation can be retried
    Failed {
        /// Failure description
        reason: String,
    },
}

/// Bookkeeping of the invitation sent to the other driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    /// Last dispatch outcome
    pub dispatch: DispatchStatus,
    /// Number of dispatch attempts
    pub attempts: u32,
    /// When the last attempt finished
    pub last_attempt_at: DateTime<Utc>,
}

impl HandoffRecord {
    /// Whether the last attempt failed
    #[inline]
    pub fn needs_retry(&self) -> bool {
        matches!(self.dispatch, DispatchStatus::Failed { .. })
    }
}

impl Artifact for HandoffRecord {
    const KEY: &'static str = "handoff";

    fn same_content(&self, other: &Self) -> bool {
        self.dispatch == other.dispatch && self.attempts == other.attempts
    }
}

/// Signal that the other driver finished their half of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyCompletion {
    /// When the signal arrived
    pub received_at: DateTime<Utc>,
}

impl Artifact for CounterpartyCompletion {
    const KEY: &'static str = "counterpartyCompletion";

    fn same_content(&self, _other: &Self) -> bool {
        true
    }
}

/// Raw device position, cached for reuse within the acceptable age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReading {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
    /// When the device produced the reading
    pub captured_at: DateTime<Utc>,
}

impl Artifact for PositionReading {
    const KEY: &'static str = "lastPosition";

    fn same_content(&self, other: &Self) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

impl fmt::Display for InfractionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfractionResponse::VehicleA => f.write_str("vehicle-a"),
            InfractionResponse::VehicleB => f.write_str("vehicle-b"),
            InfractionResponse::None => f.write_str("none"),
        }
    }
}
