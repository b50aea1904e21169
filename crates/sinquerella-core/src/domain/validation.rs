//! Stage validators
//!
//! Pure checks, one per stage. A validator either hands back the normalized
//! value the stage will store or a set of field errors keyed by form field.
//! Invalid user input is never an `Err(CoreError)`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ValidationRules;
use crate::domain::artifacts::{ImageRef, LocationFix, LocationSource, VehicleCandidates, VehicleSelection};
use crate::domain::catalog::{DiagramCatalog, DiagramEntry};
use crate::domain::input::{ContactDraft, EvidenceDraft, IdentityCredentials, IdentityDraft, VehicleChoice};

/// Field name of the banner error shown when the identity lookup fails
pub const VALIDATION_BANNER_FIELD: &str = "validation";

/// Kind of validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationCode {
    /// No photos, or too many
    ImageCount,
    /// A file is not an image
    ImageType,
    /// A photo is too large
    ImageSize,
    /// Description too short or too long
    DescriptionLength,
    /// No usable location
    LocationMissing,
    /// Geolocation failed; the user should type the address
    LocationUnavailable,
    /// Coordinates are not finite or out of range
    LocationInvalid,
    /// A mandatory field is blank
    RequiredField,
    /// SSN digits malformed
    SSNFormat,
    /// Birth date malformed
    DateFormat,
    /// No vehicle picked
    VehicleRequired,
    /// Contact email or phone blank
    ContactRequired,
    /// Contact email malformed
    EmailFormat,
    /// Diagram id not in the catalog
    DiagramUnknown,
    /// The identity lookup did not confirm the driver
    IdentityNotVerified,
    /// The vehicle registry could not be queried
    VehicleLookupFailed,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One field error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Failure kind
    pub code: ValidationCode,
    /// Message for the user
    pub message: String,
}

/// Field errors of one submission, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, FieldError>);

impl FieldErrors {
    /// No errors
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error
    pub fn single(field: &str, code: ValidationCode, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, code, message);
        errors
    }

    /// Record an error; the first error recorded for a field wins
    pub fn insert(&mut self, field: &str, code: ValidationCode, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| FieldError {
            code,
            message: message.into(),
        });
    }

    /// Whether the submission passed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields in error
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Error attached to a field
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    /// Whether any field failed with `code`
    pub fn has_code(&self, code: ValidationCode) -> bool {
        self.0.values().any(|e| e.code == code)
    }

    /// Iterate over `(field, error)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `Ok(value)` when empty, otherwise the errors
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Check a diagram pick against the catalog
pub fn validate_diagram(catalog: &DiagramCatalog, diagram_id: &str) -> Result<DiagramEntry, FieldErrors> {
    catalog.lookup(diagram_id.trim()).ok_or_else(|| {
        FieldErrors::single("diagramId", ValidationCode::DiagramUnknown, "Diagrama no reconocido")
    })
}

/// Evidence that passed validation, description trimmed
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedEvidence {
    /// Photos in upload order
    pub images: Vec<ImageRef>,
    /// Trimmed description
    pub description: String,
    /// Location fix
    pub location: LocationFix,
}

/// Check the evidence form
pub fn validate_evidence(rules: &ValidationRules, draft: &EvidenceDraft) -> Result<CheckedEvidence, FieldErrors> {
    let mut errors = FieldErrors::new();

    if draft.images.is_empty() {
        errors.insert(
            "images",
            ValidationCode::ImageCount,
            "Debes subir al menos 1 imagen del accidente",
        );
    } else if draft.images.len() > rules.max_images {
        errors.insert(
            "images",
            ValidationCode::ImageCount,
            format!("Máximo {} imágenes permitidas", rules.max_images),
        );
    } else if draft.images.iter().any(|image| !image.is_image()) {
        errors.insert(
            "images",
            ValidationCode::ImageType,
            "Solo se permiten archivos de imagen",
        );
    } else if draft.images.iter().any(|image| image.size_bytes > rules.max_image_bytes) {
        errors.insert(
            "images",
            ValidationCode::ImageSize,
            format!(
                "Las imágenes deben ser menores a {}MB",
                rules.max_image_bytes / (1024 * 1024)
            ),
        );
    }

    let description = draft.description.trim();
    let length = description.chars().count();
    if length == 0 {
        errors.insert(
            "description",
            ValidationCode::DescriptionLength,
            "La descripción es obligatoria",
        );
    } else if length < rules.description_min_chars {
        errors.insert(
            "description",
            ValidationCode::DescriptionLength,
            format!(
                "La descripción debe tener al menos {} caracteres",
                rules.description_min_chars
            ),
        );
    } else if length > rules.description_max_chars {
        errors.insert(
            "description",
            ValidationCode::DescriptionLength,
            format!(
                "La descripción no puede exceder {} caracteres",
                rules.description_max_chars
            ),
        );
    }

    let location = match &draft.location {
        Some(fix) if fix.address.trim().is_empty() => None,
        Some(fix) if fix.source == LocationSource::Manual => Some(LocationFix::manual(fix.address.trim())),
        Some(fix) if !valid_coordinates(fix.latitude, fix.longitude) => {
            errors.insert(
                "location",
                ValidationCode::LocationInvalid,
                "La ubicación del GPS no es válida. Ingresa la dirección manualmente.",
            );
            None
        }
        Some(fix) => Some(fix.clone()),
        None => None,
    };
    if location.is_none() && errors.get("location").is_none() {
        errors.insert(
            "location",
            ValidationCode::LocationMissing,
            "Debes proporcionar la ubicación del accidente",
        );
    }

    match location {
        Some(location) if errors.is_empty() => Ok(CheckedEvidence {
            images: draft.images.clone(),
            description: description.to_string(),
            location,
        }),
        _ => Err(errors),
    }
}

/// Whether a GPS reading is a finite point on the globe
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && latitude.abs() <= 90.0
        && longitude.abs() <= 180.0
}

/// Turn a typed address into a manual location fix
pub fn validate_manual_address(address: &str) -> Result<LocationFix, FieldErrors> {
    let address = address.trim();
    if address.is_empty() {
        return Err(FieldErrors::single(
            "location",
            ValidationCode::LocationMissing,
            "Debes proporcionar la ubicación del accidente",
        ));
    }
    Ok(LocationFix::manual(address))
}

/// Check the identification form
pub fn validate_identity(rules: &ValidationRules, draft: &IdentityDraft) -> Result<IdentityCredentials, FieldErrors> {
    let mut errors = FieldErrors::new();

    let license_number = draft.license_number.trim();
    if license_number.is_empty() {
        errors.insert(
            "licenseNumber",
            ValidationCode::RequiredField,
            "El número de licencia es obligatorio",
        );
    }

    let birth_date = draft.birth_date.trim();
    let parsed_birth_date = if birth_date.is_empty() {
        errors.insert(
            "birthDate",
            ValidationCode::RequiredField,
            "La fecha de nacimiento es obligatoria",
        );
        None
    } else {
        match NaiveDate::parse_from_str(birth_date, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.insert(
                    "birthDate",
                    ValidationCode::DateFormat,
                    "La fecha de nacimiento debe tener el formato AAAA-MM-DD",
                );
                None
            }
        }
    };

    let ssn = draft.ssn_last4.trim();
    if ssn.is_empty() {
        errors.insert(
            "ssnLast4",
            ValidationCode::RequiredField,
            "Los últimos dígitos del seguro social son obligatorios",
        );
    } else if ssn.chars().count() != rules.ssn_digits || !ssn.chars().all(|c| c.is_ascii_digit()) {
        errors.insert(
            "ssnLast4",
            ValidationCode::SSNFormat,
            format!(
                "Debe ingresar exactamente {} dígitos del seguro social",
                rules.ssn_digits
            ),
        );
    }

    match parsed_birth_date {
        Some(birth_date) if errors.is_empty() => Ok(IdentityCredentials {
            license_number: license_number.to_string(),
            birth_date,
            ssn_last4: ssn.to_string(),
        }),
        _ => Err(errors),
    }
}

/// Check the vehicle pick against the confirmed candidates
pub fn validate_vehicle(
    choice: &VehicleChoice,
    candidates: Option<&VehicleCandidates>,
) -> Result<VehicleSelection, FieldErrors> {
    let required = || {
        FieldErrors::single("vehicle", ValidationCode::VehicleRequired, "Debe seleccionar un vehículo")
    };

    match choice {
        VehicleChoice::Other => Ok(VehicleSelection::OtherVehicle),
        VehicleChoice::None => Err(required()),
        VehicleChoice::Registry(vehicle_id) => candidates
            .and_then(|c| c.find(vehicle_id))
            .cloned()
            .map(VehicleSelection::Registry)
            .ok_or_else(required),
    }
}

/// Contact data that passed validation, trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedContact {
    /// Email of the other driver
    pub email: String,
    /// Phone of the other driver
    pub phone: String,
}

/// Check the contact form
pub fn validate_contact(draft: &ContactDraft) -> Result<CheckedContact, FieldErrors> {
    let mut errors = FieldErrors::new();
    let email = draft.email.trim();
    let phone = draft.phone.trim();

    if email.is_empty() {
        errors.insert("email", ValidationCode::ContactRequired, "Email y teléfono son obligatorios");
    } else if !looks_like_email(email) {
        errors.insert("email", ValidationCode::EmailFormat, "El email no es válido");
    }

    if phone.is_empty() {
        errors.insert("phone", ValidationCode::ContactRequired, "Email y teléfono son obligatorios");
    }

    errors.into_result(CheckedContact {
        email: email.to_string(),
        phone: phone.to_string(),
    })
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
