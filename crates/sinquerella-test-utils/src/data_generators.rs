//! Test data generators for the Sin Querella workflow.
//!
//! The identity and vehicle data mirror what the CESCO sandbox returns for
//! its demo driver.

use sinquerella_core::{
    ContactDraft, EvidenceDraft, IdentityDraft, IdentityRecord, ImageRef, Insurance, LocationFix,
    PersonalInfo, Vehicle,
};

/// License number accepted by the demo identity lookup
pub const DEMO_LICENSE: &str = "123456789";
/// Birth date of the demo driver
pub const DEMO_BIRTH_DATE: &str = "1990-01-01";
/// SSN digits of the demo driver
pub const DEMO_SSN_LAST4: &str = "1234";
/// Email of the other driver used in the happy path
pub const COUNTERPARTY_EMAIL: &str = "b@example.com";
/// Phone of the other driver used in the happy path
pub const COUNTERPARTY_PHONE: &str = "787-000-0000";

/// Personal data of the demo driver
pub fn demo_personal_info() -> PersonalInfo {
    PersonalInfo {
        name: "Juan Carlos".to_string(),
        last_name: "Rodríguez Pérez".to_string(),
        address: "123 Calle Principal, San Juan, PR 00901".to_string(),
    }
}

/// First vehicle registered to the demo driver
pub fn toyota_camry() -> Vehicle {
    Vehicle {
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
    }
}

/// Second vehicle registered to the demo driver
pub fn honda_civic() -> Vehicle {
    Vehicle {
        id: "2".to_string(),
        make: "Honda".to_string(),
        model: "Civic".to_string(),
        year: "2018".to_string(),
        color: "Azul".to_string(),
        license_plate: "ABC-789".to_string(),
        marbete_expiry: "Dic 2024".to_string(),
        insurance: Insurance {
            company: "MAPFRE".to_string(),
            coverage: "Comprensiva".to_string(),
            policy_number: "MP-987654321".to_string(),
        },
    }
}

/// Full lookup result for the demo driver
pub fn demo_identity_record() -> IdentityRecord {
    IdentityRecord {
        personal_info: demo_personal_info(),
        vehicles: vec![toyota_camry(), honda_civic()],
    }
}

/// `n` JPEG photos of `size_bytes` each
pub fn photos(n: usize, size_bytes: u64) -> Vec<ImageRef> {
    (1..=n)
        .map(|i| ImageRef::new(format!("foto-{}.jpg", i), "image/jpeg", size_bytes))
        .collect()
}

/// A GPS fix in Old San Juan
pub fn san_juan_fix() -> LocationFix {
    LocationFix::gps(18.4655, -66.1057, "Calle Fortaleza, San Juan, PR")
}

/// Evidence form that passes validation
pub fn evidence_draft() -> EvidenceDraft {
    EvidenceDraft {
        images: photos(2, 1024 * 1024),
        description: "El vehículo A cruzó con la luz roja en la intersección.".to_string(),
        location: Some(san_juan_fix()),
    }
}

/// Identification form of the demo driver
pub fn identity_draft() -> IdentityDraft {
    IdentityDraft {
        license_number: DEMO_LICENSE.to_string(),
        birth_date: DEMO_BIRTH_DATE.to_string(),
        ssn_last4: DEMO_SSN_LAST4.to_string(),
    }
}

/// Contact form of the other driver
pub fn contact_draft() -> ContactDraft {
    ContactDraft {
        email: COUNTERPARTY_EMAIL.to_string(),
        phone: COUNTERPARTY_PHONE.to_string(),
    }
}
