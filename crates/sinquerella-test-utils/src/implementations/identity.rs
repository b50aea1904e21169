//! Identity lookup and vehicle registry fakes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use sinquerella_core::{
    CoreError, IdentityCredentials, IdentityRecord, IdentityVerifier, Vehicle, VehicleRegistry,
};

use crate::data_generators::{demo_identity_record, honda_civic, toyota_camry};

#[derive(Debug, Clone)]
enum LookupMode {
    Accept(IdentityRecord),
    Reject(String),
    Timeout,
}

/// Identity lookup that answers from fixture data
///
/// The default instance accepts any credentials and returns the demo driver,
/// the way the CESCO sandbox behaves.
#[derive(Debug)]
pub struct FakeIdentityVerifier {
    mode: LookupMode,
    calls: AtomicUsize,
    last_credentials: Mutex<Option<IdentityCredentials>>,
}

impl FakeIdentityVerifier {
    /// Accept every lookup with `record`
    pub fn accepting(record: IdentityRecord) -> Self {
        Self::with_mode(LookupMode::Accept(record))
    }

    /// Reject every lookup with `message`
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_mode(LookupMode::Reject(message.into()))
    }

    /// Never answer in time
    pub fn timing_out() -> Self {
        Self::with_mode(LookupMode::Timeout)
    }

    fn with_mode(mode: LookupMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            last_credentials: Mutex::new(None),
        }
    }

    /// Number of lookups performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Credentials of the latest lookup
    pub fn last_credentials(&self) -> Option<IdentityCredentials> {
        self.last_credentials.lock().clone()
    }
}

impl Default for FakeIdentityVerifier {
    fn default() -> Self {
        Self::accepting(demo_identity_record())
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentityVerifier {
    async fn verify(&self, credentials: &IdentityCredentials) -> Result<IdentityRecord, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_credentials.lock() = Some(credentials.clone());

        match &self.mode {
            LookupMode::Accept(record) => Ok(record.clone()),
            LookupMode::Reject(message) => Err(CoreError::collaborator("cesco", message.clone())),
            LookupMode::Timeout => Err(CoreError::CollaboratorTimeout("cesco".to_string())),
        }
    }
}

/// Identity lookup that holds every call until released
///
/// Lets a test move the session while a lookup is in flight.
#[derive(Debug, Default)]
pub struct GatedIdentityVerifier {
    inner: FakeIdentityVerifier,
    entered: Notify,
    release: Notify,
}

impl GatedIdentityVerifier {
    /// Gate in front of `inner`
    pub fn new(inner: FakeIdentityVerifier) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until a lookup is waiting at the gate
    pub async fn wait_for_lookup(&self) {
        self.entered.notified().await;
    }

    /// Let one waiting lookup answer
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Number of lookups that reached the gate
    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl IdentityVerifier for GatedIdentityVerifier {
    async fn verify(&self, credentials: &IdentityCredentials) -> Result<IdentityRecord, CoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.verify(credentials).await
    }
}

/// Vehicle registry keyed by license number
#[derive(Debug)]
pub struct FakeVehicleRegistry {
    vehicles: HashMap<String, Vec<Vehicle>>,
    fallback: Vec<Vehicle>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeVehicleRegistry {
    /// Registry with no vehicles at all
    pub fn empty() -> Self {
        Self {
            vehicles: HashMap::new(),
            fallback: Vec::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Registry that fails every query
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Register vehicles for one license
    pub fn with_vehicles(mut self, license_number: impl Into<String>, vehicles: Vec<Vehicle>) -> Self {
        self.vehicles.insert(license_number.into(), vehicles);
        self
    }

    /// Number of queries performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeVehicleRegistry {
    fn default() -> Self {
        Self {
            fallback: vec![toyota_camry(), honda_civic()],
            ..Self::empty()
        }
    }
}

#[async_trait]
impl VehicleRegistry for FakeVehicleRegistry {
    async fn vehicles_for(&self, license_number: &str) -> Result<Vec<Vehicle>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(CoreError::collaborator("vehicle-registry", message.clone()));
        }

        Ok(self
            .vehicles
            .get(license_number)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
