//! Accident location lookup
//!
//! A GPS reading younger than the acceptable age is reused from the session;
//! otherwise the device is asked again, bounded by the geolocation timeout.
//! Reverse geocoding never blocks: on failure the address is the coordinate
//! string.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::domain::artifacts::{LocationFix, PositionReading};
use crate::domain::collaborators::{GeoPoint, PositionProvider, ReverseGeocoder};
use crate::domain::session_store::{SessionScope, SessionStore};
use crate::domain::validation::{self, FieldErrors, ValidationCode};
use crate::types::SessionId;
use crate::CoreError;

/// Message shown when no GPS fix could be obtained
pub const LOCATION_UNAVAILABLE_MESSAGE: &str =
    "No se pudo obtener la ubicación. Intenta ingresar la dirección manualmente.";

/// Result of a GPS location request
#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    /// A fix with a resolved (or fallback) address
    Located(LocationFix),
    /// No position; the user should type the address
    Unavailable(FieldErrors),
}

/// Produces accident location fixes
#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn PositionProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    timeout: Duration,
    max_age: Duration,
}

impl LocationService {
    /// Create a location service with the configured bounds
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn PositionProvider>,
        geocoder: Arc<dyn ReverseGeocoder>,
        config: &WorkflowConfig,
    ) -> Self {
        Self {
            store,
            provider,
            geocoder,
            timeout: config.geolocation_timeout(),
            max_age: config.position_max_age(),
        }
    }

    /// Locate the device and resolve its address
    pub async fn locate(&self, session: &SessionId) -> Result<LocationOutcome, CoreError> {
        let scope = SessionScope::new(self.store.clone(), session.clone());

        let point = match self.cached_position(&scope).await? {
            Some(point) => {
                debug!(session = %session, "Reusing cached position");
                point
            }
            None => match self.fresh_position(&scope).await? {
                Some(point) => point,
                None => {
                    return Ok(LocationOutcome::Unavailable(FieldErrors::single(
                        "location",
                        ValidationCode::LocationUnavailable,
                        LOCATION_UNAVAILABLE_MESSAGE,
                    )))
                }
            },
        };

        let address = match self
            .geocoder
            .reverse_geocode(point.latitude, point.longitude)
            .await
        {
            Ok(address) if !address.trim().is_empty() => address.trim().to_string(),
            Ok(_) => LocationFix::coordinates_label(point.latitude, point.longitude),
            Err(err) => {
                debug!(session = %session, error = %err, "Reverse geocoding failed, using coordinates");
                LocationFix::coordinates_label(point.latitude, point.longitude)
            }
        };

        Ok(LocationOutcome::Located(LocationFix::gps(
            point.latitude,
            point.longitude,
            address,
        )))
    }

    /// Build a fix from a typed address
    pub fn manual(&self, address: &str) -> Result<LocationFix, FieldErrors> {
        validation::validate_manual_address(address)
    }

    async fn cached_position(&self, scope: &SessionScope) -> Result<Option<GeoPoint>, CoreError> {
        let reading = match scope.load::<PositionReading>().await? {
            Some(reading) => reading,
            None => return Ok(None),
        };

        let age = Utc::now()
            .signed_duration_since(reading.captured_at)
            .to_std()
            .unwrap_or_default();
        if age > self.max_age {
            return Ok(None);
        }

        Ok(Some(GeoPoint {
            latitude: reading.latitude,
            longitude: reading.longitude,
        }))
    }

    async fn fresh_position(&self, scope: &SessionScope) -> Result<Option<GeoPoint>, CoreError> {
        let point = match tokio::time::timeout(self.timeout, self.provider.current_position()).await {
            Ok(Ok(point)) if validation::valid_coordinates(point.latitude, point.longitude) => point,
            Ok(Ok(point)) => {
                warn!(
                    session = %scope.session(),
                    latitude = point.latitude,
                    longitude = point.longitude,
                    "Geolocation returned an invalid position"
                );
                return Ok(None);
            }
            Ok(Err(err)) => {
                warn!(session = %scope.session(), error = %err, "Geolocation failed");
                return Ok(None);
            }
            Err(_) => {
                warn!(
                    session = %scope.session(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Geolocation timed out"
                );
                return Ok(None);
            }
        };

        let reading = PositionReading {
            latitude: point.latitude,
            longitude: point.longitude,
            captured_at: Utc::now(),
        };
        scope
            .save_with_ttl(&reading, self.max_age.as_millis() as u64)
            .await?;
        info!(session = %scope.session(), "Fresh position acquired");

        Ok(Some(point))
    }
}
