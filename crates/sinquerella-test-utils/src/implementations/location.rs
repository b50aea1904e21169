//! Geolocation and reverse geocoding fakes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sinquerella_core::{CoreError, GeoPoint, PositionProvider, ReverseGeocoder};

#[derive(Debug, Clone)]
enum PositionMode {
    Fixed(GeoPoint),
    Failing(String),
    Delayed(GeoPoint, Duration),
}

/// Position provider with a scripted answer
#[derive(Debug)]
pub struct FakePositionProvider {
    mode: PositionMode,
    calls: AtomicUsize,
}

impl FakePositionProvider {
    /// Always answers with the given coordinates
    pub fn fixed(latitude: f64, longitude: f64) -> Self {
        Self::with_mode(PositionMode::Fixed(GeoPoint { latitude, longitude }))
    }

    /// Always fails, as when the user denies the permission
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(PositionMode::Failing(message.into()))
    }

    /// Answers after `delay`
    pub fn delayed(latitude: f64, longitude: f64, delay: Duration) -> Self {
        Self::with_mode(PositionMode::Delayed(GeoPoint { latitude, longitude }, delay))
    }

    fn with_mode(mode: PositionMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the device was asked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakePositionProvider {
    fn default() -> Self {
        Self::fixed(18.4655, -66.1057)
    }
}

#[async_trait]
impl PositionProvider for FakePositionProvider {
    async fn current_position(&self) -> Result<GeoPoint, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            PositionMode::Fixed(point) => Ok(*point),
            PositionMode::Failing(message) => Err(CoreError::collaborator("geolocation", message.clone())),
            PositionMode::Delayed(point, delay) => {
                tokio::time::sleep(*delay).await;
                Ok(*point)
            }
        }
    }
}

/// Reverse geocoder with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct FakeGeocoder {
    address: Option<String>,
}

impl FakeGeocoder {
    /// Resolves every point to `address`
    pub fn resolving(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }

    /// Fails for every point
    pub fn failing() -> Self {
        Self { address: None }
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn reverse_geocode(&self, _latitude: f64, _longitude: f64) -> Result<String, CoreError> {
        self.address
            .clone()
            .ok_or_else(|| CoreError::collaborator("geocoder", "no results for coordinates"))
    }
}
