use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// How long to wait for a position before giving up
    pub timeout: Duration,
    /// How old a previously obtained position may be and still be reused
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("Geolocation permission denied")]
    PermissionDenied,

    #[error("Timed out waiting for a position")]
    Timeout,

    #[error("Geolocation is not supported")]
    Unsupported,
}

/// The platform's geolocation capability
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError>;
}

/// Platform without geolocation, the normal case for a terminal
pub struct Unsupported;

#[async_trait]
impl Geolocator for Unsupported {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// A position supplied up front, e.g. from configuration
pub struct FixedPosition {
    coordinates: Coordinates,
}

impl FixedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: Coordinates::new(latitude, longitude),
        }
    }
}

#[async_trait]
impl Geolocator for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Ok(self.coordinates)
    }
}

/// Reuses the last fix from `inner` while it is younger than `maximum_age`
pub struct CachedPosition<G> {
    inner: G,
    last_fix: Mutex<Option<(Instant, Coordinates)>>,
}

impl<G: Geolocator> CachedPosition<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            last_fix: Mutex::new(None),
        }
    }

    fn cached(&self, maximum_age: Duration) -> Option<Coordinates> {
        let last_fix = *self.last_fix.lock().ok()?;
        last_fix
            .filter(|(taken_at, _)| taken_at.elapsed() <= maximum_age)
            .map(|(_, coordinates)| coordinates)
    }
}

#[async_trait]
impl<G: Geolocator> Geolocator for CachedPosition<G> {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        if let Some(coordinates) = self.cached(options.maximum_age) {
            return Ok(coordinates);
        }

        let coordinates = self.inner.current_position(options).await?;
        if let Ok(mut last_fix) = self.last_fix.lock() {
            *last_fix = Some((Instant::now(), coordinates));
        }
        Ok(coordinates)
    }
}
