use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::geolocator::{Coordinates, GeolocationError, Geolocator, PositionOptions};
use crate::errors::ApiResult;
use crate::models::location::Location;

pub const REVERSE_GEOCODE_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";
pub const PRIMARY_IP_URL: &str = "https://ipapi.co/json/";
pub const SECONDARY_IP_URL: &str = "https://freeipapi.com/api/json";

#[derive(Debug, Clone, PartialEq)]
pub struct LocationEndpoints {
    pub reverse_geocode: String,
    pub primary_ip: String,
    pub secondary_ip: String,
}

impl Default for LocationEndpoints {
    fn default() -> Self {
        Self {
            reverse_geocode: REVERSE_GEOCODE_URL.to_string(),
            primary_ip: PRIMARY_IP_URL.to_string(),
            secondary_ip: SECONDARY_IP_URL.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseGeocodeResponse {
    #[serde(default)]
    country_name: Option<String>,
}

/// Response shape of the primary IP lookup service
#[derive(Deserialize)]
struct IpApiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    country_name: Option<String>,
}

/// Response shape of the secondary IP lookup service
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeIpApiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    country_name: Option<String>,
}

trait IpLookup: DeserializeOwned {
    fn into_location(self) -> Option<Location>;
}

impl IpLookup for IpApiResponse {
    fn into_location(self) -> Option<Location> {
        Some(Location::new(
            self.latitude?,
            self.longitude?,
            non_empty(self.country_name),
        ))
    }
}

impl IpLookup for FreeIpApiResponse {
    fn into_location(self) -> Option<Location> {
        Some(Location::new(
            self.latitude?,
            self.longitude?,
            non_empty(self.country_name),
        ))
    }
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.filter(|name| !name.trim().is_empty())
}

pub struct LocationResolver {
    client: Client,
    geolocator: Box<dyn Geolocator>,
    endpoints: LocationEndpoints,
    options: PositionOptions,
}

impl LocationResolver {
    pub fn new(geolocator: Box<dyn Geolocator>) -> ApiResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            geolocator,
            endpoints: LocationEndpoints::default(),
            options: PositionOptions::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: LocationEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the user's location; every failure degrades to fewer fields
    pub async fn resolve(&self) -> Location {
        match self.platform_position().await {
            Ok(coordinates) => {
                debug!(?coordinates, "Platform geolocation succeeded");
                return self.locate_coordinates(coordinates).await;
            }
            Err(err) => info!(error = %err, "Platform geolocation failed"),
        }

        self.ip_location().await
    }

    /// The platform lookup, bounded by the configured timeout
    async fn platform_position(&self) -> Result<Coordinates, GeolocationError> {
        timeout(
            self.options.timeout,
            self.geolocator.current_position(&self.options),
        )
        .await
        .unwrap_or(Err(GeolocationError::Timeout))
    }

    async fn locate_coordinates(&self, coordinates: Coordinates) -> Location {
        match self.reverse_geocode(coordinates).await {
            Ok(country) => Location::new(coordinates.latitude, coordinates.longitude, country),
            Err(err) => {
                warn!(error = %err, "Reverse geocoding failed");
                Location::new(coordinates.latitude, coordinates.longitude, None)
            }
        }
    }

    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoints.reverse_geocode)
            .query(&[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: ReverseGeocodeResponse = response.json().await?;
        Ok(non_empty(body.country_name))
    }

    async fn ip_location(&self) -> Location {
        match self.lookup_ip::<IpApiResponse>(&self.endpoints.primary_ip).await {
            Ok(location) => return location,
            Err(err) => info!(error = %err, "Primary IP geolocation failed"),
        }

        match self
            .lookup_ip::<FreeIpApiResponse>(&self.endpoints.secondary_ip)
            .await
        {
            Ok(location) => location,
            Err(err) => {
                warn!(error = %err, "All location sources failed, continuing without location");
                Location::default()
            }
        }
    }

    async fn lookup_ip<T: IpLookup>(&self, url: &str) -> Result<Location> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: T = response.json().await?;
        body.into_location()
            .ok_or_else(|| anyhow!("{} returned no coordinates", url))
    }
}
