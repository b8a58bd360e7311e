use crate::error::{to_env_var, ConfigError};
use anyhow::Result;
use config::{Config, Environment, File};
use metr::api::configs::{BackendConfig, DEFAULT_BACKEND_HOST, DEFAULT_DOMAIN};
use metr::errors::ApiResult;
use metr::location::geolocator::{
    CachedPosition, FixedPosition, Geolocator, PositionOptions, Unsupported,
};
use metr::location::resolver::{
    LocationEndpoints, LocationResolver, PRIMARY_IP_URL, REVERSE_GEOCODE_URL, SECONDARY_IP_URL,
};
use metr::store::FileConversationStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            domain: default_domain(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl BackendSettings {
    pub fn into_config(self) -> BackendConfig {
        BackendConfig::new(self.url).with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reverse_geocode_url")]
    pub reverse_geocode_url: String,
    #[serde(default = "default_primary_ip_url")]
    pub primary_ip_url: String,
    #[serde(default = "default_secondary_ip_url")]
    pub secondary_ip_url: String,
    #[serde(default = "default_location_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_maximum_age")]
    pub maximum_age_secs: u64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reverse_geocode_url: default_reverse_geocode_url(),
            primary_ip_url: default_primary_ip_url(),
            secondary_ip_url: default_secondary_ip_url(),
            timeout_secs: default_location_timeout(),
            maximum_age_secs: default_maximum_age(),
            latitude: None,
            longitude: None,
        }
    }
}

impl LocationSettings {
    /// A fixed position when both coordinates are configured; terminals have no
    /// platform geolocation otherwise
    pub fn geolocator(&self) -> Box<dyn Geolocator> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Box::new(CachedPosition::new(
                FixedPosition::new(latitude, longitude),
            )),
            _ => Box::new(Unsupported),
        }
    }

    pub fn endpoints(&self) -> LocationEndpoints {
        LocationEndpoints {
            reverse_geocode: self.reverse_geocode_url.clone(),
            primary_ip: self.primary_ip_url.clone(),
            secondary_ip: self.secondary_ip_url.clone(),
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            maximum_age: Duration::from_secs(self.maximum_age_secs),
            ..Default::default()
        }
    }

    /// `None` when location enrichment is switched off
    pub fn resolver(&self) -> ApiResult<Option<LocationResolver>> {
        if !self.enabled {
            return Ok(None);
        }
        let resolver = LocationResolver::new(self.geolocator())?
            .with_endpoints(self.endpoints())
            .with_options(self.position_options());
        Ok(Some(resolver))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub location: LocationSettings,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(default_config_file().as_deref())
    }

    /// Defaults, then the TOML file if it exists, then `METR_` environment variables
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Backend defaults
            .set_default("backend.url", default_backend_url())?
            .set_default("backend.domain", default_domain())?
            .set_default("backend.timeout_secs", default_backend_timeout())?
            // Location defaults
            .set_default("location.enabled", default_enabled())?
            .set_default("location.reverse_geocode_url", default_reverse_geocode_url())?
            .set_default("location.primary_ip_url", default_primary_ip_url())?
            .set_default("location.secondary_ip_url", default_secondary_ip_url())?
            .set_default("location.timeout_secs", default_location_timeout())?
            .set_default("location.maximum_age_secs", default_maximum_age())?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("METR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match &err {
                config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                },
                _ => ConfigError::Other(err),
            }
        })?;
        settings.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let missing = match (self.location.latitude, self.location.longitude) {
            (Some(_), None) => Some("location.longitude"),
            (None, Some(_)) => Some("location.latitude"),
            _ => None,
        };
        match missing {
            Some(field) => Err(ConfigError::MissingEnvVar {
                env_var: to_env_var(field),
            }),
            None => Ok(self),
        }
    }

    pub fn conversation_store(&self) -> Result<FileConversationStore> {
        let path = match &self.state_file {
            Some(path) => path.clone(),
            None => FileConversationStore::default_path()?,
        };
        Ok(FileConversationStore::new(path))
    }
}

/// `~/.config/metr/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("metr").join("config.toml"))
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_HOST.to_string()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_backend_timeout() -> u64 {
    600
}

fn default_enabled() -> bool {
    true
}

fn default_reverse_geocode_url() -> String {
    REVERSE_GEOCODE_URL.to_string()
}

fn default_primary_ip_url() -> String {
    PRIMARY_IP_URL.to_string()
}

fn default_secondary_ip_url() -> String {
    SECONDARY_IP_URL.to_string()
}

fn default_location_timeout() -> u64 {
    10
}

fn default_maximum_age() -> u64 {
    60
}
