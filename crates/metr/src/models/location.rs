use serde::{Deserialize, Serialize};

/// Best-effort position of the user; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, country: Option<String>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            country,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.country.is_none()
    }
}
