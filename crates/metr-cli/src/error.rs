use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted configuration key, e.g.
/// `location.longitude` -> `METR_LOCATION__LONGITUDE`
pub fn to_env_var(field: &str) -> String {
    format!("METR_{}", field.replace('.', "__").to_uppercase())
}
