use std::time::Duration;

pub const DEFAULT_BACKEND_HOST: &str = "http://localhost:8000";
pub const DEFAULT_DOMAIN: &str = "general";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    /// Upper bound for a whole request, streamed body included
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join an API path onto the host, tolerating a trailing slash on the host
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_HOST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = BackendConfig::new("http://example.com/");
        assert_eq!(
            config.url("/api/v1/search"),
            "http://example.com/api/v1/search"
        );
        let config = BackendConfig::new("http://example.com");
        assert_eq!(
            config.url("api/v1/conversations"),
            "http://example.com/api/v1/conversations"
        );
    }

    #[test]
    fn test_default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.host, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(600));
    }
}
