//! API configuration.

use std::net::SocketAddr;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Comma-separated allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8000).into(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables, with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = std::env::var("CLIPFORGE_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bind_addr);
        let cors_origins = std::env::var("CLIPFORGE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind_addr,
            cors_origins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.cors_origins.is_empty());
    }
}
