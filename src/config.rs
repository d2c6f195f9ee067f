//! Runtime configuration for the proxy gateway.
//!
//! Everything comes from the environment (optionally via a `.env` file):
//! `PORT` for the listen port and `CM_API_BASE_URL` to point at a
//! different upstream, which is how tests aim the gateway at a mock
//! server.

use std::env;

/// Default upstream REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.createsend.com/api/v3.3";

/// Default gateway listen port.
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub upstream_base_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            upstream_base_url: env::var("CM_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        }
    }
}
