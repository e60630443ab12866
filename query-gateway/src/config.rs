//! Query gateway configuration.
//!
//! This configures the HTTP listen address and how many finished queries
//! are kept for polling. Ledger, query, and metrics settings come from
//! `tracker::TrackerConfig::from_env()`.

use std::net::SocketAddr;

/// Configuration for the query gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Finished queries kept for polling; older ones are dropped first.
    pub max_finished_queries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self {
            listen_addr: addr,
            max_finished_queries: 256,
        }
    }
}

impl ApiConfig {
    /// Defaults, with `GATEWAY_LISTEN_ADDR` and `GATEWAY_MAX_FINISHED_QUERIES`
    /// applied when set.
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(addr) = std::env::var("GATEWAY_LISTEN_ADDR") {
            cfg.listen_addr = addr
                .trim()
                .parse()
                .map_err(|e| format!("invalid GATEWAY_LISTEN_ADDR {addr:?}: {e}"))?;
        }
        if let Ok(max) = std::env::var("GATEWAY_MAX_FINISHED_QUERIES") {
            cfg.max_finished_queries = max
                .trim()
                .parse()
                .map_err(|e| format!("invalid GATEWAY_MAX_FINISHED_QUERIES {max:?}: {e}"))?;
        }
        Ok(cfg)
    }
}
