//! Top-level configuration for the tracker.
//!
//! This module aggregates configuration for:
//!
//! - the ledger client (roster, genesis block, request timeout),
//! - query limits (`QueryConfig`),
//! - the metrics exporter (enable flag + listen address).
//!
//! Binaries start from `TrackerConfig::default()` and apply environment
//! overrides with [`TrackerConfig::from_env`].

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::query::QueryConfig;
use crate::types::{BlockHash, HASH_LEN, Hash256, Roster};

/// Configuration for the ledger client.
#[derive(Clone, Debug)]
pub struct LedgerClientConfig {
    /// Nodes of the ledger; the first one is contacted.
    pub roster: Roster,
    /// Hash of the chain's genesis block, needed to resolve indices.
    pub genesis: BlockHash,
    /// Request timeout for ledger calls.
    pub timeout: Duration,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            roster: Roster::new(vec!["http://127.0.0.1:7771".to_string()]),
            genesis: BlockHash(Hash256([0u8; HASH_LEN])),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: false,
            listen_addr: addr,
        }
    }
}

/// Error raised when an environment override cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.key, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration.
#[derive(Clone, Debug, Default)]
pub struct TrackerConfig {
    pub ledger: LedgerClientConfig,
    pub query: QueryConfig,
    pub metrics: MetricsConfig,
}

impl TrackerConfig {
    /// Defaults with overrides from `TRACKER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(list) = lookup("TRACKER_ROSTER") {
            let roster = Roster::parse(&list);
            if roster.leader().is_none() {
                return Err(ConfigError {
                    key: "TRACKER_ROSTER",
                    reason: "no node URL given".to_string(),
                });
            }
            cfg.ledger.roster = roster;
        }

        if let Some(hex) = lookup("TRACKER_GENESIS") {
            cfg.ledger.genesis = BlockHash::from_hex(&hex).map_err(|e| ConfigError {
                key: "TRACKER_GENESIS",
                reason: e.to_string(),
            })?;
        }

        if let Some(ms) = lookup("TRACKER_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|e| ConfigError {
                key: "TRACKER_TIMEOUT_MS",
                reason: format!("{e}"),
            })?;
            cfg.ledger.timeout = Duration::from_millis(ms);
        }

        if let Some(addr) = lookup("TRACKER_METRICS_ADDR") {
            cfg.metrics.listen_addr = addr.trim().parse().map_err(|e| ConfigError {
                key: "TRACKER_METRICS_ADDR",
                reason: format!("{e}"),
            })?;
            cfg.metrics.enabled = true;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let cfg = TrackerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.ledger.roster.leader(), Some("http://127.0.0.1:7771"));
        assert_eq!(cfg.query.default_result_bound, 10);
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn overrides_are_applied() {
        let genesis = "ab".repeat(HASH_LEN);
        let cfg = TrackerConfig::from_lookup(lookup_from(&[
            ("TRACKER_ROSTER", "http://n1:7771,http://n2:7771"),
            ("TRACKER_GENESIS", genesis.as_str()),
            ("TRACKER_TIMEOUT_MS", "2500"),
            ("TRACKER_METRICS_ADDR", "0.0.0.0:9100"),
        ]))
        .unwrap();

        assert_eq!(cfg.ledger.roster.nodes.len(), 2);
        assert_eq!(cfg.ledger.genesis, BlockHash(Hash256([0xAB; HASH_LEN])));
        assert_eq!(cfg.ledger.timeout, Duration::from_millis(2500));
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.metrics.listen_addr.port(), 9100);
    }

    #[test]
    fn bad_overrides_name_the_variable() {
        let err = TrackerConfig::from_lookup(lookup_from(&[("TRACKER_GENESIS", "xyz")]))
            .unwrap_err();
        assert_eq!(err.key, "TRACKER_GENESIS");

        let err = TrackerConfig::from_lookup(lookup_from(&[("TRACKER_ROSTER", " , ")]))
            .unwrap_err();
        assert_eq!(err.key, "TRACKER_ROSTER");
    }
}
