//! Metrics and instrumentation for the tracker.
//!
//! This module defines Prometheus-compatible metrics for query runs and
//! exposes a small HTTP exporter that serves `/metrics` in Prometheus text
//! format.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use tracker::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand the query metrics to the engine:
//! let engine = QueryEngine::new(port, cfg).with_metrics(registry.query.clone());
//! ```

pub mod prometheus;

pub use prometheus::{MetricsRegistry, QueryMetrics, run_prometheus_http_server};
