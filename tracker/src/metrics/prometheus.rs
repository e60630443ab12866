//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed query metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Query-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by query runs.
/// Clones share the underlying metrics.
#[derive(Clone)]
pub struct QueryMetrics {
    /// Blocks successfully fetched from the ledger.
    pub blocks_fetched: IntCounter,
    /// Latency of a single block fetch, in seconds.
    pub block_fetch_seconds: Histogram,
    /// Matching instructions emitted across all runs.
    pub matches: IntCounter,
    /// Finished runs, labelled by outcome (`completed`, `aborted`, `failed`).
    pub queries: IntCounterVec,
}

impl QueryMetrics {
    /// Registers query metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_fetched = IntCounter::with_opts(Opts::new(
            "query_blocks_fetched_total",
            "Total number of blocks fetched by query runs",
        ))?;
        registry.register(Box::new(blocks_fetched.clone()))?;

        // Network round-trip per block; remote nodes can be slow.
        let block_fetch_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "query_block_fetch_seconds",
                "Time to fetch one block from the ledger in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(block_fetch_seconds.clone()))?;

        let matches = IntCounter::with_opts(Opts::new(
            "query_matches_total",
            "Total number of matching instructions emitted",
        ))?;
        registry.register(Box::new(matches.clone()))?;

        let queries = IntCounterVec::new(
            Opts::new("queries_total", "Total number of finished query runs"),
            &["outcome"],
        )?;
        registry.register(Box::new(queries.clone()))?;

        Ok(Self {
            blocks_fetched,
            block_fetch_seconds,
            matches,
            queries,
        })
    }
}

/// Wrapper around a Prometheus registry and the query metrics.
///
/// This is the main handle passed around in binaries. It can be wrapped in
/// an [`Arc`] and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub query: QueryMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the query metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tracker".to_string()), None)?;
        let query = QueryMetrics::register(&registry)?;
        Ok(Self { registry, query })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => (
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics.gather_text(),
        ),
        _ => (StatusCode::NOT_FOUND, "text/plain", "not found".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn query_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = QueryMetrics::register(&registry).expect("register metrics");

        metrics.blocks_fetched.inc();
        metrics.block_fetch_seconds.observe(0.045);
        metrics.matches.inc_by(3);
        metrics.queries.with_label_values(&["completed"]).inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
        assert_eq!(metrics.matches.get(), 3);
    }

    #[test]
    fn metrics_registry_gather_text_uses_prefix() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.query.blocks_fetched.inc();
        let text = registry.gather_text();
        assert!(text.contains("tracker_query_blocks_fetched_total"));
    }
}
