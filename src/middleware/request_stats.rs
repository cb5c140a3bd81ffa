//! Per-route request statistics.
//!
//! [`RequestStatsLayer`] times every request and records the
//! `portico_http_request_duration_seconds` histogram. When built with
//! [`RequestStats`] it also aggregates counters per `path|method`, which the
//! `monitor` command prints as a table once a second.
//!
//! The path label is the matched route template when axum knows it, so
//! unmatched or parameterized URLs do not blow up label cardinality.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::{Body, HttpBody};
use axum::extract::MatchedPath;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Request, Response};
use dashmap::DashMap;
use tower::{Layer, Service};

use crate::metrics;

const TABLE_HEADERS: [&str; 13] = [
    "URL",
    "METHOD",
    "TOTAL REQUESTS",
    "1xx",
    "2xx",
    "3xx",
    "4xx",
    "5xx",
    "BYTES RECD",
    "BYTES SENT",
    "AVG BYTES RECD",
    "AVG BYTES SENT",
    "AVG DURATION",
];

/// Live counters for one route and method.
#[derive(Debug, Default)]
struct RouteCounters {
    requests: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    status: [AtomicU64; 5],
    duration_nanos: AtomicU64,
}

/// Point-in-time copy of one route's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSnapshot {
    pub requests: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// Responses by class: 1xx through 5xx.
    pub status: [u64; 5],
    pub duration_nanos: u64,
}

impl RouteSnapshot {
    pub fn avg_bytes_received(&self) -> u64 {
        self.bytes_received.checked_div(self.requests).unwrap_or(0)
    }

    pub fn avg_bytes_sent(&self) -> u64 {
        self.bytes_sent.checked_div(self.requests).unwrap_or(0)
    }

    pub fn avg_duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos.checked_div(self.requests).unwrap_or(0))
    }
}

/// Concurrent request statistics keyed by `path|method`.
#[derive(Debug, Default)]
pub struct RequestStats {
    routes: DashMap<String, RouteCounters>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        path: &str,
        method: &str,
        received: u64,
        sent: u64,
        duration: Duration,
        status: u16,
    ) {
        let key = format!("{path}|{method}");
        let entry = self.routes.entry(key).or_default();
        let counters = entry.value();

        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters.bytes_received.fetch_add(received, Ordering::Relaxed);
        counters.bytes_sent.fetch_add(sent, Ordering::Relaxed);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        counters.duration_nanos.fetch_add(nanos, Ordering::Relaxed);

        if let Some(class) = status_class(status)
            && let Some(counter) = counters.status.get(class)
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy all counters, sorted by `(path, method)`.
    pub fn snapshot(&self) -> BTreeMap<(String, String), RouteSnapshot> {
        self.routes
            .iter()
            .map(|entry| {
                let (path, method) = entry
                    .key()
                    .rsplit_once('|')
                    .unwrap_or((entry.key().as_str(), ""));
                let c = entry.value();
                let snapshot = RouteSnapshot {
                    requests: c.requests.load(Ordering::Relaxed),
                    bytes_received: c.bytes_received.load(Ordering::Relaxed),
                    bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
                    status: std::array::from_fn(|i| {
                        c.status.get(i).map_or(0, |s| s.load(Ordering::Relaxed))
                    }),
                    duration_nanos: c.duration_nanos.load(Ordering::Relaxed),
                };
                ((path.to_string(), method.to_string()), snapshot)
            })
            .collect()
    }

    /// Write the statistics as an aligned text table.
    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut rows: Vec<Vec<String>> = vec![TABLE_HEADERS.iter().map(|h| h.to_string()).collect()];

        for ((path, method), data) in self.snapshot() {
            let mut row = vec![path, method, data.requests.to_string()];
            row.extend(data.status.iter().map(|n| n.to_string()));
            row.push(byte_si(data.bytes_received));
            row.push(byte_si(data.bytes_sent));
            row.push(byte_si(data.avg_bytes_received()));
            row.push(byte_si(data.avg_bytes_sent()));
            row.push(format!("{:?}", data.avg_duration()));
            rows.push(row);
        }

        let mut widths = vec![0usize; TABLE_HEADERS.len()];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        for row in &rows {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(out, "{}", line.trim_end())?;
        }
        out.flush()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Index into the status array, or `None` for out-of-range codes.
fn status_class(status: u16) -> Option<usize> {
    match status {
        100..=599 => Some(usize::from(status / 100 - 1)),
        _ => None,
    }
}

/// Format a byte count with binary prefixes: `512 B`, `1.50 KB`, `2.00 MB`.
pub fn byte_si(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let prefix = PREFIXES.get(exp).copied().unwrap_or('E');
    format!("{:.2} {prefix}B", bytes as f64 / div as f64)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

// =============================================================================
// RequestStatsLayer
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RequestStatsLayer {
    stats: Option<Arc<RequestStats>>,
}

impl RequestStatsLayer {
    /// Record only the Prometheus histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also aggregate into `stats` for the monitor table.
    pub fn with_stats(stats: Arc<RequestStats>) -> Self {
        Self { stats: Some(stats) }
    }
}

impl<S> Layer<S> for RequestStatsLayer {
    type Service = RequestStatsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestStatsService {
            inner,
            stats: self.stats.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestStatsService<S> {
    inner: S,
    stats: Option<Arc<RequestStats>>,
}

impl<S> Service<Request<Body>> for RequestStatsService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let stats = self.stats.clone();

        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let method = req.method().to_string();
        let received = content_length(req.headers()).unwrap_or(0);

        Box::pin(async move {
            let start = Instant::now();
            let response = inner.call(req).await?;
            let elapsed = start.elapsed();
            let status = response.status().as_u16();

            metrics::record_request_duration(&path, &method, status, elapsed.as_secs_f64());

            if let Some(stats) = stats {
                let sent = response
                    .body()
                    .size_hint()
                    .exact()
                    .or_else(|| content_length(response.headers()))
                    .unwrap_or(0);
                stats.record(&path, &method, received, sent, elapsed, status);
            }

            Ok(response)
        })
    }
}
