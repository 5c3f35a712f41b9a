//! Prometheus metrics registry for the Myymotto service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and hand it to
//! the expiry service and the HTTP middleware.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Expiry sweeps started.
    pub sweeps_total: Counter,
    /// Storage failures swallowed by the expiry service.
    pub expiry_errors_total: Counter,
    /// Reminders written, labelled by document type.
    pub notifications_created_total: CounterVec,
    /// Reminders skipped because an identical one already exists.
    pub notifications_deduplicated_total: Counter,
    /// Document-upload hook calls, labelled by outcome.
    pub document_uploads_total: CounterVec,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sweeps_total = Counter::with_opts(Opts::new(
            "myymotto_expiry_sweeps_total",
            "Expiry sweeps started",
        ))?;

        let expiry_errors_total = Counter::with_opts(Opts::new(
            "myymotto_expiry_errors_total",
            "Storage errors logged and skipped during expiry checks",
        ))?;

        let notifications_created_total = CounterVec::new(
            Opts::new(
                "myymotto_notifications_created_total",
                "Expiry reminders written, by document type",
            ),
            &["document_type"],
        )?;

        let notifications_deduplicated_total = Counter::with_opts(Opts::new(
            "myymotto_notifications_deduplicated_total",
            "Expiry reminders skipped because they already exist",
        ))?;

        let document_uploads_total = CounterVec::new(
            Opts::new(
                "myymotto_document_uploads_total",
                "Document upload hook calls, by outcome",
            ),
            &["outcome"],
        )?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "myymotto_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "myymotto_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(expiry_errors_total.clone()))?;
        registry.register(Box::new(notifications_created_total.clone()))?;
        registry.register(Box::new(notifications_deduplicated_total.clone()))?;
        registry.register(Box::new(document_uploads_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            sweeps_total,
            expiry_errors_total,
            notifications_created_total,
            notifications_deduplicated_total,
            document_uploads_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
