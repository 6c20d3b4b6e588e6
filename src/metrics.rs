//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub mints_total: IntCounter,
    pub mints_success: IntCounter,
    pub mints_failed: IntCounter,
    pub mints_timed_out: IntCounter,
    pub sold_out_reloads: IntCounter,
    pub fetch_failures: IntCounter,

    // Gauges
    pub mints_in_flight: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let mints_total =
            IntCounter::with_opts(Opts::new("mints_total", "Total number of mint attempts"))?;

        let mints_success =
            IntCounter::with_opts(Opts::new("mints_success", "Number of confirmed mints"))?;

        let mints_failed = IntCounter::with_opts(Opts::new(
            "mints_failed",
            "Number of mints that failed to submit or execute",
        ))?;

        let mints_timed_out = IntCounter::with_opts(Opts::new(
            "mints_timed_out",
            "Number of mints with no confirmation before the deadline",
        ))?;

        let sold_out_reloads = IntCounter::with_opts(Opts::new(
            "sold_out_reloads",
            "Number of forced sale-state reloads after a sold-out rejection",
        ))?;

        let fetch_failures = IntCounter::with_opts(Opts::new(
            "sale_state_fetch_failures",
            "Number of failed candy machine state fetches",
        ))?;

        let mints_in_flight = IntGauge::with_opts(Opts::new(
            "mints_in_flight",
            "Number of mint attempts currently in progress",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to resolved confirmation",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 40.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        registry.register(Box::new(mints_total.clone()))?;
        registry.register(Box::new(mints_success.clone()))?;
        registry.register(Box::new(mints_failed.clone()))?;
        registry.register(Box::new(mints_timed_out.clone()))?;
        registry.register(Box::new(sold_out_reloads.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(mints_in_flight.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            mints_total,
            mints_success,
            mints_failed,
            mints_timed_out,
            sold_out_reloads,
            fetch_failures,
            mints_in_flight,
            confirmation_latency,
            rpc_latency,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let mut buf = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::debug!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
    histogram_name: Option<String>,
}

impl Timer {
    /// Create a timer with a histogram name for automatic recording
    pub fn with_name(histogram_name: &str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name: Some(histogram_name.to_string()),
        }
    }

    /// Finish the timer and record to the associated histogram
    pub fn finish(self) {
        if let Some(name) = self.histogram_name {
            let duration = self.start.elapsed().as_secs_f64();
            match name.as_str() {
                "confirmation_latency_seconds" => {
                    metrics().confirmation_latency.observe(duration);
                }
                "rpc_latency_seconds" => {
                    metrics().rpc_latency.observe(duration);
                }
                _ => {
                    tracing::debug!("Unknown histogram name: {}", name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.mints_total.inc();
        let text = m.render();
        assert!(text.contains("mints_total 1"));
        assert!(text.contains("sale_state_fetch_failures"));
    }
}
