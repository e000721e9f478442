use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_attempts_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub dispatch_pool_size: Histogram,
    pub checkpoint_writes_total: IntCounterVec,
    pub location_pings_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_attempts_total = IntCounterVec::new(
            Opts::new(
                "dispatch_attempts_total",
                "Dispatch attempts by path and outcome",
            ),
            &["path", "outcome"],
        )
        .expect("valid dispatch_attempts_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch attempts in seconds",
            ),
            &["path"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let dispatch_pool_size = Histogram::with_opts(
            HistogramOpts::new(
                "dispatch_pool_size",
                "Couriers in the snapshot read for each auto dispatch",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )
        .expect("valid dispatch_pool_size metric");

        let checkpoint_writes_total = IntCounterVec::new(
            Opts::new("checkpoint_writes_total", "Courier checkpoint writes by outcome"),
            &["outcome"],
        )
        .expect("valid checkpoint_writes_total metric");

        let location_pings_total =
            IntCounter::new("location_pings_total", "Live location pings broadcast")
                .expect("valid location_pings_total metric");

        registry
            .register(Box::new(dispatch_attempts_total.clone()))
            .expect("register dispatch_attempts_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(dispatch_pool_size.clone()))
            .expect("register dispatch_pool_size");
        registry
            .register(Box::new(checkpoint_writes_total.clone()))
            .expect("register checkpoint_writes_total");
        registry
            .register(Box::new(location_pings_total.clone()))
            .expect("register location_pings_total");

        Self {
            registry,
            dispatch_attempts_total,
            dispatch_latency_seconds,
            dispatch_pool_size,
            checkpoint_writes_total,
            location_pings_total,
        }
    }

    pub fn observe_dispatch(&self, path: &str, outcome: &str, elapsed: Duration) {
        self.dispatch_attempts_total
            .with_label_values(&[path, outcome])
            .inc();
        self.dispatch_latency_seconds
            .with_label_values(&[path])
            .observe(elapsed.as_secs_f64());
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
