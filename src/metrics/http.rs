//! HTTP API metrics.

use crate::metrics::{describe_phase, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct HttpMetrics;

impl HttpMetrics {
    pub fn record_request(method: &str, status: u16, duration_secs: f64) {
        ::metrics::counter!(
            phase_metric!(counter, "http", "requests"),
            "method" => method.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "http", "request_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_rejected_host() {
        ::metrics::counter!(phase_metric!(counter, "http", "rejected_hosts")).increment(1);
    }
}

impl PhaseMetrics for HttpMetrics {
    fn register_metrics() {
        describe_phase::<Self>();
    }

    fn phase_name() -> &'static str {
        "http"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "http", "requests"),
                metric_type: MetricType::Counter,
                help: "HTTP requests served",
                labels: vec!["method", "status"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "http", "request_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "HTTP request latency",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "http", "rejected_hosts"),
                metric_type: MetricType::Counter,
                help: "Requests refused for a disallowed Host header",
                labels: vec![],
            },
        ]
    }
}
