//! Export metrics.

use crate::metrics::{describe_phase, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ExportMetrics;

impl ExportMetrics {
    pub fn record_locale(approved: usize, missing: usize) {
        ::metrics::counter!(phase_metric!(counter, "export", "locales")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "export", "rows"), "status" => "approved")
            .increment(approved as u64);
        ::metrics::counter!(phase_metric!(counter, "export", "rows"), "status" => "missing")
            .increment(missing as u64);
    }
}

impl PhaseMetrics for ExportMetrics {
    fn register_metrics() {
        describe_phase::<Self>();
    }

    fn phase_name() -> &'static str {
        "export"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "export", "locales"),
                metric_type: MetricType::Counter,
                help: "Locale CSV files written",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "export", "rows"),
                metric_type: MetricType::Counter,
                help: "String units exported, by approved/missing",
                labels: vec!["status"],
            },
        ]
    }
}
