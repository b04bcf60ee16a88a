//! Review workflow metrics.

use crate::metrics::{describe_phase, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ReviewMetrics;

impl ReviewMetrics {
    pub fn record_action(action: &str, changed: usize) {
        let action = action.to_string();
        ::metrics::counter!(phase_metric!(counter, "review", "actions"), "action" => action.clone())
            .increment(1);
        ::metrics::counter!(
            phase_metric!(counter, "review", "translations_changed"),
            "action" => action
        )
        .increment(changed as u64);
    }

    pub fn record_denied(action: &str) {
        let action = action.to_string();
        ::metrics::counter!(phase_metric!(counter, "review", "denied"), "action" => action)
            .increment(1);
    }
}

impl PhaseMetrics for ReviewMetrics {
    fn register_metrics() {
        describe_phase::<Self>();
    }

    fn phase_name() -> &'static str {
        "review"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "review", "actions"),
                metric_type: MetricType::Counter,
                help: "Bulk review actions run",
                labels: vec!["action"],
            },
            MetricDoc {
                name: phase_metric!(counter, "review", "translations_changed"),
                metric_type: MetricType::Counter,
                help: "Translations changed by bulk review actions",
                labels: vec!["action"],
            },
            MetricDoc {
                name: phase_metric!(counter, "review", "denied"),
                metric_type: MetricType::Counter,
                help: "Review actions refused for lack of permission",
                labels: vec!["action"],
            },
        ]
    }
}
