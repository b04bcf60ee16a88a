//! Registers every area's metrics and reports name clashes.

use crate::metrics::{
    ExportMetrics, HttpMetrics, ImportMetrics, MetricDoc, PhaseMetrics, ReviewMetrics,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<ImportMetrics>(&mut all_metrics);
    register_phase_metrics::<ExportMetrics>(&mut all_metrics);
    register_phase_metrics::<ReviewMetrics>(&mut all_metrics);
    register_phase_metrics::<HttpMetrics>(&mut all_metrics);

    info!("Registered {} metrics", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        debug!(phase = phase_name, metric = doc.name, labels = ?doc.labels, "registered metric");
        if phase_of(doc.name) != phase_name {
            warn!("Metric '{}' does not carry its phase prefix '{}'", doc.name, phase_name);
        }
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined twice (phase '{}')",
                doc.name, phase_name
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Phase name from a metric name (`voyant_export_rows_total` gives `export`).
pub fn phase_of(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("voyant_")
        .and_then(|rest| rest.split('_').next())
        .unwrap_or("unknown")
}
