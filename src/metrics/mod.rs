//! Prometheus metrics for the hub.
//!
//! Each area (import, export, review, http) owns its metrics in a submodule
//! and documents them through [`PhaseMetrics`], so the registry can describe
//! everything once at startup and catch name clashes.

pub mod exporter;
pub mod http;
pub mod importer;
pub mod registry;
pub mod review;

pub use exporter::ExportMetrics;
pub use http::HttpMetrics;
pub use importer::ImportMetrics;
pub use review::ReviewMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder and describe all metrics.
///
/// Idempotent. No HTTP listener is started; the server renders the handle
/// on `/metrics` itself.
pub fn init_metrics() -> Option<PrometheusHandle> {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("metrics handle was already set");
            }
            registry::register_all_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
    HANDLE.get().cloned()
}

/// Implemented by each metrics area.
pub trait PhaseMetrics {
    /// Describe every metric of this area to the recorder.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Metric names follow `voyant_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("voyant_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("voyant_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

/// Describe every documented metric of `T` with its help text.
pub(crate) fn describe_phase<T: PhaseMetrics>() {
    for doc in T::metrics_documentation() {
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "import", "runs"),
            "voyant_import_runs_total"
        );
        assert_eq!(
            phase_metric!(histogram, "http", "request_duration_seconds"),
            "voyant_http_request_duration_seconds"
        );
    }

    #[test]
    fn all_documented_names_are_prefixed() {
        let docs = [
            ImportMetrics::metrics_documentation(),
            ExportMetrics::metrics_documentation(),
            ReviewMetrics::metrics_documentation(),
            HttpMetrics::metrics_documentation(),
        ];
        for doc in docs.iter().flatten() {
            assert!(doc.name.starts_with("voyant_"), "{}", doc.name);
            if doc.metric_type == MetricType::Counter {
                assert!(doc.name.ends_with("_total"), "{}", doc.name);
            }
        }
    }
}
