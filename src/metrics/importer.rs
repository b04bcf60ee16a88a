//! Import metrics: runs and the rows and translations they touched.

use crate::importer::ImportCounts;
use crate::metrics::{describe_phase, phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ImportMetrics;

impl ImportMetrics {
    pub fn record_run(counts: &ImportCounts, dry_run: bool, duration_secs: f64) {
        let mode = if dry_run { "dry_run" } else { "commit" };
        ::metrics::counter!(phase_metric!(counter, "import", "runs"), "mode" => mode).increment(1);
        ::metrics::counter!(phase_metric!(counter, "import", "rows_processed"))
            .increment(counts.rows_processed as u64);
        ::metrics::counter!(phase_metric!(counter, "import", "rows_skipped"))
            .increment(counts.rows_skipped as u64);
        let written = phase_metric!(counter, "import", "translations_written");
        ::metrics::counter!(written, "action" => "created")
            .increment(counts.translations_created as u64);
        ::metrics::counter!(written, "action" => "updated")
            .increment(counts.translations_updated as u64);
        ::metrics::histogram!(phase_metric!(histogram, "import", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for ImportMetrics {
    fn register_metrics() {
        describe_phase::<Self>();
    }

    fn phase_name() -> &'static str {
        "import"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "import", "runs"),
                metric_type: MetricType::Counter,
                help: "Voyant CSV imports run",
                labels: vec!["mode"],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "rows_processed"),
                metric_type: MetricType::Counter,
                help: "CSV rows imported",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "rows_skipped"),
                metric_type: MetricType::Counter,
                help: "CSV rows skipped for a blank location or id",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "translations_written"),
                metric_type: MetricType::Counter,
                help: "Translations created or updated by imports",
                labels: vec!["action"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "import", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of an import run",
                labels: vec![],
            },
        ]
    }
}
