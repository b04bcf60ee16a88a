use std::fs;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "voyant_hub.log";

fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().with_writer(std::io::stderr).with_target(false)
}

/// Console output on stderr plus a daily-rolling JSON file in `logs/`.
///
/// `RUST_LOG` overrides the default `voyant_hub=info`. Keep the returned guard
/// alive for the life of the process so buffered file logs are flushed.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voyant_hub=info"))
    };

    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        // Read-only filesystems still get console logs.
        let installed = tracing_subscriber::registry()
            .with(filter())
            .with(console_layer())
            .try_init();
        if installed.is_ok() {
            tracing::warn!("could not create {LOG_DIR}/ ({e}); logging to console only");
        }
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    tracing_subscriber::registry()
        .with(filter())
        .with(file_layer)
        .with(console_layer())
        .try_init()
        .ok()
        .map(|_| guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_layer_stacks_over_both_subscriber_shapes() {
        let console_only = tracing_subscriber::registry()
            .with(EnvFilter::new("voyant_hub=debug"))
            .with(console_layer());
        tracing::subscriber::with_default(console_only, || {
            tracing::info!("console only");
        });

        let with_file = tracing_subscriber::registry()
            .with(EnvFilter::new("voyant_hub=debug"))
            .with(fmt::layer().json().with_writer(std::io::sink))
            .with(console_layer());
        tracing::subscriber::with_default(with_file, || {
            tracing::info!("file and console");
        });
    }
}
