//! Structured logging setup: one init function, called once from the
//! binary's `main`, building an `EnvFilter`-driven `fmt` layer with an
//! optional rolling file appender.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Where, in addition to stdout, log lines should also be written.
#[derive(Debug, Clone, Default)]
pub struct FileLogging {
    /// Directory the rolling file appender writes into.
    pub directory: std::path::PathBuf,
    /// Base file name; a date suffix is appended per `tracing-appender`'s
    /// daily rolling policy.
    pub file_name: String,
}

/// Logging configuration passed to [`init_tracing`].
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// `EnvFilter` directive string, e.g. `"memo_node=info,memo_orchestrator=debug"`.
    /// Falls back to `"info"` if unset and `RUST_LOG` is also unset.
    pub filter: Option<String>,
    /// When set, log lines are additionally written to a rolling file.
    pub file: Option<FileLogging>,
}

/// Install the global tracing subscriber. Returns a guard that must be
/// held for the process lifetime when file logging is enabled (dropping
/// it stops the background flush task), mirroring
/// `tracing_appender::non_blocking`'s own API.
pub fn init_tracing(config: &TracingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = config
        .filter
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true).with_filter(env_filter);

    match &config.file {
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
            None
        }
        Some(file) => {
            std::fs::create_dir_all(&file.directory).ok();
            let appender = tracing_appender::rolling::daily(&file.directory, &file.file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking);
            tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
            Some(guard)
        }
    }
}
