use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking file writer alive; dropping it flushes and stops
/// the background logging thread.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initializes tracing with an env-filtered stdout layer and, when
/// `MNEMO_LOG_DIR` is set, a daily-rolling file layer alongside it.
pub fn init_tracing(log_level: &str) -> LogGuard {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    let file = std::env::var("MNEMO_LOG_DIR").ok().and_then(|dir| {
        if let Err(err) = std::fs::create_dir_all(&dir) {
            eprintln!("failed to create log directory {dir}: {err}");
            return None;
        }
        Some(RollingFileAppender::new(Rotation::DAILY, dir, "mnemo-core.log"))
    });

    match file {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
            LogGuard {
                _file: Some(guard),
            }
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
            LogGuard { _file: None }
        }
    }
}
