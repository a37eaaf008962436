use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the non-blocking file writer flushing. Hold it for the life of the
/// process; dropping it flushes and stops file output.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber: stdout in the configured format, plus a
/// rolling file when `enable_file_logging` is set.
///
/// Level precedence: `logging.level` > `RUST_LOG` > `info`. Calling this twice
/// is harmless; the second subscriber is ignored.
pub fn init_with_config(cfg: &LoggingConfig) -> LoggingGuard {
    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(cfg.format)];
    let mut file_guard = None;

    if cfg.enable_file_logging {
        if let Some((writer, guard)) = file_writer(cfg) {
            layers.push(file_layer(cfg.format, writer));
            file_guard = Some(guard);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(cfg))
        .try_init();

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn build_env_filter(cfg: &LoggingConfig) -> EnvFilter {
    match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
            .boxed(),
    }
}

fn file_writer(cfg: &LoggingConfig) -> Option<(NonBlocking, WorkerGuard)> {
    if let Err(e) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}' ({e}), continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let appender = RollingFileAppender::new(parse_rotation(&cfg.rotation), &cfg.dir, &cfg.filename);
    Some(tracing_appender::non_blocking(appender))
}

/// Unknown values fall back to daily rotation.
fn parse_rotation(raw: &str) -> Rotation {
    match raw.trim().to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// In-memory log sink for asserting on emitted events.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    /// Plain-text subscriber at debug level writing into this buffer.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let logs = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
