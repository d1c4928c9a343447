//! Structured logging for plugin processes.
//!
//! Standard output belongs to the protocol, so log records only ever go to
//! standard error. The subscriber is installed once per process; later
//! calls are no-ops.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter, time::UtcTime};

use courier_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression is invalid.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The global subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Routes `tracing` output to standard error using the configured filter and
/// format.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter, or
/// [`TelemetryError::Subscriber`] when another subscriber already owns the
/// process.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD.get_or_try_init(|| {
        let ansi = io::stderr().is_terminal();
        let subscriber = build_subscriber(config, io::stderr, ansi)?;
        tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
    })?;
    Ok(())
}

fn build_subscriber<M>(
    config: &Config,
    make_writer: M,
    ansi: bool,
) -> Result<BoxedSubscriber, TelemetryError>
where
    M: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(make_writer)
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rstest::rstest;
    use serde_json::Value;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("capture lock").clone()).expect("utf8 logs")
        }
    }

    fn config(filter: &str, format: LogFormat) -> Config {
        Config {
            log_filter: filter.to_owned(),
            log_format: format,
            ..Config::default()
        }
    }

    fn capture_with(config: &Config, emit: impl FnOnce()) -> String {
        let capture = Capture::default();
        let sink = capture.clone();
        let subscriber =
            build_subscriber(config, move || sink.clone(), false).expect("valid subscriber");
        tracing::subscriber::with_default(subscriber, emit);
        capture.text()
    }

    #[rstest]
    fn rejects_invalid_filters_before_installing() {
        let result = build_subscriber(
            &config("courier=notalevel", LogFormat::Compact),
            io::sink,
            false,
        );
        assert!(matches!(result, Err(TelemetryError::Filter(_))));
    }

    #[rstest]
    fn json_records_are_one_object_per_line() {
        let logs = capture_with(&config("info", LogFormat::Json), || {
            tracing::info!(target: "courier-channel::channel", plugin_id = "p", "plugin ready");
        });

        let record: Value = serde_json::from_str(logs.trim_end()).expect("json record");
        assert_eq!(record["message"], "plugin ready");
        assert_eq!(record["plugin_id"], "p");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["target"], "courier-channel::channel");
    }

    #[rstest]
    fn filter_drops_records_below_the_level() {
        let logs = capture_with(&config("warn", LogFormat::Compact), || {
            tracing::info!("hidden");
            tracing::warn!("shown");
        });

        assert!(!logs.contains("hidden"), "logs: {logs}");
        assert!(logs.contains("shown"), "logs: {logs}");
    }
}
