//! Logging setup and timestamp helpers

use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Timestamp formats accepted in CSV files and prediction ranges
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d",
];

/// Initialise logging to stdout and to a dated log file under `log_dir`.
///
/// The returned guard must be held for the lifetime of the program; dropping
/// it stops the background writer and loses buffered log lines.
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;
    let appender = tracing_appender::rolling::daily(log_dir.as_ref(), "forecast_power.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

/// Parse a timestamp string into epoch seconds.
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.timestamp());
        }
        // Date-only values have no time component
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_hms_opt(0, 0, 0).map(|dt| dt.timestamp()).unwrap_or(0));
        }
    }

    Err(ForecastError::DataError(format!(
        "Unrecognised timestamp '{}'",
        value
    )))
}

/// Format epoch seconds using a chrono format string.
pub fn format_timestamp(epoch_secs: i64, format: &str) -> String {
    NaiveDateTime::from_timestamp_opt(epoch_secs, 0)
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}
