//! Log output for Heimdallr binaries.
//!
//! [`LogSettings`] picks the line format and default verbosity; [`init`]
//! installs the global subscriber on stderr so stdout stays free for reports
//! and `--json` state dumps. JSON lines carry the enclosing `heimdallr.run`
//! span, so every event of a run can be joined on `run_id`.

use std::str::FromStr;

use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::domain::{HeimdallrError, Result};

/// HTTP stack targets that are noisy at debug level.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Line format for log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field human-readable lines.
    #[default]
    Full,
    /// One short line per event.
    Compact,
    /// Newline-delimited JSON with the current span attached.
    Json,
}

impl FromStr for LogFormat {
    type Err = HeimdallrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "text" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(HeimdallrError::InvalidConfig(format!(
                "unknown log format: {other} (expected full, compact or json)"
            ))),
        }
    }
}

/// Format and verbosity for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub level: Level,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Full,
            level: Level::INFO,
        }
    }
}

impl LogSettings {
    pub fn new(format: LogFormat, level: Level) -> Self {
        Self { format, level }
    }

    /// Directives used when `RUST_LOG` is unset: `level` for Heimdallr and
    /// at most `warn` for the HTTP stack.
    pub fn default_directives(&self) -> String {
        let mut directives = vec![self.level.as_str().to_ascii_lowercase()];
        if self.level > Level::WARN {
            directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
        }
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    match format {
        LogFormat::Full => base.boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// Returns `false` when one was already installed; the first call wins.
pub fn init(settings: LogSettings) -> bool {
    tracing_subscriber::registry()
        .with(settings.filter())
        .with(fmt_layer(settings.format))
        .try_init()
        .is_ok()
}
