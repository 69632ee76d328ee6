use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::ClaimCheckError;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

/// Options for installing the global subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Filter directives; `RUST_LOG` wins when set.
    pub env_filter: Option<String>,
    pub with_ansi: bool,
    /// Write logs to stderr so stdout stays free for reports.
    pub to_stderr: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            env_filter: None,
            with_ansi: true,
            to_stderr: true,
        }
    }
}

impl TelemetryOptions {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.env_filter = Some(level.into());
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global tracing subscriber. Only the first call has an effect.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), ClaimCheckError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = std::env::var("RUST_LOG")
        .ok()
        .or(options.env_filter)
        .unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::try_new(&filter).map_err(|err| {
        ClaimCheckError::InvalidConfiguration(format!("invalid log filter '{filter}': {err}"))
    })?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_ansi(options.with_ansi);
    let installed = if options.to_stderr {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| {
        ClaimCheckError::InvalidConfiguration(format!("telemetry init failed: {err}"))
    })?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
