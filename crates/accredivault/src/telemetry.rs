use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Variable that overrides `APP_LOG_LEVEL` when set to a non-blank value.
pub const FILTER_ENV: &str = "RUST_LOG";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}' from {origin}")]
    InvalidFilter {
        origin: &'static str,
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("log subscriber already installed: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Pick the filter directives: a non-blank `RUST_LOG` wins, otherwise the configured level.
///
/// An invalid override is reported rather than silently replaced by the configured level.
pub fn resolve_filter(
    env_override: Option<&str>,
    config: &TelemetryConfig,
) -> Result<EnvFilter, TelemetryError> {
    let (origin, value) = match env_override.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => (FILTER_ENV, raw),
        None => ("APP_LOG_LEVEL", config.log_level.trim()),
    };

    EnvFilter::try_new(value).map_err(|source| TelemetryError::InvalidFilter {
        origin,
        value: value.to_string(),
        source,
    })
}

/// Install the global subscriber. Events go to stderr so CLI summaries own stdout.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_override = std::env::var(FILTER_ENV).ok();
    let filter = resolve_filter(env_override.as_deref(), config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.to_string(),
        }
    }

    #[test]
    fn configured_level_applies_without_override() {
        let filter = resolve_filter(None, &config("debug")).expect("filter");
        assert_eq!(filter.to_string(), "debug");

        let filter = resolve_filter(Some("   "), &config("warn")).expect("filter");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn override_wins_over_configured_level() {
        let filter =
            resolve_filter(Some("accredivault=trace"), &config("info")).expect("filter");
        assert_eq!(filter.to_string(), "accredivault=trace");
    }

    #[test]
    fn invalid_filters_name_their_origin() {
        let err = resolve_filter(Some("accredivault=verbose"), &config("info"))
            .expect_err("bad override");
        assert!(matches!(
            err,
            TelemetryError::InvalidFilter { origin: FILTER_ENV, .. }
        ));

        let err = resolve_filter(None, &config("accredivault=noisy")).expect_err("bad level");
        assert!(err.to_string().contains("from APP_LOG_LEVEL"));
    }
}
