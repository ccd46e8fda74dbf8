//! Process-wide tracing setup.

use std::sync::OnceLock;

use crate::config::LoggingConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber once. Later calls are no-ops.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies, and an
/// unparsable level falls back to `info`.
pub fn init_tracing(logging: &LoggingConfig) {
    TRACING_INIT.get_or_init(|| {
        let fallback_level = fallback_level(&logging.level);
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(logging.ansi)
            .try_init();

        tracing::info!(log_level = %logging.level, "tracing initialized");
    });
}

fn fallback_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(fallback_level(" DEBUG "), "debug");
        assert_eq!(fallback_level("verbose"), "info");
    }

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ansi: false,
        };
        init_tracing(&config);
        init_tracing(&config);
    }
}
