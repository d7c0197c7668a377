//! Logging configuration and initialization
//!
//! The library only emits through the `log` facade. Binaries and hosts
//! that want console output call `init_logging` once at startup.

/// Environment variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "SCAN_ENGINE_LOG";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when no environment variable is set (default: "info")
    pub default_level: String,
    /// Prefix lines with a millisecond timestamp (default: true)
    pub timestamps: bool,
    /// Include the module path in each line (default: true)
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            timestamps: true,
            module_path: true,
        }
    }
}

/// Pick the filter string: `SCAN_ENGINE_LOG`, then `RUST_LOG`, then the config default
pub fn resolve_filter<F>(config: &LogConfig, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LOG_ENV)
        .or_else(|| lookup("RUST_LOG"))
        .filter(|filter| !filter.trim().is_empty())
        .unwrap_or_else(|| config.default_level.clone())
}

/// Initialize env_logger
///
/// Fails instead of panicking if a logger is already installed.
///
/// # Environment Variables
///
/// - `SCAN_ENGINE_LOG`: filter, e.g. "debug" or "info,scan_engine::session=trace"
/// - `RUST_LOG`: fallback filter
pub fn init_logging(config: &LogConfig) -> Result<(), log::SetLoggerError> {
    let filter = resolve_filter(config, |name| std::env::var(name).ok());

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);
    if config.timestamps {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }
    builder.format_module_path(config.module_path);
    builder.try_init()?;

    log::info!(
        target: "scan_engine",
        "Logging initialized (version {}, filter '{}')",
        env!("CARGO_PKG_VERSION"),
        filter
    );
    Ok(())
}

/// Initialize logging with the default configuration
pub fn init_default_logging() -> Result<(), log::SetLoggerError> {
    init_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, "info");
        assert!(config.timestamps);
    }

    #[test]
    fn test_filter_precedence() {
        let config = LogConfig::default();
        assert_eq!(resolve_filter(&config, env(&[])), "info");
        assert_eq!(resolve_filter(&config, env(&[("RUST_LOG", "warn")])), "warn");
        assert_eq!(
            resolve_filter(
                &config,
                env(&[("RUST_LOG", "warn"), (LOG_ENV, "scan_engine=debug")])
            ),
            "scan_engine=debug"
        );
    }

    #[test]
    fn test_blank_env_falls_back_to_default() {
        let config = LogConfig {
            default_level: "error".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(resolve_filter(&config, env(&[(LOG_ENV, "  ")])), "error");
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        let _ = init_default_logging();
        assert!(init_default_logging().is_err());
        assert!(init_logging(&LogConfig::default()).is_err());
    }
}
