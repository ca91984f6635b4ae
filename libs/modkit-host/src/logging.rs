//! Process-wide `tracing` subscriber.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Filter directive for a `-v` count; `None` keeps the configured level.
fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn build_filter(cfg: &LoggingConfig, verbose: u8) -> EnvFilter {
    // RUST_LOG wins over both the CLI flag and the config file.
    if let Ok(env) = EnvFilter::try_from_default_env() {
        return env;
    }
    let directive = verbosity_directive(verbose).unwrap_or(cfg.level.as_str());
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid logging.level '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}

/// Install the global subscriber: console text or JSON lines, RFC 3339 UTC timestamps.
///
/// Safe to call more than once; later calls are ignored (tests install their own).
pub fn init_logging(cfg: &LoggingConfig, verbose: u8) {
    let filter = build_filter(cfg, verbose);

    let text_layer = (!cfg.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });
    let json_layer = cfg.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });

    let result = Registry::default()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_directive(0), None);
        assert_eq!(verbosity_directive(1), Some("info"));
        assert_eq!(verbosity_directive(2), Some("debug"));
        assert_eq!(verbosity_directive(9), Some("trace"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        let cfg = LoggingConfig::default();
        init_logging(&cfg, 0);
        init_logging(&LoggingConfig { json: true, ..cfg }, 2);
    }
}
