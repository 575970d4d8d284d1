//! Logging initialisation
//!
//! Text or JSON output via tracing-subscriber, always on stderr so stdout
//! stays with the run summary and the output of the spawned tools.
//!
//! ## Environment Variables
//!
//! * `PAGES_PUBLISHER_LOG` - filter directive (falls back to `RUST_LOG`, then `info`)
//! * `PAGES_PUBLISHER_LOG_FORMAT` - `json` for JSON lines, anything else for text

use std::io;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Output format of the log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Initialize logging; later calls are no-ops
///
/// `format` wins over `PAGES_PUBLISHER_LOG_FORMAT`. `verbose` raises the
/// default level to `debug` when no filter variable is set.
pub fn init(format: Option<&str>, verbose: bool) {
    INIT.call_once(|| {
        let env_format = std::env::var("PAGES_PUBLISHER_LOG_FORMAT").ok();
        let effective_format =
            LogFormat::from_name(format.or(env_format.as_deref()).unwrap_or("text"));
        let filter = create_env_filter(verbose);

        match effective_format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
                    .with(filter)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_target(false).with_writer(io::stderr))
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {:?}", effective_format);
    });
}

fn create_env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };

    if let Ok(spec) = std::env::var("PAGES_PUBLISHER_LOG") {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            eprintln!(
                "Invalid PAGES_PUBLISHER_LOG specification '{}', using default '{}'",
                spec, default_level
            );
            EnvFilter::new(default_level)
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_name("anything"), LogFormat::Text);
    }

    #[test]
    fn test_init_multiple_calls_safe() {
        init(None, false);
        init(Some("json"), true);
        assert!(is_initialized());
    }
}
