use tracing::subscriber::set_global_default;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::ServerConfig;

fn get_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. JSON output with flattened fields when
/// `structured_logging` is set, compact human output otherwise.
pub fn setup_tracing(config: &ServerConfig) {
    let log_layer = if config.structured_logging {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };
    let subscriber = Registry::default().with(get_env_filter()).with(log_layer);
    // Ignore the error if a subscriber is already installed (tests).
    let _ = set_global_default(subscriber);
}
