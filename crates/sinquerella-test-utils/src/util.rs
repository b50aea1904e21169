//! Utility functions.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test tracing
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sinquerella_core=debug,sinquerella_state_inmemory=debug"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
