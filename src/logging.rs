use tracing_subscriber::filter::EnvFilter;

/// Initialize stderr logging with JSON format.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless; only the first subscriber is installed.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .json()
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
