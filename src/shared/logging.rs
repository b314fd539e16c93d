/// Install the tracing subscriber for the host shell. Call once at startup.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
