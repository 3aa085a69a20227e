use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Install the process-wide `tracing` subscriber used for request logs.
///
/// Filtering follows `RUST_LOG`; without it, the crate logs at `info` with
/// `tower_http` turned up to `debug`. Must run once before the first request
/// is served, so the pipeline's timing and rejection logs have somewhere to
/// go.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".parse().unwrap()),
        )
        .init();
}

/// A request/response trace layer to wrap the router produced by
/// [`Api::router`](crate::api::Api::router).
pub fn default_trace() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    TraceLayer::new_for_http()
}
