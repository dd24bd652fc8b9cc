use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

/// Builds the admin router with liveness and readiness endpoints.
/// `is_ready` is evaluated on every request so readiness can flip after
/// startup without rebuilding the router.
pub fn router<F>(is_ready: F) -> Router
where
    F: Fn() -> bool + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(|| async { "ok\n" }))
        .route(
            "/ready",
            get(move || {
                let is_ready = is_ready.clone();
                async move {
                    if is_ready() {
                        (StatusCode::OK, "ok\n")
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "not ready\n")
                    }
                }
            }),
        )
}
