pub mod admin;
pub mod dev;
pub mod public;
pub mod webhooks;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::RateLimitConfig;
use crate::db::AppState;

/// The full HTTP surface. Dev endpoints are only mounted in dev mode.
pub fn app(state: AppState, limits: RateLimitConfig) -> Router {
    let mut app = Router::new()
        // Order form, status polling, downloads
        .merge(public::router(limits))
        // Stripe (signature auth)
        .merge(webhooks::router())
        // Dashboard API (session auth)
        .merge(admin::router(state.clone(), limits));

    if state.dev_mode {
        app = app.merge(dev::router());
        tracing::info!("DEV endpoints enabled: GET /dev/checkout/{{session_id}}, POST /dev/checkout/{{session_id}}/complete");
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
