mod checkout;
mod downloads;
mod orders;

pub use checkout::*;
pub use downloads::*;
pub use orders::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(limits: RateLimitConfig) -> Router<AppState> {
    let relaxed = rate_limit::relaxed(Router::new().route("/health", get(health)), limits.relaxed_rpm);

    // Creating an order opens a checkout session with the payment provider
    let strict = rate_limit::strict(
        Router::new().route("/api/orders", post(create_order)),
        limits.strict_rpm,
    );

    let standard = rate_limit::standard(
        Router::new()
            .route("/api/orders/{order_id}", get(get_order_status))
            .route("/api/checkout/session", get(get_checkout_session))
            .route("/api/downloads/{order_id}", get(get_download)),
        limits.standard_rpm,
    );

    relaxed.merge(strict).merge(standard)
}
