//! Per-IP rate limiting for public and auth endpoints.
//!
//! Tiers:
//! - Strict: POST /api/orders (opens a checkout session), admin login
//! - Standard: order status, checkout session poll, downloads
//! - Relaxed: /health
//!
//! Configure via RATE_LIMIT_STRICT_RPM / _STANDARD_RPM / _RELAXED_RPM.
//! A value of 0 disables the tier.
//!
//! The key extractor reads the peer address, so the server must be started
//! with `into_make_service_with_connect_info::<SocketAddr>()`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer, or None when the tier is disabled.
fn create_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    // One token replenished every 60/rpm seconds, bursting up to a full minute
    let period_ms = (60_000 / requests_per_minute as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(period_ms))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Apply a tier to every route in `router`.
fn limit<S>(router: Router<S>, requests_per_minute: u32) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match create_layer(requests_per_minute) {
        Some(layer) => router.route_layer(layer),
        None => router,
    }
}

/// Strict tier: endpoints that call out to the payment provider or check passwords.
pub fn strict<S: Clone + Send + Sync + 'static>(router: Router<S>, rpm: u32) -> Router<S> {
    limit(router, rpm)
}

/// Standard tier: polling and read endpoints.
pub fn standard<S: Clone + Send + Sync + 'static>(router: Router<S>, rpm: u32) -> Router<S> {
    limit(router, rpm)
}

/// Relaxed tier: lightweight endpoints like health checks.
pub fn relaxed<S: Clone + Send + Sync + 'static>(router: Router<S>, rpm: u32) -> Router<S> {
    limit(router, rpm)
}
