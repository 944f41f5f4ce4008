mod analytics;
mod apps;
mod auth;
mod customers;
mod orders;
mod security;

pub use analytics::*;
pub use apps::*;
pub use auth::*;
pub use customers::*;
pub use orders::*;
pub use security::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::middleware::admin_auth;
use crate::rate_limit;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

pub fn router(state: AppState, limits: RateLimitConfig) -> Router<AppState> {
    // Auth endpoints resolve the session themselves
    let login = rate_limit::strict(
        Router::new().route("/api/admin/auth/login", post(login)),
        limits.strict_rpm,
    );
    let auth = rate_limit::standard(
        Router::new()
            .route("/api/admin/auth/session", get(get_session))
            .route("/api/admin/auth/logout", post(logout)),
        limits.standard_rpm,
    );

    let resources = Router::new()
        // Orders
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/{order_id}", get(get_order))
        .route("/api/admin/orders/{order_id}/cancel", post(cancel_order))
        .route("/api/admin/orders/{order_id}/refund", post(refund_order))
        .route("/api/admin/orders/{order_id}/retry-build", post(retry_build))
        // Customers
        .route("/api/admin/customers", get(list_customers).post(create_customer))
        .route(
            "/api/admin/customers/{customer_id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        // Apps
        .route("/api/admin/apps", get(list_apps).post(create_app))
        .route(
            "/api/admin/apps/{app_id}",
            get(get_app).put(update_app).delete(delete_app),
        )
        .route("/api/admin/analytics", get(get_analytics))
        // Security
        .route("/api/admin/permissions", get(list_permissions))
        .route("/api/admin/roles", get(list_roles).post(create_role))
        .route(
            "/api/admin/roles/{role_id}",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/api/admin/sessions", get(list_sessions))
        .route(
            "/api/admin/sessions/{session_id}",
            axum::routing::delete(revoke_session),
        )
        .layer(middleware::from_fn_with_state(state, admin_auth));

    login
        .merge(auth)
        .merge(rate_limit::standard(resources, limits.standard_rpm))
}
