//! Dev-only endpoints. Mounted when APPFORGE_ENV=dev.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};

#[derive(Debug, Serialize)]
pub struct SimulatedPayment {
    pub session_id: String,
    pub order_id: String,
    pub payment_status: &'static str,
}

/// Landing page for a simulated checkout URL.
#[derive(Debug, Serialize)]
pub struct SimulatedCheckoutPage {
    pub session_id: String,
    pub order_id: Option<String>,
    pub payment_status: String,
    /// POST here to pay.
    pub complete_url: String,
}

/// Where the simulated `checkout_url` lands: shows the session and how to pay it.
pub async fn show_checkout(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SimulatedCheckoutPage>> {
    let simulated = state.checkout.simulated().ok_or_else(|| {
        AppError::BadRequest("Checkout is handled by Stripe, not simulated".into())
    })?;

    let session = simulated
        .retrieve_checkout_session(&session_id)?
        .or_not_found(msg::CHECKOUT_SESSION_NOT_FOUND)?;

    Ok(Json(SimulatedCheckoutPage {
        complete_url: format!("{}/dev/checkout/{}/complete", state.base_url, session.id),
        session_id: session.id,
        order_id: session.order_id,
        payment_status: session.payment_status,
    }))
}

/// Stand-in for the hosted checkout page: mark a simulated session paid.
///
/// The order itself is confirmed by the next checkout-session poll.
pub async fn complete_checkout(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SimulatedPayment>> {
    let simulated = state.checkout.simulated().ok_or_else(|| {
        AppError::BadRequest("Checkout is handled by Stripe, not simulated".into())
    })?;

    let order_id = simulated
        .mark_paid(&session_id)?
        .or_not_found(msg::CHECKOUT_SESSION_NOT_FOUND)?;
    tracing::info!("Simulated checkout {} paid for order {}", session_id, order_id);

    Ok(Json(SimulatedPayment {
        session_id,
        order_id,
        payment_status: "paid",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dev/checkout/{session_id}", get(show_checkout))
        .route("/dev/checkout/{session_id}/complete", post(complete_checkout))
}
