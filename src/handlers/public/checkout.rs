use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Query};
use crate::lifecycle::{self, ConfirmOutcome};
use crate::models::OrderStatus;

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub payment_status: String,
    pub order_id: String,
    pub order_status: OrderStatus,
}

/// Poll a checkout session after the customer returns from checkout.
///
/// Confirms payment through the same path as the webhook, so whichever of
/// the two arrives first starts the build.
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Query(query): Query<CheckoutSessionQuery>,
) -> Result<Json<CheckoutSessionResponse>> {
    let session_id = query
        .session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".into()))?;

    let session = state
        .checkout
        .retrieve_checkout_session(&session_id)
        .await?
        .or_not_found(msg::CHECKOUT_SESSION_NOT_FOUND)?;

    let order = {
        let conn = state.db.get()?;
        let by_session = queries::get_order_by_checkout_session(&conn, &session_id)?;
        match by_session {
            Some(order) => order,
            None => match session.order_id.as_deref() {
                Some(order_id) => queries::get_order_by_id(&conn, order_id)?
                    .or_not_found(msg::ORDER_NOT_FOUND)?,
                None => return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into())),
            },
        }
    };

    let mut order_status = order.status;
    if session.is_paid() && order.status == OrderStatus::PendingPayment {
        match lifecycle::confirm_payment(&state, &order.id, session.payment_intent.as_deref())? {
            ConfirmOutcome::Confirmed => {
                tracing::info!("Order {} confirmed by checkout session poll", order.id);
                order_status = OrderStatus::Paid;
            }
            ConfirmOutcome::AlreadyProcessed(status) => order_status = status,
            ConfirmOutcome::NotFound => {
                return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()));
            }
        }
    }

    Ok(Json(CheckoutSessionResponse {
        session_id: session.id,
        payment_status: session.payment_status,
        order_id: order.id,
        order_status,
    }))
}
