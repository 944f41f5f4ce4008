use axum::extract::State;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, FieldError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::is_valid_prefixed_id;
use crate::lifecycle;
use crate::models::{CreateOrderRequest, DeliveryMethod, OrderStatus};
use crate::pricing::{calculate_price, prices_match, to_cents};

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub checkout_url: String,
    pub session_id: String,
    pub price: f64,
    pub price_cents: i64,
    pub currency: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let input = request.validate().map_err(AppError::Validation)?;

    let price = calculate_price(input.complexity, input.timeline, &input.features);
    if !prices_match(price, input.client_price) {
        tracing::warn!(
            "Order price mismatch: client={:.2} server={:.2}",
            input.client_price,
            price
        );
        return Err(AppError::Validation(vec![FieldError::new(
            "price",
            format!("{} (expected {:.2})", msg::PRICE_MISMATCH, price),
        )]));
    }
    let price_cents = to_cents(price);

    let order = {
        let conn = state.db.get()?;
        let customer = queries::upsert_customer_for_order(&conn, &input)?;
        let order =
            queries::create_order(&conn, &input, Some(&customer.id), price_cents, &state.currency)?;
        queries::append_build_log(&conn, &order.id, "Order received, awaiting payment")?;
        order
    };
    tracing::info!(
        "Order {} created for {} ({} {})",
        order.id,
        order.customer_email,
        price_cents,
        order.currency
    );

    let session = match state
        .checkout
        .create_checkout_session(&order, &state.base_url)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Checkout session for order {} failed: {}", order.id, e);
            let conn = state.db.get()?;
            lifecycle::fail_payment(&conn, &order.id, "Checkout session could not be created")?;
            return Err(AppError::Internal(format!(
                "Checkout session creation failed for order {}",
                order.id
            )));
        }
    };

    {
        let conn = state.db.get()?;
        queries::set_order_checkout_session(&conn, &order.id, &session.id)?;
    }

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        checkout_url: session.url,
        session_id: session.id,
        price,
        price_cents,
        currency: order.currency,
    }))
}

/// What the customer's status page polls.
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub id: String,
    pub status: OrderStatus,
    pub progress: i64,
    pub current_stage: Option<String>,
    pub app_name: String,
    pub delivery_method: DeliveryMethod,
    pub price_cents: i64,
    pub currency: String,
    pub build_logs: Vec<String>,
    pub delivery_url: Option<String>,
    pub admin_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub paid_at: Option<i64>,
    pub build_started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

pub async fn get_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderStatusResponse>> {
    if !is_valid_prefixed_id(&order_id) {
        return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    let build_logs = queries::get_build_logs(&conn, &order_id)?;

    Ok(Json(OrderStatusResponse {
        id: order.id,
        status: order.status,
        progress: order.progress,
        current_stage: order.current_stage,
        app_name: order.app_name,
        delivery_method: order.delivery_method,
        price_cents: order.price_cents,
        currency: order.currency,
        build_logs,
        delivery_url: order.delivery_url,
        admin_url: order.admin_url,
        error_message: order.error_message,
        created_at: order.created_at,
        updated_at: order.updated_at,
        paid_at: order.paid_at,
        build_started_at: order.build_started_at,
        completed_at: order.completed_at,
    }))
}
