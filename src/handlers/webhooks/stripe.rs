use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::{AppState, queries};
use crate::lifecycle::{self, ConfirmOutcome, TransitionOutcome};
use crate::payments::{StripeCharge, StripeCheckoutSession, StripeWebhookEvent, verify_webhook_signature};

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// Order-relevant content of a Stripe event.
#[derive(Debug)]
enum WebhookEvent {
    /// Money captured for a checkout session
    PaymentSucceeded {
        order_ref: OrderRef,
        payment_intent: Option<String>,
    },
    /// Checkout failed or expired before payment
    PaymentFailed { order_ref: OrderRef, reason: &'static str },
    /// Charge refunded from the Stripe dashboard
    Refunded { payment_intent: String },
    Ignored,
}

/// How to find the order an event refers to.
#[derive(Debug)]
struct OrderRef {
    order_id: Option<String>,
    session_id: String,
}

fn extract_signature(headers: &HeaderMap) -> Result<&str, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

fn parse_checkout_session(event: &StripeWebhookEvent) -> Result<StripeCheckoutSession, WebhookResult> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse checkout session: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid checkout session")
    })
}

fn order_ref(session: &StripeCheckoutSession) -> OrderRef {
    OrderRef {
        order_id: session.order_id().map(String::from),
        session_id: session.id.clone(),
    }
}

fn parse_event(event: &StripeWebhookEvent) -> Result<WebhookEvent, WebhookResult> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session = parse_checkout_session(event)?;
            // Delayed payment methods complete unpaid; the async_payment_* event follows
            if session.payment_status != "paid" {
                tracing::debug!(
                    "Checkout session {} completed with payment_status={}, waiting",
                    session.id,
                    session.payment_status
                );
                return Ok(WebhookEvent::Ignored);
            }
            Ok(WebhookEvent::PaymentSucceeded {
                order_ref: order_ref(&session),
                payment_intent: session.payment_intent,
            })
        }
        "checkout.session.async_payment_succeeded" => {
            let session = parse_checkout_session(event)?;
            Ok(WebhookEvent::PaymentSucceeded {
                order_ref: order_ref(&session),
                payment_intent: session.payment_intent,
            })
        }
        "checkout.session.async_payment_failed" => {
            let session = parse_checkout_session(event)?;
            Ok(WebhookEvent::PaymentFailed {
                order_ref: order_ref(&session),
                reason: "Payment failed",
            })
        }
        "checkout.session.expired" => {
            let session = parse_checkout_session(event)?;
            Ok(WebhookEvent::PaymentFailed {
                order_ref: order_ref(&session),
                reason: "Checkout session expired",
            })
        }
        "charge.refunded" => {
            let charge: StripeCharge = serde_json::from_value(event.data.object.clone())
                .map_err(|e| {
                    tracing::error!("Failed to parse charge: {}", e);
                    (StatusCode::BAD_REQUEST, "Invalid charge")
                })?;
            // Partial refunds also fire charge.refunded; the order stays as it is
            if !charge.is_fully_refunded() {
                tracing::info!(
                    "Charge {} partially refunded ({} of {} cents), order unchanged",
                    charge.id,
                    charge.amount_refunded,
                    charge.amount
                );
                return Ok(WebhookEvent::Ignored);
            }
            match charge.payment_intent {
                Some(payment_intent) => Ok(WebhookEvent::Refunded { payment_intent }),
                None => {
                    tracing::warn!("Refunded charge {} has no payment intent", charge.id);
                    Ok(WebhookEvent::Ignored)
                }
            }
        }
        _ => Ok(WebhookEvent::Ignored),
    }
}

fn db_error(e: impl std::fmt::Display) -> WebhookResult {
    tracing::error!("DB error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
}

/// Resolve an event's order id, falling back to the checkout session id.
fn resolve_order_id(state: &AppState, order_ref: &OrderRef) -> Result<Option<String>, WebhookResult> {
    let conn = state.db.get().map_err(db_error)?;
    if let Some(ref order_id) = order_ref.order_id
        && queries::get_order_by_id(&conn, order_id)
            .map_err(db_error)?
            .is_some()
    {
        return Ok(Some(order_id.clone()));
    }
    Ok(queries::get_order_by_checkout_session(&conn, &order_ref.session_id)
        .map_err(db_error)?
        .map(|o| o.id))
}

fn handle_payment_succeeded(
    state: &AppState,
    order_ref: OrderRef,
    payment_intent: Option<String>,
) -> WebhookResult {
    let order_id = match resolve_order_id(state, &order_ref) {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::warn!(
                "Stripe payment for unknown order (order_id={:?}, session={})",
                order_ref.order_id,
                order_ref.session_id
            );
            return (StatusCode::OK, "Order not found");
        }
        Err(e) => return e,
    };

    match lifecycle::confirm_payment(state, &order_id, payment_intent.as_deref()) {
        Ok(ConfirmOutcome::Confirmed) => (StatusCode::OK, "OK"),
        Ok(ConfirmOutcome::AlreadyProcessed(status)) => {
            tracing::info!(
                "Payment for order {} already processed (status={})",
                order_id,
                status.as_ref()
            );
            (StatusCode::OK, "Already processed")
        }
        Ok(ConfirmOutcome::NotFound) => {
            tracing::warn!("Order {} vanished during payment confirmation", order_id);
            (StatusCode::OK, "Order not found")
        }
        Err(e) => db_error(e),
    }
}

fn handle_payment_failed(state: &AppState, order_ref: OrderRef, reason: &str) -> WebhookResult {
    let order_id = match resolve_order_id(state, &order_ref) {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::warn!(
                "Stripe payment failure for unknown order (session={})",
                order_ref.session_id
            );
            return (StatusCode::OK, "Order not found");
        }
        Err(e) => return e,
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return db_error(e),
    };
    match lifecycle::fail_payment(&conn, &order_id, reason) {
        Ok(TransitionOutcome::Applied(_)) => (StatusCode::OK, "OK"),
        Ok(TransitionOutcome::Rejected(status)) => {
            tracing::info!(
                "Ignoring payment failure for order {} in status {}",
                order_id,
                status.as_ref()
            );
            (StatusCode::OK, "Already processed")
        }
        Ok(TransitionOutcome::NotFound) => (StatusCode::OK, "Order not found"),
        Err(e) => db_error(e),
    }
}

fn handle_refund(state: &AppState, payment_intent: &str) -> WebhookResult {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return db_error(e),
    };
    match lifecycle::refund_by_payment_intent(&conn, payment_intent) {
        Ok(TransitionOutcome::Applied(order)) => {
            tracing::info!("Order {} refunded via Stripe", order.id);
            (StatusCode::OK, "OK")
        }
        Ok(TransitionOutcome::Rejected(status)) => {
            tracing::info!(
                "Refund for payment {} ignored: order in status {}",
                payment_intent,
                status.as_ref()
            );
            (StatusCode::OK, "Already processed")
        }
        Ok(TransitionOutcome::NotFound) => {
            tracing::warn!("Refund for unknown payment intent {}", payment_intent);
            (StatusCode::OK, "Order not found")
        }
        Err(e) => db_error(e),
    }
}

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let Some(ref secret) = state.webhook_secret else {
        tracing::warn!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        return (StatusCode::BAD_REQUEST, "Webhook secret not configured");
    };

    let signature = match extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match verify_webhook_signature(secret, &body, signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid signature"),
        Err(e) => {
            tracing::warn!("Stripe signature rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match state.db.get().map_err(db_error).and_then(|conn| {
        queries::webhook_event_seen(&conn, &event.id).map_err(db_error)
    }) {
        Ok(true) => {
            tracing::debug!("Stripe event {} already processed", event.id);
            return (StatusCode::OK, "Already processed");
        }
        Ok(false) => {}
        Err(e) => return e,
    }

    let parsed = match parse_event(&event) {
        Ok(p) => p,
        Err(e) => return e,
    };

    let result = match parsed {
        WebhookEvent::PaymentSucceeded {
            order_ref,
            payment_intent,
        } => handle_payment_succeeded(&state, order_ref, payment_intent),
        WebhookEvent::PaymentFailed { order_ref, reason } => {
            handle_payment_failed(&state, order_ref, reason)
        }
        WebhookEvent::Refunded { payment_intent } => handle_refund(&state, &payment_intent),
        WebhookEvent::Ignored => return (StatusCode::OK, "Ignored"),
    };

    // Only successfully handled events are recorded; failures stay retryable
    if result.0 == StatusCode::OK {
        let recorded = state.db.get().map_err(db_error).and_then(|conn| {
            queries::record_webhook_event(&conn, &event.id, &event.event_type).map_err(db_error)
        });
        if let Err(e) = recorded {
            return e;
        }
    }

    result
}
