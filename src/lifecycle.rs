//! Order lifecycle transitions.
//!
//! Every transition is a single guarded UPDATE, so the first caller to move
//! an order wins and repeats (duplicate webhooks, concurrent polls, double
//! clicks) observe the new state instead of re-applying it.

use chrono::Utc;
use rusqlite::Connection;

use crate::build;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::{Order, OrderStatus};

const BUILD_INTERRUPTED: &str = "Build interrupted by restart";

/// Result of a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// This call moved the order to `paid` and started its build.
    Confirmed,
    /// The order had already left `pending_payment`.
    AlreadyProcessed(OrderStatus),
    NotFound,
}

/// Result of any other guarded transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Order),
    /// The order exists but its current status does not allow the move.
    Rejected(OrderStatus),
    NotFound,
}

impl TransitionOutcome {
    /// Map to an HTTP-friendly result: 409 for rejected, 404 for missing.
    pub fn into_result(self, action: &str) -> Result<Order> {
        match self {
            Self::Applied(order) => Ok(order),
            Self::Rejected(status) => Err(AppError::Conflict(format!(
                "Cannot {} an order in status {}",
                action,
                status.as_ref()
            ))),
            Self::NotFound => Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into())),
        }
    }
}

fn outcome(conn: &Connection, order_id: &str, applied: bool) -> Result<TransitionOutcome> {
    let order = queries::get_order_by_id(conn, order_id)?;
    Ok(match (applied, order) {
        (true, Some(order)) => TransitionOutcome::Applied(order),
        (false, Some(order)) => TransitionOutcome::Rejected(order.status),
        (_, None) => TransitionOutcome::NotFound,
    })
}

/// Confirm payment for an order and kick off its build.
///
/// Shared by the webhook and the checkout-session poll; whichever arrives
/// first wins and the other sees `AlreadyProcessed`.
pub fn confirm_payment(
    state: &AppState,
    order_id: &str,
    payment_intent: Option<&str>,
) -> Result<ConfirmOutcome> {
    let mut conn = state.db.get()?;
    // Claim, log line and customer spend commit together; a failed side
    // write rolls the claim back so a redelivered event can confirm again.
    let tx = conn.transaction()?;

    if !queries::try_mark_order_paid(&tx, order_id, payment_intent)? {
        return Ok(match queries::get_order_by_id(&tx, order_id)? {
            Some(order) => {
                if !order.status.is_paid_or_later() {
                    tracing::warn!(
                        "Payment confirmation for order {} in status {} ignored",
                        order_id,
                        order.status.as_ref()
                    );
                }
                ConfirmOutcome::AlreadyProcessed(order.status)
            }
            None => ConfirmOutcome::NotFound,
        });
    }

    queries::append_build_log(&tx, order_id, "Payment confirmed")?;
    if let Some(order) = queries::get_order_by_id(&tx, order_id)?
        && let Some(ref customer_id) = order.customer_id
    {
        queries::add_customer_spend(&tx, customer_id, order.price_cents)?;
    }
    tx.commit()?;
    drop(conn);

    tracing::info!("Order {} paid", order_id);
    build::spawn_build(state.clone(), order_id.to_string());
    Ok(ConfirmOutcome::Confirmed)
}

/// `pending_payment → payment_failed`.
pub fn fail_payment(conn: &Connection, order_id: &str, reason: &str) -> Result<TransitionOutcome> {
    let applied = queries::try_fail_order(conn, order_id, OrderStatus::PaymentFailed, reason)?;
    if applied {
        queries::append_build_log(conn, order_id, &format!("Payment failed: {}", reason))?;
        tracing::info!("Order {} payment failed: {}", order_id, reason);
    }
    outcome(conn, order_id, applied)
}

pub fn cancel_order(conn: &Connection, order_id: &str) -> Result<TransitionOutcome> {
    let applied = queries::try_cancel_order(conn, order_id)?;
    if applied {
        queries::append_build_log(conn, order_id, "Order cancelled")?;
        tracing::info!("Order {} cancelled", order_id);
    }
    outcome(conn, order_id, applied)
}

pub fn refund_order(conn: &Connection, order_id: &str) -> Result<TransitionOutcome> {
    let applied = queries::try_refund_order(conn, order_id)?;
    if applied {
        queries::append_build_log(conn, order_id, "Order refunded")?;
        tracing::info!("Order {} refunded", order_id);
    }
    let result = outcome(conn, order_id, applied)?;
    if let TransitionOutcome::Applied(ref order) = result
        && let Some(ref customer_id) = order.customer_id
    {
        queries::add_customer_spend(conn, customer_id, -order.price_cents)?;
    }
    Ok(result)
}

/// Refund the order paid with `payment_intent` (provider-initiated refunds).
pub fn refund_by_payment_intent(conn: &Connection, payment_intent: &str) -> Result<TransitionOutcome> {
    match queries::get_order_by_payment_intent(conn, payment_intent)? {
        Some(order) => refund_order(conn, &order.id),
        None => Ok(TransitionOutcome::NotFound),
    }
}

/// `build_failed → building`, then run the pipeline again from the start.
pub fn retry_build(state: &AppState, order_id: &str) -> Result<TransitionOutcome> {
    let conn = state.db.get()?;
    let current = queries::get_order_by_id(&conn, order_id)?;
    let Some(current) = current else {
        return Ok(TransitionOutcome::NotFound);
    };
    // Paid orders get their build from the payment path, not from a retry
    if current.status != OrderStatus::BuildFailed {
        return Ok(TransitionOutcome::Rejected(current.status));
    }

    let applied = queries::try_start_build(&conn, order_id)?;
    if applied {
        queries::append_build_log(&conn, order_id, "Build restarted")?;
    }
    let result = outcome(&conn, order_id, applied)?;
    drop(conn);

    if applied {
        tracing::info!("Order {} build restarted", order_id);
        build::spawn_claimed_build(state.clone(), order_id.to_string());
    }
    Ok(result)
}

/// What startup recovery did with builds the previous process left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveredBuilds {
    /// `building` orders moved to `build_failed`, open to an admin retry.
    pub failed: usize,
    /// `paid` orders whose build never started, started now.
    pub resumed: usize,
}

/// Build tasks do not survive a restart. Run once at startup, before
/// serving: a build caught mid-way fails with a retryable error, and a
/// paid order that never reached `building` gets its build started.
pub fn recover_interrupted_builds(state: &AppState) -> Result<RecoveredBuilds> {
    let conn = state.db.get()?;
    let mut recovered = RecoveredBuilds::default();

    for order_id in queries::order_ids_with_status(&conn, OrderStatus::Building)? {
        if queries::try_fail_order(&conn, &order_id, OrderStatus::BuildFailed, BUILD_INTERRUPTED)? {
            queries::append_build_log(&conn, &order_id, &format!("Build failed: {}", BUILD_INTERRUPTED))?;
            recovered.failed += 1;
        }
    }
    let paid = queries::order_ids_with_status(&conn, OrderStatus::Paid)?;
    drop(conn);

    for order_id in paid {
        build::spawn_build(state.clone(), order_id);
        recovered.resumed += 1;
    }

    if recovered != RecoveredBuilds::default() {
        tracing::warn!(
            "Recovered interrupted builds: {} failed, {} resumed",
            recovered.failed,
            recovered.resumed
        );
    }
    Ok(recovered)
}

/// Fail unpaid orders older than `ttl_hours`. `0` disables expiry.
pub fn expire_stale_orders(conn: &Connection, ttl_hours: i64) -> Result<usize> {
    if ttl_hours <= 0 {
        return Ok(0);
    }
    let cutoff = Utc::now().timestamp() - ttl_hours * 3600;
    let expired = queries::expire_stale_orders(conn, cutoff)?;
    if expired > 0 {
        tracing::info!("Expired {} unpaid orders", expired);
    }
    Ok(expired)
}
