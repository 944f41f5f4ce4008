//! Stripe webhook handling: signatures, payment events, idempotency

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::{Value, json};

async fn new_order(app: &axum::Router) -> (String, String) {
    let body = place_order(app, &order_payload()).await;
    (
        body["order_id"].as_str().unwrap().to_string(),
        body["session_id"].as_str().unwrap().to_string(),
    )
}

fn session_event(event_id: &str, event_type: &str, session_id: &str, order_id: &str) -> Value {
    json!({
        "id": event_id,
        "type": event_type,
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "unpaid",
                "metadata": { "order_id": order_id }
            }
        }
    })
}

#[tokio::test]
async fn test_unsigned_webhook_rejected() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = checkout_completed_event("evt_unsigned", &session_id, &order_id);
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&event).unwrap()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("stripe-signature", format!("t={},v1={}", now(), "0".repeat(64)))
        .body(Body::from(serde_json::to_vec(&event).unwrap()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(get_order(&state, &order_id).status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn test_webhook_rejected_without_secret() {
    let mut state = create_test_app_state();
    state.webhook_secret = None;
    let app = test_app(state);

    let event = checkout_completed_event("evt_nosecret", "cs_x", "af_ord_x");
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paid_webhook_drives_order_to_completion() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = checkout_completed_event("evt_paid", &session_id, &order_id);
    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));

    let paid = get_order(&state, &order_id);
    assert!(paid.status.is_paid_or_later(), "status {:?}", paid.status);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.payment_intent_id.as_deref(), Some("pi_evt_paid"));

    let order = wait_for_status(&state, &order_id, OrderStatus::Completed).await;
    assert_eq!(order.progress, 100);
    assert!(order.build_started_at.is_some());
    assert!(order.completed_at.is_some());
    assert_eq!(
        order.delivery_url.as_deref(),
        Some("https://github.com/ada/fleet-tracker")
    );

    let conn = state.db.get().unwrap();
    let logs = queries::get_build_logs(&conn, &order_id).unwrap();
    assert_eq!(logs.first().map(String::as_str), Some("Order received, awaiting payment"));
    assert!(logs.iter().any(|l| l == "Payment confirmed"));
    assert!(logs.last().unwrap().starts_with("Build completed"));

    let app_record = queries::get_app_by_order(&conn, &order_id).unwrap();
    assert!(app_record.is_some(), "completion registers an app");

    let customer = queries::get_customer_by_id(&conn, order.customer_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(customer.total_spent_cents, 150_000);
}

#[tokio::test]
async fn test_duplicate_delivery_is_acknowledged_once() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = checkout_completed_event("evt_dup", &session_id, &order_id);
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    let completed = wait_for_status(&state, &order_id, OrderStatus::Completed).await;

    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Already processed"));

    let order = get_order(&state, &order_id);
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.progress, 100);
    assert_eq!(order.updated_at, completed.updated_at);
}

#[tokio::test]
async fn test_redelivery_during_build_does_not_restart_it() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    // Same payment, two distinct event ids, delivered back to back
    let first = checkout_completed_event("evt_first", &session_id, &order_id);
    let second = checkout_completed_event("evt_second", &session_id, &order_id);
    let (status, _) = send(&app, stripe_webhook_request(&first)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, stripe_webhook_request(&second)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Already processed"));

    let order = wait_for_status(&state, &order_id, OrderStatus::Completed).await;
    assert_eq!(order.progress, 100);

    let conn = state.db.get().unwrap();
    let logs = queries::get_build_logs(&conn, &order_id).unwrap();
    let starts = logs.iter().filter(|l| *l == "Build started").count();
    assert_eq!(starts, 1, "build must run once: {:?}", logs);
    let payments = logs.iter().filter(|l| *l == "Payment confirmed").count();
    assert_eq!(payments, 1);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_noop() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, _) = new_order(&app).await;

    let event = checkout_completed_event(
        "evt_unknown",
        "cs_missing",
        "af_ord_ffffffffffffffffffffffffffffffff",
    );
    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Order not found"));

    assert_eq!(get_order(&state, &order_id).status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn test_order_resolved_by_session_id_without_metadata() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = json!({
        "id": "evt_nometa",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_status": "paid",
            "payment_intent": "pi_nometa"
        }}
    });
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(&state, &order_id, OrderStatus::Completed).await;
}

#[tokio::test]
async fn test_unpaid_completion_waits_for_async_payment() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = session_event("evt_unpaid", "checkout.session.completed", &session_id, &order_id);
    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Ignored"));
    assert_eq!(get_order(&state, &order_id).status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn test_expired_session_fails_payment() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;

    let event = session_event("evt_expired", "checkout.session.expired", &session_id, &order_id);
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);

    let order = get_order(&state, &order_id);
    assert_eq!(order.status, OrderStatus::PaymentFailed);
    assert_eq!(order.error_message.as_deref(), Some("Checkout session expired"));
    assert!(order.failed_at.is_some());

    // A late success does not resurrect the order
    let paid = checkout_completed_event("evt_late", &session_id, &order_id);
    let (status, body) = send(&app, stripe_webhook_request(&paid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Already processed"));
    assert_eq!(get_order(&state, &order_id).status, OrderStatus::PaymentFailed);
}

#[tokio::test]
async fn test_charge_refunded_refunds_paid_order() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, _) = new_order(&app).await;
    {
        let conn = state.db.get().unwrap();
        assert!(queries::try_mark_order_paid(&conn, &order_id, Some("pi_refund_me")).unwrap());
    }

    let event = json!({
        "id": "evt_refund",
        "type": "charge.refunded",
        "data": { "object": {
            "id": "ch_1",
            "payment_intent": "pi_refund_me",
            "refunded": true
        }}
    });
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);

    let order = get_order(&state, &order_id);
    assert_eq!(order.status, OrderStatus::Refunded);
    assert!(order.refunded_at.is_some());
}

#[tokio::test]
async fn test_partial_refund_leaves_order_alone() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, _) = new_order(&app).await;
    {
        let conn = state.db.get().unwrap();
        assert!(queries::try_mark_order_paid(&conn, &order_id, Some("pi_partial")).unwrap());
    }

    let event = json!({
        "id": "evt_partial_refund",
        "type": "charge.refunded",
        "data": { "object": {
            "id": "ch_2",
            "payment_intent": "pi_partial",
            "refunded": false,
            "amount": 150000,
            "amount_refunded": 1000
        }}
    });
    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Ignored"));

    let order = get_order(&state, &order_id);
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.refunded_at.is_none());
}

#[tokio::test]
async fn test_failed_confirmation_can_be_redelivered() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let (order_id, session_id) = new_order(&app).await;
    {
        let conn = state.db.get().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_confirm_log BEFORE INSERT ON build_logs
             WHEN NEW.message = 'Payment confirmed'
             BEGIN SELECT RAISE(ABORT, 'log write failed'); END;",
        )
        .unwrap();
    }

    let event = checkout_completed_event("evt_flaky", &session_id, &order_id);
    let (status, _) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Nothing from the failed attempt sticks
    let order = get_order(&state, &order_id);
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert!(order.payment_intent_id.is_none());
    assert!(order.paid_at.is_none());

    {
        let conn = state.db.get().unwrap();
        conn.execute_batch("DROP TRIGGER reject_confirm_log").unwrap();
    }

    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));

    let order = wait_for_status(&state, &order_id, OrderStatus::Completed).await;
    let conn = state.db.get().unwrap();
    let logs = queries::get_build_logs(&conn, &order_id).unwrap();
    assert_eq!(logs.iter().filter(|l| *l == "Payment confirmed").count(), 1);
    let customer = queries::get_customer_by_id(&conn, order.customer_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(customer.total_spent_cents, 150_000);
}

#[tokio::test]
async fn test_unhandled_event_type_ignored() {
    let state = create_test_app_state();
    let app = test_app(state);

    let event = json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    });
    let (status, body) = send(&app, stripe_webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Ignored"));
}
