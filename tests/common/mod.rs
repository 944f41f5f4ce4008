//! Test utilities and fixtures for AppForge integration tests

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{Value, json};
use tower::ServiceExt;

pub use appforge::config::{AdminCredentials, BuildSimulationConfig, DeliveryConfig, RateLimitConfig};
pub use appforge::db::{AppState, init_db, queries};
pub use appforge::models::*;
pub use appforge::payments::{CheckoutGateway, SimulatedCheckout};

pub const BASE_URL: &str = "http://localhost:3000";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ADMIN_EMAIL: &str = "admin@appforge.test";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Create an AppState backed by a single in-memory connection.
///
/// Each in-memory SQLite connection is its own database, so the pool holds
/// exactly one. Build stages run back to back.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: BASE_URL.to_string(),
        dev_mode: true,
        admin: AdminCredentials {
            email: Some(ADMIN_EMAIL.to_string()),
            password: Some(ADMIN_PASSWORD.to_string()),
            role: "super_admin".to_string(),
        },
        session_ttl_secs: 3600,
        webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        currency: "usd".to_string(),
        checkout: CheckoutGateway::Simulated(SimulatedCheckout::new(BASE_URL)),
        build: BuildSimulationConfig {
            step_min_ms: 0,
            step_max_ms: 0,
        },
        delivery: DeliveryConfig::default(),
    }
}

/// The full router with rate limiting disabled.
pub fn test_app(state: AppState) -> Router {
    appforge::handlers::app(
        state,
        RateLimitConfig {
            strict_rpm: 0,
            standard_rpm: 0,
            relaxed_rpm: 0,
        },
    )
}

/// A valid order form: simple complexity, one week, no features ($1500).
pub fn order_payload() -> Value {
    json!({
        "customer_name": "Ada Lovelace",
        "customer_email": "ada@example.com",
        "app_name": "Fleet Tracker",
        "app_description": "Tracks delivery vans and their routes",
        "app_type": "web",
        "platforms": ["web"],
        "complexity": "simple",
        "timeline": "1w",
        "features": [],
        "delivery_method": "github",
        "github_username": "ada",
        "price": 1500.0
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, json)
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Submit an order through the API and return the response body.
pub async fn place_order(app: &Router, payload: &Value) -> Value {
    let (status, body) = send(app, json_request("POST", "/api/orders", payload)).await;
    assert_eq!(status, StatusCode::OK, "order creation failed: {}", body);
    body
}

/// Get current Unix timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// A signed `POST /api/webhooks/stripe` request.
pub fn stripe_webhook_request(event: &Value) -> Request<Body> {
    let payload = serde_json::to_vec(event).unwrap();
    let timestamp = now().to_string();
    let signature = compute_stripe_signature(&payload, WEBHOOK_SECRET, &timestamp);
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("content-type", "application/json")
        .header("stripe-signature", format!("t={},v1={}", timestamp, signature))
        .body(Body::from(payload))
        .unwrap()
}

pub fn checkout_completed_event(event_id: &str, session_id: &str, order_id: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "payment_intent": format!("pi_{}", event_id),
                "client_reference_id": order_id,
                "metadata": { "order_id": order_id }
            }
        }
    })
}

pub fn get_order(state: &AppState, order_id: &str) -> Order {
    let conn = state.db.get().unwrap();
    queries::get_order_by_id(&conn, order_id).unwrap().unwrap()
}

/// Poll until the order reaches `status` or two seconds pass.
pub async fn wait_for_status(state: &AppState, order_id: &str, status: OrderStatus) -> Order {
    for _ in 0..200 {
        let order = get_order(state, order_id);
        if order.status == status {
            return order;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let order = get_order(state, order_id);
    panic!(
        "order {} stuck in {} (wanted {})",
        order_id,
        order.status.as_ref(),
        status.as_ref()
    );
}

/// Log in with the configured credentials and return the session token.
pub async fn admin_login(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/admin/auth/login",
            &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

pub fn authed(method: &str, uri: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
