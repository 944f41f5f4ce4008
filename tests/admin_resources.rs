//! Admin JSON API: orders, customers, apps, analytics, roles and sessions

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_order_listing_and_detail() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let token = admin_login(&app).await;

    let first = place_order(&app, &order_payload()).await;
    let second = place_order(&app, &order_payload()).await;
    let paid_id = second["order_id"].as_str().unwrap();
    let event = checkout_completed_event("evt_admin", second["session_id"].as_str().unwrap(), paid_id);
    send(&app, stripe_webhook_request(&event)).await;
    wait_for_status(&state, paid_id, OrderStatus::Completed).await;

    let (status, body) = send(&app, authed("GET", "/api/admin/orders?limit=10", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 10);

    let (status, body) = send(
        &app,
        authed("GET", "/api/admin/orders?status=pending_payment", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], first["order_id"]);

    let (status, body) = send(
        &app,
        authed("GET", &format!("/api/admin/orders/{}", paid_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["build_logs"].as_array().unwrap().len() > 10);

    let (status, _) = send(
        &app,
        authed("GET", "/api/admin/orders/af_ord_00000000000000000000000000000000", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_actions() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let token = admin_login(&app).await;

    let pending = place_order(&app, &order_payload()).await;
    let pending_id = pending["order_id"].as_str().unwrap();

    // Refund needs a captured payment
    let (status, _) = send(
        &app,
        authed("POST", &format!("/api/admin/orders/{}/refund", pending_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        authed("POST", &format!("/api/admin/orders/{}/cancel", pending_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // Cancelled is final
    let (status, _) = send(
        &app,
        authed("POST", &format!("/api/admin/orders/{}/cancel", pending_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        authed("POST", &format!("/api/admin/orders/{}/retry-build", pending_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A failed build can be retried through to completion
    let failed = place_order(&app, &order_payload()).await;
    let failed_id = failed["order_id"].as_str().unwrap();
    {
        let conn = state.db.get().unwrap();
        queries::try_mark_order_paid(&conn, failed_id, Some("pi_retry")).unwrap();
        queries::try_start_build(&conn, failed_id).unwrap();
        queries::try_fail_order(&conn, failed_id, OrderStatus::BuildFailed, "disk full").unwrap();
    }
    let (status, body) = send(
        &app,
        authed("POST", &format!("/api/admin/orders/{}/retry-build", failed_id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "building");
    wait_for_status(&state, failed_id, OrderStatus::Completed).await;
}

#[tokio::test]
async fn test_customer_search_treats_wildcards_literally() {
    let state = create_test_app_state();
    let app = test_app(state);
    let token = admin_login(&app).await;

    for (email, name) in [("pct@example.com", "100% Club"), ("grace@example.com", "Grace")] {
        let (status, _) = send(
            &app,
            authed(
                "POST",
                "/api/admin/customers",
                &token,
                Some(&json!({ "email": email, "name": name })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, authed("GET", "/api/admin/customers?search=%25", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["name"], "100% Club");

    let (status, body) = send(&app, authed("GET", "/api/admin/customers?search=_", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_customer_crud() {
    let state = create_test_app_state();
    let app = test_app(state);
    let token = admin_login(&app).await;

    let (status, created) = send(
        &app,
        authed(
            "POST",
            "/api/admin/customers",
            &token,
            Some(&json!({ "email": "Grace@Example.com", "name": "Grace Hopper", "company": "Navy" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["email"], "grace@example.com");
    assert_eq!(created["status"], "active");
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/admin/customers",
            &token,
            Some(&json!({ "email": "grace@example.com", "name": "Dup" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/api/admin/customers",
            &token,
            Some(&json!({ "email": "bad", "name": " " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        authed("GET", "/api/admin/customers?search=hopper", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/admin/customers/{}", id),
            &token,
            Some(&json!({ "status": "vip", "notes": "Prefers email" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "vip");
    assert_eq!(body["name"], "Grace Hopper");

    let (status, _) = send(&app, authed("DELETE", &format!("/api/admin/customers/{}", id), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, authed("GET", &format!("/api/admin/customers/{}", id), &token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, authed("DELETE", &format!("/api/admin/customers/{}", id), &token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_app_crud() {
    let state = create_test_app_state();
    let app = test_app(state);
    let token = admin_login(&app).await;

    let (status, created) = send(
        &app,
        authed(
            "POST",
            "/api/admin/apps",
            &token,
            Some(&json!({
                "name": "Legacy Portal",
                "app_type": "web",
                "delivery_method": "deployed",
                "delivery_url": "https://legacy.apps.appforge.dev"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "active");
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("af_app_"));

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/admin/apps/{}", id),
            &token,
            Some(&json!({ "status": "maintenance", "version": "1.1.0" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "maintenance");
    assert_eq!(body["version"], "1.1.0");

    let (status, body) = send(&app, authed("GET", "/api/admin/apps?status=maintenance", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let (status, body) = send(&app, authed("GET", "/api/admin/apps?status=archived", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/admin/apps",
            &token,
            Some(&json!({
                "name": "Orphan",
                "app_type": "web",
                "delivery_method": "zip",
                "order_id": "af_ord_00000000000000000000000000000000"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, authed("DELETE", &format!("/api/admin/apps/{}", id), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, authed("GET", &format!("/api/admin/apps/{}", id), &token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_financial_analytics() {
    let state = create_test_app_state();
    let app = test_app(state.clone());
    let token = admin_login(&app).await;

    place_order(&app, &order_payload()).await;
    let paid = place_order(&app, &order_payload()).await;
    let paid_id = paid["order_id"].as_str().unwrap();
    let event = checkout_completed_event("evt_analytics", paid["session_id"].as_str().unwrap(), paid_id);
    send(&app, stripe_webhook_request(&event)).await;
    wait_for_status(&state, paid_id, OrderStatus::Completed).await;

    let (status, body) = send(&app, authed("GET", "/api/admin/analytics", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "usd");
    assert_eq!(body["order_count"], 2);
    assert_eq!(body["paid_order_count"], 1);
    assert_eq!(body["total_revenue_cents"], 150_000);
    assert_eq!(body["orders_by_status"]["completed"], 1);
    assert_eq!(body["orders_by_status"]["pending_payment"], 1);
}

#[tokio::test]
async fn test_role_management() {
    let state = create_test_app_state();
    let app = test_app(state);
    let token = admin_login(&app).await;

    let (status, body) = send(&app, authed("GET", "/api/admin/permissions", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 8);

    let (status, roles) = send(&app, authed("GET", "/api/admin/roles", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let built_in = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "viewer")
        .unwrap()
        .clone();
    assert_eq!(built_in["built_in"], true);

    let (status, role) = send(
        &app,
        authed(
            "POST",
            "/api/admin/roles",
            &token,
            Some(&json!({
                "name": "support",
                "description": "Front-line support",
                "permissions": ["orders:read", "customers:read"]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(role["permissions"], json!(["orders:read", "customers:read"]));
    let role_id = role["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        authed("POST", "/api/admin/roles", &token, Some(&json!({ "name": "support" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/api/admin/roles",
            &token,
            Some(&json!({ "name": "ops", "permissions": ["orders:read", "root:all"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "permissions[1]");

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/admin/roles/{}", role_id),
            &token,
            Some(&json!({ "permissions": ["orders:read", "orders:write"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"], json!(["orders:read", "orders:write"]));

    let (status, _) = send(
        &app,
        authed(
            "DELETE",
            &format!("/api/admin/roles/{}", built_in["id"].as_str().unwrap()),
            &token,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, authed("DELETE", &format!("/api/admin/roles/{}", role_id), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn test_session_management() {
    let state = create_test_app_state();
    let app = test_app(state);
    let token = admin_login(&app).await;
    let other = admin_login(&app).await;

    let (status, body) = send(&app, authed("GET", "/api/admin/sessions?active_only=true", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert!(body["items"][0].get("token_hash").is_none(), "hash never leaves the server");

    let other_id = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| other.starts_with(s["token_prefix"].as_str().unwrap()))
        .map(|s| s["id"].as_str().unwrap().to_string())
        .unwrap();

    let (status, body) = send(&app, authed("DELETE", &format!("/api/admin/sessions/{}", other_id), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);

    let (status, _) = send(&app, authed("GET", "/api/admin/orders", &other, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, authed("GET", "/api/admin/sessions?active_only=true", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = send(
        &app,
        authed("DELETE", "/api/admin/sessions/af_ses_00000000000000000000000000000000", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
