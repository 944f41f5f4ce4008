use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

use crate::crypto::constant_time_eq;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::{SESSION_COOKIE, authenticate, extract_session_token, resolve_permissions};
use crate::models::{CreateAdminSession, LoginRequest, Permission};
use crate::util::extract_request_info;

#[derive(Debug, Serialize)]
pub struct AdminIdentity {
    pub email: String,
    pub role: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub admin: AdminIdentity,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub expires_at: i64,
    pub last_activity: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub admin: AdminIdentity,
    pub session: SessionInfo,
}

fn session_cookie(token: String, ttl_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs))
        .secure(secure)
        .build()
}

fn credentials_match(state: &AppState, email: &str, password: &str) -> bool {
    let (Some(expected_email), Some(expected_password)) =
        (state.admin.email.as_deref(), state.admin.password.as_deref())
    else {
        tracing::warn!("Admin login attempted but ADMIN_EMAIL/ADMIN_PASSWORD are not set");
        return false;
    };
    // Evaluate both so timing does not reveal which one failed
    let email_ok = constant_time_eq(&email.trim().to_lowercase(), &expected_email.to_lowercase());
    let password_ok = constant_time_eq(password, expected_password);
    email_ok & password_ok
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    if !credentials_match(&state, &request.email, &request.password) {
        tracing::info!("Failed admin login for {}", request.email.trim());
        return Err(AppError::Unauthorized);
    }

    let (ip_address, user_agent) = extract_request_info(&headers);
    let conn = state.db.get()?;
    let (session, token) = queries::create_admin_session(
        &conn,
        &CreateAdminSession {
            admin_email: request.email.trim().to_lowercase(),
            role: state.admin.role.clone(),
            ip_address,
            user_agent,
            ttl_secs: state.session_ttl_secs,
        },
    )?;
    let permissions = resolve_permissions(&conn, &session.role)?;
    tracing::info!("Admin {} logged in (session {})", session.admin_email, session.id);

    let jar = jar.add(session_cookie(
        token.clone(),
        state.session_ttl_secs,
        !state.dev_mode,
    ));

    let body = LoginResponse {
        token,
        expires_at: session.expires_at,
        admin: AdminIdentity {
            email: session.admin_email,
            role: session.role,
            permissions,
        },
    };
    Ok((jar, Json(body)).into_response())
}

pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>> {
    let ctx = authenticate(&state, &headers)?;
    Ok(Json(SessionResponse {
        authenticated: true,
        admin: AdminIdentity {
            email: ctx.session.admin_email,
            role: ctx.session.role,
            permissions: ctx.permissions,
        },
        session: SessionInfo {
            id: ctx.session.id,
            expires_at: ctx.session.expires_at,
            // authenticate() just touched it
            last_activity: chrono::Utc::now().timestamp(),
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Revoke the presented session and clear the cookie. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response> {
    if let Some(token) = extract_session_token(&headers) {
        let conn = state.db.get()?;
        if queries::revoke_admin_session_by_token(&conn, &token)? {
            tracing::info!("Admin session logged out");
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(LogoutResponse { success: true })).into_response())
}
