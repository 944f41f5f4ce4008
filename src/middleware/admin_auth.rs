use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::{AdminSession, Permission, built_in_permissions};
use crate::util::extract_bearer_token;

/// Name of the cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "admin_session";

#[derive(Debug, Clone)]
pub struct AdminContext {
    pub session: AdminSession,
    pub permissions: Vec<Permission>,
}

impl AdminContext {
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{}: {}",
                msg::MISSING_PERMISSION,
                permission.as_ref()
            )))
        }
    }
}

/// Session token from the `admin_session` cookie, falling back to a bearer token.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| extract_bearer_token(headers).map(String::from))
}

/// Permissions granted to a role name. Unknown roles get none.
pub fn resolve_permissions(conn: &rusqlite::Connection, role: &str) -> Result<Vec<Permission>> {
    Ok(match queries::get_role_by_name(conn, role)? {
        Some(role) => role.permissions,
        None => built_in_permissions(role),
    })
}

/// Resolve the presented session into an `AdminContext`.
/// Touches `last_activity` on success.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AdminContext> {
    let token = extract_session_token(headers).ok_or(AppError::Unauthorized)?;
    let conn = state.db.get()?;

    let session = queries::get_active_session_by_token(&conn, &token)?
        .ok_or(AppError::Unauthorized)?;
    queries::touch_admin_session(&conn, &session.id)?;
    let permissions = resolve_permissions(&conn, &session.role)?;

    Ok(AdminContext {
        session,
        permissions,
    })
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let ctx = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
